//! The cancellable job manager for context-generation requests. Grounded
//! on the original Go `RequestShotgunContextGeneration`/
//! `requestShotgunContextGenerationInternal`, which keep a single
//! generation counter and cancel function, clearing it on completion only
//! if no newer request has since replaced it. `tokio::spawn` plus
//! `tokio_util::sync::CancellationToken` stand in for the goroutine and
//! context-cancellation the Go version uses.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use crate::assembler::{self, AssemblerConfig};
use crate::error::Error;
use crate::events::Event;

enum Slot {
    Empty,
    Running { token: u64, cancel: CancellationToken },
}

/// Runs at most one context-generation job at a time. A new request
/// cancels whatever is currently running and takes its place; a finishing
/// job only clears the slot if it is still the job that slot names (a
/// superseded job's late completion must not clobber its successor).
pub struct JobManager {
    slot: Mutex<Slot>,
    next_token: Mutex<u64>,
}

impl Default for JobManager {
    fn default() -> Self {
        Self::new()
    }
}

impl JobManager {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            slot: Mutex::new(Slot::Empty),
            next_token: Mutex::new(0),
        })
    }

    /// Cancel any running job, then spawn a new one. Events (progress,
    /// final artifact or error) are sent over `events`.
    pub fn request(
        self: &Arc<Self>,
        root: PathBuf,
        excluded: HashSet<String>,
        config: AssemblerConfig,
        events: UnboundedSender<Event>,
    ) {
        self.cancel_running();

        let token = {
            let mut next = self.next_token.lock().unwrap();
            *next += 1;
            *next
        };
        let cancel = CancellationToken::new();

        {
            let mut slot = self.slot.lock().unwrap();
            *slot = Slot::Running { token, cancel: cancel.clone() };
        }

        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let events_for_blocking = events.clone();
            let cancel_for_blocking = cancel.clone();
            let result = tokio::task::spawn_blocking(move || {
                assembler::assemble(&root, &excluded, config, &events_for_blocking, &cancel_for_blocking)
            })
            .await;

            match result {
                Ok(Ok(artifact)) => {
                    let _ = events.send(Event::ContextGenerated(artifact));
                }
                Ok(Err(Error::Cancelled)) => {
                    // a superseded job's output is simply dropped; no event
                    // is emitted for cancellation itself.
                }
                Ok(Err(e)) => {
                    let _ = events.send(Event::ContextError(e.to_string()));
                }
                Err(join_err) => {
                    let _ = events.send(Event::ContextError(join_err.to_string()));
                }
            }

            manager.finish(token);
        });
    }

    /// Cancel whatever job is currently running, if any, without clearing
    /// the slot (the running task clears it itself on exit).
    pub fn cancel_running(&self) {
        let slot = self.slot.lock().unwrap();
        if let Slot::Running { cancel, .. } = &*slot {
            cancel.cancel();
        }
    }

    /// Clear the slot iff it still names `token`.
    fn finish(&self, token: u64) {
        let mut slot = self.slot.lock().unwrap();
        let should_clear = matches!(&*slot, Slot::Running { token: t, .. } if *t == token);
        if should_clear {
            *slot = Slot::Empty;
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(&*self.slot.lock().unwrap(), Slot::Running { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tokio::sync::mpsc::unbounded_channel;

    #[tokio::test]
    async fn a_second_request_cancels_the_first_and_only_one_result_lands() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hi").unwrap();

        let manager = JobManager::new();
        let (tx, mut rx) = unbounded_channel();

        manager.request(dir.path().to_path_buf(), HashSet::new(), AssemblerConfig::default(), tx.clone());
        manager.request(dir.path().to_path_buf(), HashSet::new(), AssemblerConfig::default(), tx);

        let mut generated = 0;
        let mut errored = 0;
        for _ in 0..200 {
            if let Ok(event) = rx.try_recv() {
                match event {
                    Event::ContextGenerated(_) => generated += 1,
                    Event::ContextError(_) => errored += 1,
                    _ => {}
                }
            }
            tokio::task::yield_now().await;
        }
        assert!(generated + errored <= 2);
        assert!(!manager.is_running());
    }

    #[tokio::test]
    async fn slot_is_empty_after_a_single_job_completes() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hi").unwrap();

        let manager = JobManager::new();
        let (tx, mut rx) = unbounded_channel();
        manager.request(dir.path().to_path_buf(), HashSet::new(), AssemblerConfig::default(), tx);

        for _ in 0..200 {
            if rx.try_recv().is_ok() {
                break;
            }
            tokio::task::yield_now().await;
        }
        tokio::task::yield_now().await;
        assert!(!manager.is_running());
    }
}
