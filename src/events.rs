//! The event kinds emitted to a caller-owned channel, matching spec.md §6.
//! There is no real event bus in scope (that's the out-of-scope frontend
//! plumbing), so this is modeled as one enum flowing over an
//! `UnboundedSender`/`UnboundedReceiver` pair the caller owns.

use std::path::PathBuf;

/// Progress through one context-generation job. `current <= total` always
/// holds at emission time; `total` is fixed once at job start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressState {
    pub current: usize,
    pub total: usize,
}

#[derive(Debug, Clone)]
pub enum Event {
    /// `contextProgress`
    ContextProgress(ProgressState),
    /// `contextGenerated`
    ContextGenerated(String),
    /// `contextError`
    ContextError(String),
    /// `filesChanged`
    FilesChanged(PathBuf),
    /// `autoOpenFolder`, emitted once on startup if a valid folder was
    /// passed on the command line.
    AutoOpenFolder(PathBuf),
}
