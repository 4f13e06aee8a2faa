//! `projectlens`: assembles a gitignore-aware, byte-capped text artifact
//! from a directory tree for use as LLM input, with a cancellable job
//! manager, a debounced watcher, and a unified-diff splitter alongside it.
//!
//! Grounded on the teacher's `app.rs`/`state.rs` facade (tying a scanner,
//! watcher, and settings store behind one struct the UI layer drives) and
//! the original Go `App` (the same shape, one level removed from Wails).

pub mod assembler;
pub mod classify;
pub mod diffsplit;
pub mod error;
pub mod events;
pub mod job;
pub mod pattern;
pub mod settings;
pub mod textheuristic;
pub mod walk;
pub mod watcher;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

pub use assembler::AssemblerConfig;
pub use classify::{Classification, Classifier, FileNode};
pub use diffsplit::DiffSplitConfig;
pub use error::{Error, Result};
pub use events::{Event, ProgressState};
pub use settings::Settings;

use job::JobManager;
use pattern::PatternSet;
use settings::SettingsStore;
use watcher::Watcher;

/// Ties the pattern sets, job manager, watcher, and settings store
/// together behind the operations a UI or CLI host drives. Events
/// (progress, generated artifacts, file-change notifications) are
/// delivered over the channel returned by [`ProjectLens::new`]; the host
/// owns the receiver.
pub struct ProjectLens {
    root: Mutex<Option<PathBuf>>,
    classifier: Mutex<Classifier>,
    excluded: Mutex<HashSet<String>>,
    jobs: Arc<JobManager>,
    watcher: Mutex<Watcher>,
    settings_store: SettingsStore,
    settings: Mutex<Settings>,
    events: UnboundedSender<Event>,
}

impl ProjectLens {
    /// Construct a facade with settings loaded from `settings_path` (use
    /// [`SettingsStore::default_path`] to resolve the platform default).
    /// Returns the facade plus the receiver half of its event channel.
    pub fn new(settings_path: PathBuf) -> (Self, UnboundedReceiver<Event>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let settings_store = SettingsStore::new(settings_path);
        let settings = settings_store.load();
        let custom_rules = PatternSet::compile(&settings.custom_ignore_rules);

        let facade = Self {
            root: Mutex::new(None),
            classifier: Mutex::new(Classifier::new(PatternSet::default(), custom_rules)),
            excluded: Mutex::new(HashSet::new()),
            jobs: JobManager::new(),
            watcher: Mutex::new(Watcher::new()),
            settings_store,
            settings: Mutex::new(settings),
            events: tx,
        };
        (facade, rx)
    }

    /// Open `root` as the active project: reads its top-level
    /// `.gitignore` (if present) to seed the project pattern set. Does
    /// not start the watcher; call [`Self::start_watcher`] separately.
    pub fn open_directory(&self, root: &Path) -> Result<()> {
        let gitignore_path = root.join(".gitignore");
        let project_text = std::fs::read_to_string(&gitignore_path).unwrap_or_default();
        let project_rules = PatternSet::compile(&project_text);

        self.classifier.lock().unwrap().set_project_rules(project_rules);
        *self.root.lock().unwrap() = Some(root.to_path_buf());
        Ok(())
    }

    /// List the current project's directory tree with ignore flags set
    /// but nothing pruned (spec.md §9: listing flags, it never prunes).
    pub fn list_files(&self) -> Result<Vec<FileNode>> {
        let root = self.require_root()?;
        let classifier = self.classifier.lock().unwrap();
        Ok(classify::list_files(&root, &classifier)?)
    }

    /// Set the paths (root-relative) excluded from assembly and from the
    /// watcher's top-level registration. Unlike ignore flags, exclusion
    /// actually prunes.
    pub fn set_excluded_paths(&self, excluded: HashSet<String>) {
        *self.excluded.lock().unwrap() = excluded;
    }

    /// Cancel any in-flight generation and start a new one. The result
    /// arrives as `Event::ContextGenerated`/`Event::ContextError` on the
    /// event channel, with `Event::ContextProgress` along the way.
    pub fn request_context_generation(&self, config: AssemblerConfig) -> Result<()> {
        let root = self.require_root()?;
        let excluded = self.excluded.lock().unwrap().clone();
        self.jobs.request(root, excluded, config, self.events.clone());
        Ok(())
    }

    /// Emit `Event::AutoOpenFolder` for `path`. Used by the CLI binary once
    /// on startup when the positional path argument names a directory that
    /// was opened successfully (spec.md §6's "Command line" contract).
    pub fn emit_auto_open_folder(&self, path: PathBuf) {
        let _ = self.events.send(Event::AutoOpenFolder(path));
    }

    /// Start the debounced watcher for the current project.
    pub fn start_watcher(&self) -> Result<()> {
        let root = self.require_root()?;
        let classifier = self.classifier.lock().unwrap().clone();
        self.watcher.lock().unwrap().start(&root, &classifier, self.events.clone())
    }

    pub fn stop_watcher(&self) {
        self.watcher.lock().unwrap().stop();
    }

    pub fn get_custom_ignore_rules(&self) -> String {
        self.settings.lock().unwrap().custom_ignore_rules.clone()
    }

    /// Update, recompile, persist, and (if the watcher is running) refresh
    /// the custom ignore rules. `user_rules` is the caller's own rule block
    /// (not the already-merged string); it is always re-combined with the
    /// embedded defaults the same way a load does, so the combined rule
    /// string compiled into the live classifier never loses the embedded
    /// defaults (spec.md §4.7).
    pub fn set_custom_ignore_rules(&self, user_rules: String) -> Result<()> {
        let mut settings = self.settings.lock().unwrap();
        settings.set_user_ignore_block(&user_rules);
        let merged = settings.custom_ignore_rules.clone();
        self.settings_store.save(&settings)?;
        drop(settings);

        let custom_rules = PatternSet::compile(&merged);
        self.classifier.lock().unwrap().set_custom_rules(custom_rules);
        self.refresh_watcher_if_running();
        Ok(())
    }

    pub fn get_custom_prompt_rules(&self) -> String {
        self.settings.lock().unwrap().custom_prompt_rules.clone()
    }

    pub fn set_custom_prompt_rules(&self, rules: String) -> Result<()> {
        let mut settings = self.settings.lock().unwrap();
        settings.custom_prompt_rules = rules;
        self.settings_store.save(&settings)?;
        Ok(())
    }

    pub fn set_use_gitignore(&self, enabled: bool) {
        self.classifier.lock().unwrap().use_gitignore = enabled;
        self.refresh_watcher_if_running();
    }

    pub fn set_use_custom_ignore(&self, enabled: bool) {
        self.classifier.lock().unwrap().use_custom_ignore = enabled;
        self.refresh_watcher_if_running();
    }

    /// Split a unified diff into chunks near `config.approx_line_limit`
    /// lines each. Stateless; does not touch the open project.
    pub fn split_diff(&self, diff_text: &str, config: DiffSplitConfig) -> Vec<String> {
        diffsplit::split_diff(diff_text, config)
    }

    fn refresh_watcher_if_running(&self) {
        let mut watcher = self.watcher.lock().unwrap();
        if watcher.is_running() {
            let classifier = self.classifier.lock().unwrap().clone();
            if let Err(e) = watcher.refresh(&classifier, &self.events) {
                tracing::warn!(error = %e, "projectlens: failed to refresh watcher after ignore-rule change");
            }
        }
    }

    fn require_root(&self) -> Result<PathBuf> {
        self.root
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| Error::InvalidInput("no directory is open".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn set_custom_ignore_rules_keeps_the_embedded_defaults_merged_in() {
        let dir = tempdir().unwrap();
        let (lens, _events) = ProjectLens::new(dir.path().join("settings.json"));

        lens.set_custom_ignore_rules("my-noise/\n".to_string()).unwrap();

        let stored = lens.get_custom_ignore_rules();
        assert!(stored.contains(".git/"));
        assert!(stored.contains("my-noise/"));

        // the live classifier compiled the merged string, not just the
        // caller's delta, so embedded defaults like `.git/` still match.
        let classified = lens.classifier.lock().unwrap().classify(".git", true);
        assert!(classified.custom_ignored);
    }
}
