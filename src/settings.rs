//! Settings persistence. Grounded on the original Go
//! `loadSettings`/`saveSettings` (XDG config path via `adrg/xdg`,
//! pretty-printed JSON, mode `0644`, missing-file-writes-defaults,
//! unmarshal-error-falls-back-to-defaults) with the `directories` crate
//! standing in for `adrg/xdg`.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const USER_BLOCK_SEPARATOR: &str = "\n\n#--- user rules ---\n";

const EMBEDDED_DEFAULT_IGNORE_RULES: &str = include_str!("../assets/default_ignore_rules.glob");
const EMBEDDED_DEFAULT_PROMPT_RULES: &str = include_str!("../assets/default_prompt_rules.txt");

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedSettings {
    #[serde(default)]
    custom_ignore_rules: String,
    #[serde(default)]
    custom_prompt_rules: String,
}

/// In-memory settings. `custom_ignore_rules` always carries the embedded
/// default block followed by the user's own rules, so upgrades to the
/// embedded defaults take effect on every load even for an existing
/// config file (spec.md §4.1/§4.7).
#[derive(Debug, Clone)]
pub struct Settings {
    pub custom_ignore_rules: String,
    pub custom_prompt_rules: String,
}

impl Settings {
    fn from_user_block(user_ignore_block: &str, custom_prompt_rules: String) -> Self {
        let custom_ignore_rules = merge_ignore_rules(user_ignore_block);
        let custom_prompt_rules = if custom_prompt_rules.trim().is_empty() {
            EMBEDDED_DEFAULT_PROMPT_RULES.to_string()
        } else {
            custom_prompt_rules
        };
        Self { custom_ignore_rules, custom_prompt_rules }
    }

    /// The part of `custom_ignore_rules` the user actually wrote, stripped
    /// of the embedded default block that's always prepended.
    fn user_ignore_block(&self) -> String {
        self.custom_ignore_rules
            .strip_prefix(&merged_prefix())
            .unwrap_or(&self.custom_ignore_rules)
            .to_string()
    }

    /// Replace the user's own ignore rules, re-deriving `custom_ignore_rules`
    /// as `embedded_default + separator + user_block` so the invariant holds
    /// after a setter call the same way it does after a load (spec.md
    /// §4.1/§4.7). `user_block` is the caller's own rules only, not the
    /// already-merged string.
    pub fn set_user_ignore_block(&mut self, user_block: &str) {
        self.custom_ignore_rules = merge_ignore_rules(user_block);
    }
}

fn merged_prefix() -> String {
    format!("{EMBEDDED_DEFAULT_IGNORE_RULES}{USER_BLOCK_SEPARATOR}")
}

fn merge_ignore_rules(user_block: &str) -> String {
    format!("{}{user_block}", merged_prefix())
}

/// Resolves an XDG-style config path and loads/saves [`Settings`] there.
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    /// Resolve the default config file path for this application
    /// (`projectlens/settings.json` under the platform's config
    /// directory), mirroring the original's `xdg.ConfigFile`.
    pub fn default_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("", "", "projectlens")
            .ok_or_else(|| Error::Settings("could not resolve a config directory for this platform".to_string()))?;
        Ok(dirs.config_dir().join("settings.json"))
    }

    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Load settings from disk. A missing file writes embedded defaults
    /// back to disk and returns them. An unreadable or unparseable file
    /// logs a warning and falls back to defaults without touching disk.
    pub fn load(&self) -> Settings {
        match std::fs::read(&self.path) {
            Ok(bytes) => match serde_json::from_slice::<PersistedSettings>(&bytes) {
                Ok(persisted) => {
                    Settings::from_user_block(&persisted.custom_ignore_rules, persisted.custom_prompt_rules)
                }
                Err(e) => {
                    tracing::warn!(path = %self.path.display(), error = %e, "settings: failed to parse, falling back to defaults");
                    Settings::from_user_block("", String::new())
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let defaults = Settings::from_user_block("", String::new());
                if let Err(e) = self.save(&defaults) {
                    tracing::warn!(error = %e, "settings: failed to write default settings");
                }
                defaults
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "settings: failed to read, falling back to defaults");
                Settings::from_user_block("", String::new())
            }
        }
    }

    /// Persist `settings` as pretty-printed JSON, mode 0644 on Unix,
    /// creating the parent directory if necessary.
    pub fn save(&self, settings: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let persisted = PersistedSettings {
            custom_ignore_rules: settings.user_ignore_block(),
            custom_prompt_rules: settings.custom_prompt_rules.clone(),
        };
        let data = serde_json::to_vec_pretty(&persisted)
            .map_err(|e| Error::Settings(format!("failed to serialize settings: {e}")))?;

        std::fs::write(&self.path, &data)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o644);
            std::fs::set_permissions(&self.path, perms)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_writes_and_returns_defaults() {
        let dir = tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("nested/settings.json"));

        let settings = store.load();
        assert!(settings.custom_ignore_rules.starts_with(EMBEDDED_DEFAULT_IGNORE_RULES));
        assert!(dir.path().join("nested/settings.json").exists());
    }

    #[test]
    fn round_trip_preserves_user_block() {
        let dir = tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json"));

        let mut settings = store.load();
        settings.custom_ignore_rules = merge_ignore_rules("node_modules/\n*.tmp\n");
        store.save(&settings).unwrap();

        let reloaded = store.load();
        assert!(reloaded.custom_ignore_rules.contains("node_modules/"));
        assert!(reloaded.custom_ignore_rules.starts_with(EMBEDDED_DEFAULT_IGNORE_RULES));
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults_without_overwriting() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not json").unwrap();
        let store = SettingsStore::new(path.clone());

        let settings = store.load();
        assert!(settings.custom_ignore_rules.starts_with(EMBEDDED_DEFAULT_IGNORE_RULES));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "not json");
    }

    #[test]
    fn blank_prompt_rules_fall_back_to_embedded_default() {
        let settings = Settings::from_user_block("", String::new());
        assert_eq!(settings.custom_prompt_rules, EMBEDDED_DEFAULT_PROMPT_RULES);
    }

    #[test]
    fn persisted_json_uses_camel_case_wire_field_names() {
        let persisted = PersistedSettings {
            custom_ignore_rules: "*.log\n".to_string(),
            custom_prompt_rules: "be terse".to_string(),
        };
        let json = serde_json::to_string(&persisted).unwrap();
        assert!(json.contains("\"customIgnoreRules\""));
        assert!(json.contains("\"customPromptRules\""));
        assert!(!json.contains("custom_ignore_rules"));
    }
}
