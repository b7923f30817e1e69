//! Engine settings
//!
//! Read from `settings.json` in the config directory. Every field has a
//! default, so the file is optional and may list only what it overrides.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::ConfigError;
use crate::core::validator::MAX_DELAY_MS;
use crate::engine::RetriggerPolicy;
use crate::store::DuplicatePolicy;

/// Config directory used when none is given on the command line
pub const DEFAULT_CONFIG_DIR: &str = "~/.config/macro-keymapper";

/// Settings file name inside the config directory
pub const SETTINGS_FILE: &str = "settings.json";

/// Delay for sequence entries written without `(delay)`
pub const DEFAULT_DELAY_MS: u32 = 200;

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineSettings {
    /// Mapping file, relative to the config directory unless absolute
    pub mappings_file: PathBuf,

    /// Number of mapping-file backups retained
    pub backups_to_keep: usize,

    pub duplicate_policy: DuplicatePolicy,

    pub retrigger_policy: RetriggerPolicy,

    /// Delay for sequence entries without an explicit `(delay)`
    pub default_delay_ms: u32,

    /// `tracing` filter directive used when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            mappings_file: PathBuf::from("keymappings.json"),
            backups_to_keep: 10,
            duplicate_policy: DuplicatePolicy::default(),
            retrigger_policy: RetriggerPolicy::default(),
            default_delay_ms: DEFAULT_DELAY_MS,
            log_filter: "info".to_string(),
        }
    }
}

impl EngineSettings {
    /// Loads `settings.json` from `config_dir`, falling back to defaults
    /// when the file does not exist.
    pub fn load(config_dir: &Path) -> Result<Self, ConfigError> {
        let path = config_dir.join(SETTINGS_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)?;
        let settings: Self =
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse { path, source })?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_delay_ms > MAX_DELAY_MS {
            return Err(ConfigError::InvalidSetting {
                name: "default_delay_ms",
                reason: format!("{} exceeds {}ms", self.default_delay_ms, MAX_DELAY_MS),
            });
        }

        if self.log_filter.trim().is_empty() {
            return Err(ConfigError::InvalidSetting {
                name: "log_filter",
                reason: "must not be empty".to_string(),
            });
        }

        Ok(())
    }

    /// Absolute location of the mapping file.
    pub fn mappings_path(&self, config_dir: &Path) -> PathBuf {
        if self.mappings_file.is_absolute() {
            self.mappings_file.clone()
        } else {
            config_dir.join(&self.mappings_file)
        }
    }
}

/// Resolves the config directory, expanding a leading `~`.
pub fn resolve_config_dir(dir: Option<&str>) -> PathBuf {
    let raw = dir.unwrap_or(DEFAULT_CONFIG_DIR);
    PathBuf::from(shellexpand::tilde(raw).as_ref())
}
