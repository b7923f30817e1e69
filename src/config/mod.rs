// Copyright 2025 Eric Jingryd (tidynest@proton.me)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Mapping file management with atomic writes and backup support.
//!
//! The mapping table lives in a single JSON file. Key features:
//!
//! - **Atomic writes**: Uses temp-file-then-rename to prevent corruption
//! - **Automatic backups**: Every overwrite first copies the old file to a
//!   timestamped backup, and only the newest backups are kept
//! - **Tolerant loading**: A missing file is an empty table; individual
//!   records that cannot be read are dropped with a warning instead of
//!   failing the whole load
//!
//! # Example
//!
//! ```no_run
//! use macro_keymapper::config::MappingFile;
//!
//! let file = MappingFile::new("/home/user/.config/macro-keymapper/keymappings.json".into(), 10)?;
//!
//! let mappings = file.load()?;
//! file.save(&mappings)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod error;
pub mod settings;
pub mod watcher;

use atomic_write_file::AtomicWriteFile;
use chrono::Local;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::core::Mapping;
use crate::store::MappingSink;

pub use error::ConfigError;
pub use settings::EngineSettings;
pub use watcher::MappingFileWatcher;

/// Timestamp suffix of backup files
const BACKUP_TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H%M%S";

/// Persists the mapping table to a JSON file.
#[derive(Debug)]
pub struct MappingFile {
    /// Path to the mapping file
    path: PathBuf,
    backup_dir: PathBuf,
    backups_to_keep: usize,
}

impl MappingFile {
    /// Creates a handle for the given mapping file.
    ///
    /// The file itself need not exist yet. Its parent directory and a
    /// `backups/` directory next to it are created if missing.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidPath` if the path has no parent or file
    /// name, and `ConfigError::BackupDirNotWritable` if the backup directory
    /// cannot be created.
    pub fn new(path: PathBuf, backups_to_keep: usize) -> Result<Self, ConfigError> {
        if path.file_name().is_none() {
            return Err(ConfigError::InvalidPath(path));
        }

        // e.g., ~/.config/macro-keymapper/keymappings.json → ~/.config/macro-keymapper/backups/
        let parent = path
            .parent()
            .ok_or_else(|| ConfigError::InvalidPath(path.clone()))?;
        let backup_dir = parent.join("backups");

        if !backup_dir.exists() {
            fs::create_dir_all(&backup_dir)
                .map_err(|_| ConfigError::BackupDirNotWritable(backup_dir.clone()))?;
        }

        if backup_dir.metadata()?.permissions().readonly() {
            return Err(ConfigError::BackupDirNotWritable(backup_dir));
        }

        Ok(Self {
            path,
            backup_dir,
            backups_to_keep,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// Reads the mapping table.
    ///
    /// A missing file yields an empty table. The file must be a JSON array;
    /// array elements that are not valid mappings (unknown start key, bad
    /// key token, missing field) are skipped with a warning. Invariant
    /// repair is left to `MappingStore::replace_all`.
    pub fn load(&self) -> Result<Vec<Mapping>, ConfigError> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "mapping file missing, starting empty");
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        let records: Vec<serde_json::Value> =
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: self.path.clone(),
                source,
            })?;

        let mut mappings = Vec::with_capacity(records.len());
        for (index, record) in records.into_iter().enumerate() {
            match serde_json::from_value::<Mapping>(record) {
                Ok(mapping) => mappings.push(mapping),
                Err(e) => warn!(index, error = %e, "skipping unreadable mapping record"),
            }
        }

        Ok(mappings)
    }

    /// Writes the mapping table atomically.
    ///
    /// An existing file is backed up first, then old backups beyond
    /// `backups_to_keep` are removed. Once the write is committed, a
    /// failure to remove old backups is only logged.
    pub fn save(&self, mappings: &[Mapping]) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(mappings).map_err(ConfigError::Serialize)?;

        if self.path.exists() {
            let backup = self.create_timestamped_backup()?;
            debug!(backup = %backup.display(), "mapping file backed up");
        }

        let mut file = AtomicWriteFile::options().open(&self.path).map_err(|e| {
            ConfigError::WriteFailed(format!("Failed to open for atomic write: {}", e))
        })?;

        file.write_all(content.as_bytes())
            .map_err(|e| ConfigError::WriteFailed(format!("Failed to write content: {}", e)))?;

        file.commit().map_err(|e| {
            ConfigError::WriteFailed(format!("Failed to commit atomic write: {}", e))
        })?;

        // The new table is committed; pruning backups can no longer fail the save
        match self.cleanup_old_backups(self.backups_to_keep) {
            Ok(0) => {}
            Ok(removed) => debug!(removed, "old backups removed"),
            Err(e) => warn!(error = %e, "failed to prune old backups"),
        }

        Ok(())
    }

    /// Lists backups of this file, oldest first.
    pub fn list_backups(&self) -> Result<Vec<PathBuf>, ConfigError> {
        let prefix = format!("{}.", self.file_name()?);

        let mut backups: Vec<PathBuf> = fs::read_dir(&self.backup_dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .map(|name| name.starts_with(&prefix))
                    .unwrap_or(false)
            })
            .collect();

        // YYYY-MM-DD_HHMMSS sorts chronologically as text
        backups.sort();
        Ok(backups)
    }

    /// Deletes all but the newest `keep` backups, returning how many were removed.
    pub fn cleanup_old_backups(&self, keep: usize) -> Result<usize, ConfigError> {
        let backups = self.list_backups()?;
        let excess = backups.len().saturating_sub(keep);

        for backup in &backups[..excess] {
            fs::remove_file(backup)?;
        }

        Ok(excess)
    }

    fn create_timestamped_backup(&self) -> Result<PathBuf, ConfigError> {
        let timestamp = Local::now().format(BACKUP_TIMESTAMP_FORMAT);

        // e.g., "keymappings.json.2025-10-10_221500"
        let backup_filename = format!("{}.{}", self.file_name()?, timestamp);
        let backup_path = self.backup_dir.join(&backup_filename);

        fs::copy(&self.path, &backup_path)
            .map_err(|e| ConfigError::BackupFailed(format!("{}: {}", backup_path.display(), e)))?;

        Ok(backup_path)
    }

    fn file_name(&self) -> Result<&str, ConfigError> {
        self.path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| ConfigError::InvalidPath(self.path.clone()))
    }
}

impl MappingSink for MappingFile {
    fn persist(&self, mappings: &[Mapping]) -> Result<(), ConfigError> {
        self.save(mappings)
    }
}
