use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading or persisting configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Mapping or settings file is not valid JSON of the expected shape.
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    /// Mapping table could not be serialised.
    #[error("Failed to serialise mappings: {0}")]
    Serialize(#[source] serde_json::Error),
    /// Backup directory cannot be created or written to.
    #[error("Backup directory not writable: {0}")]
    BackupDirNotWritable(PathBuf),
    /// Failed to create backup file.
    #[error("Failed to create backup: {0}")]
    BackupFailed(String),
    /// Atomic write operation failed.
    #[error("Atomic write failed: {0}")]
    WriteFailed(String),
    /// A setting holds a value the engine cannot use.
    #[error("Invalid setting '{name}': {reason}")]
    InvalidSetting { name: &'static str, reason: String },
    /// Path has no usable parent directory or file name.
    #[error("Invalid config path: {0}")]
    InvalidPath(PathBuf),
    /// File watcher could not be installed.
    #[error("Failed to watch {path}: {source}")]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
    /// Generic I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
