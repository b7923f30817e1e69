use thiserror::Error;

use crate::config::ConfigError;
use crate::core::{MappingId, StartKey, ValidationError};

/// Errors returned by mapping store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Request carried invalid fields; the store is unchanged.
    #[error("Validation failed on '{}': {}", .0.field(), .0)]
    Validation(#[from] ValidationError),

    /// No mapping carries this id.
    #[error("Mapping not found: {0}")]
    NotFound(MappingId),

    /// Enabling would leave two enabled mappings on one start key
    /// (only under `DuplicatePolicy::Reject`).
    #[error("Start key '{start_key}' is already used by enabled mapping '{active}'")]
    DuplicateStartKeyConflict { start_key: StartKey, active: String },

    /// The persistence sink refused the change; the store is unchanged.
    #[error("Failed to persist mappings: {0}")]
    Persist(#[from] ConfigError),
}
