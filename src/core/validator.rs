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

//! Mapping field validation
//!
//! Every create and update passes through here before the store is touched,
//! so a rejected request never changes state. Validation is WHITELIST based:
//! start keys must be in the `StartKey` allow-list and every pressed key
//! must be in the key catalog.

use thiserror::Error;

use crate::core::catalog::KeyCatalog;
use crate::core::types::{KeyParseError, KeyStep, KeyToken, StartKey};

/// Upper bound of a step's pre-press delay
pub const MAX_DELAY_MS: u32 = 1000;

/// Upper bound of a mapping name, in characters
pub const MAX_NAME_LENGTH: usize = 100;

/// Upper bound of steps per mapping
pub const MAX_STEPS: usize = 100;

/// Validation errors
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ValidationError {
    /// Name is empty after trimming
    #[error("Mapping name must not be empty")]
    EmptyName,

    /// Name exceeds `MAX_NAME_LENGTH`
    #[error("Mapping name too long: {0} characters (max 100)")]
    NameTooLong(usize),

    /// Start key outside the allow-list
    #[error("Invalid start key '{0}': only 'delete' or 'end' may start a mapping")]
    InvalidStartKey(String),

    /// Sequence has no steps
    #[error("Key sequence must not be empty")]
    EmptySequence,

    /// Sequence exceeds `MAX_STEPS`
    #[error("Key sequence too long: {0} steps (max 100)")]
    SequenceTooLong(usize),

    /// A step's key is not a valid token
    #[error("Step {index}: {source}")]
    InvalidKey {
        index: usize,
        #[source]
        source: KeyParseError,
    },

    /// A step's delay exceeds `MAX_DELAY_MS`
    #[error("Step {index}: delay {delay_ms}ms is outside 0..=1000ms")]
    DelayOutOfRange { index: usize, delay_ms: u32 },
}

impl ValidationError {
    /// Name of the request field that failed validation.
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::EmptyName | ValidationError::NameTooLong(_) => "name",
            ValidationError::InvalidStartKey(_) => "start_key",
            ValidationError::EmptySequence
            | ValidationError::SequenceTooLong(_)
            | ValidationError::InvalidKey { .. }
            | ValidationError::DelayOutOfRange { .. } => "keys",
        }
    }
}

/// Validated, normalised mapping fields
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MappingFields {
    pub name: String,
    pub start_key: StartKey,
    pub keys: Vec<KeyStep>,
}

/// Validates a mapping name and returns it trimmed
pub fn validate_name(name: &str) -> Result<String, ValidationError> {
    let trimmed = name.trim();

    if trimmed.is_empty() {
        return Err(ValidationError::EmptyName);
    }

    let length = trimmed.chars().count();
    if length > MAX_NAME_LENGTH {
        return Err(ValidationError::NameTooLong(length));
    }

    Ok(trimmed.to_string())
}

/// Validates a raw start key against the allow-list
pub fn validate_start_key(start_key: &str) -> Result<StartKey, ValidationError> {
    StartKey::from_token(start_key)
        .ok_or_else(|| ValidationError::InvalidStartKey(start_key.trim().to_string()))
}

/// Validates a single token
///
/// Tokens normally come out of `KeyToken::parse` already valid, but the
/// enum can also be built directly, so the catalog is consulted again.
pub fn validate_key(token: &KeyToken) -> Result<(), KeyParseError> {
    match token {
        KeyToken::Single(key) if key.is_empty() => Err(KeyParseError::Empty),
        KeyToken::Single(key) if !KeyCatalog::is_known(key) => {
            Err(KeyParseError::UnknownKey(key.clone()))
        }
        KeyToken::Combo { modifiers, .. } if modifiers.is_empty() => {
            Err(KeyParseError::MissingModifier(token.to_string()))
        }
        KeyToken::Combo { key, .. } if key.is_empty() => {
            Err(KeyParseError::MissingMainKey(token.to_string()))
        }
        KeyToken::Combo { key, .. } if !KeyCatalog::is_known(key) => {
            Err(KeyParseError::UnknownKey(key.clone()))
        }
        _ => Ok(()),
    }
}

/// Validates a complete step list
///
/// Performs all checks:
/// - Non-empty, at most `MAX_STEPS`
/// - Every key valid per the catalog
/// - Every delay within 0..=`MAX_DELAY_MS`
pub fn validate_steps(keys: &[KeyStep]) -> Result<(), ValidationError> {
    if keys.is_empty() {
        return Err(ValidationError::EmptySequence);
    }

    if keys.len() > MAX_STEPS {
        return Err(ValidationError::SequenceTooLong(keys.len()));
    }

    for (index, step) in keys.iter().enumerate() {
        let index = index + 1;

        validate_key(&step.key).map_err(|source| ValidationError::InvalidKey { index, source })?;

        if step.delay_ms > MAX_DELAY_MS {
            return Err(ValidationError::DelayOutOfRange {
                index,
                delay_ms: step.delay_ms,
            });
        }
    }

    Ok(())
}

/// Validates everything a create or update carries
pub fn validate_mapping_fields(
    name: &str,
    start_key: &str,
    keys: Vec<KeyStep>,
) -> Result<MappingFields, ValidationError> {
    let name = validate_name(name)?;
    let start_key = validate_start_key(start_key)?;
    validate_steps(&keys)?;

    Ok(MappingFields {
        name,
        start_key,
        keys,
    })
}
