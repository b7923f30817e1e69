//! src/core/types.rs
//!
//! Core type definitions for macro key mappings
//!
//! This module defines the fundamental types used throughout the engine:
//! - `Modifier`: Modifier keys usable in a combination (CTRL, SHIFT, ALT, CMD)
//! - `KeyToken`: A single key or a modifier combination, decided once at parse time
//! - `StartKey`: The allow-listed trigger keys
//! - `KeyStep`: One key press plus the delay waited before it
//! - `Mapping`: A named macro binding a start key to a key sequence
//!
//! All types implement serialization for persistence. `KeyToken` serializes
//! as its canonical string (`"ctrl+shift+a"`) so stored files stay readable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::core::catalog::{normalize_token, KeyCatalog};
use crate::core::parser::format_sequence;

/// Errors produced while parsing a single key token
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum KeyParseError {
    /// Token was empty or whitespace
    #[error("key is empty")]
    Empty,

    /// Token is not in the key catalog
    #[error("unknown key '{0}'")]
    UnknownKey(String),

    /// A `+`-separated prefix is not a modifier
    #[error("unknown modifier '{modifier}' in '{combo}'")]
    UnknownModifier { modifier: String, combo: String },

    /// Combination with an empty modifier slot (e.g. "+c")
    #[error("combination '{0}' needs at least one modifier")]
    MissingModifier(String),

    /// Combination with nothing after the last `+`
    #[error("combination '{0}' has no main key")]
    MissingMainKey(String),
}

/// Modifier keys accepted in combinations
///
/// Variant order is the canonical display order (ctrl+shift+alt+cmd).
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Modifier {
    /// Control key
    Ctrl,
    /// Shift key
    Shift,
    /// Alt/Option key
    Alt,
    /// Command/Windows/Super key
    Cmd,
}

impl Modifier {
    /// Resolves a normalised token to a modifier.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "ctrl" => Some(Modifier::Ctrl),
            "shift" => Some(Modifier::Shift),
            "alt" => Some(Modifier::Alt),
            "cmd" => Some(Modifier::Cmd),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Modifier::Ctrl => "ctrl",
            Modifier::Shift => "shift",
            Modifier::Alt => "alt",
            Modifier::Cmd => "cmd",
        }
    }
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A key to press: either one key or modifiers held around a main key
///
/// Combinations are decomposed here, once, so the dispatch path never
/// re-parses strings. Modifiers live in a `BTreeSet`, so `shift+ctrl+a`
/// and `ctrl+shift+a` are the same token and duplicates collapse.
///
/// # Example
/// ```
/// use macro_keymapper::core::{KeyToken, Modifier};
///
/// let token: KeyToken = "Shift+Ctrl+A".parse().unwrap();
/// assert_eq!(token.to_string(), "ctrl+shift+a");
/// assert_eq!(token.modifiers(), vec![Modifier::Ctrl, Modifier::Shift]);
/// ```
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(try_from = "String", into = "String")]
pub enum KeyToken {
    /// A lone key such as `"1"` or `"space"`
    Single(String),
    /// Modifier combination such as `ctrl+c`
    Combo {
        modifiers: BTreeSet<Modifier>,
        key: String,
    },
}

impl KeyToken {
    /// Parses and validates a token against the key catalog.
    pub fn parse(input: &str) -> Result<Self, KeyParseError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(KeyParseError::Empty);
        }

        if !trimmed.contains('+') {
            let key = normalize_token(trimmed);
            return if KeyCatalog::is_known(&key) {
                Ok(KeyToken::Single(key))
            } else {
                Err(KeyParseError::UnknownKey(key))
            };
        }

        let combo = trimmed.to_lowercase();
        let parts: Vec<&str> = trimmed.split('+').collect();
        let Some((main, prefixes)) = parts.split_last() else {
            return Err(KeyParseError::Empty);
        };

        let key = normalize_token(main);
        if key.is_empty() {
            return Err(KeyParseError::MissingMainKey(combo));
        }

        let mut modifiers = BTreeSet::new();
        for prefix in prefixes {
            let name = normalize_token(prefix);
            if name.is_empty() {
                return Err(KeyParseError::MissingModifier(combo));
            }
            let modifier = Modifier::from_token(&name).ok_or_else(|| {
                KeyParseError::UnknownModifier {
                    modifier: name.clone(),
                    combo: combo.clone(),
                }
            })?;
            modifiers.insert(modifier);
        }

        if !KeyCatalog::is_known(&key) {
            return Err(KeyParseError::UnknownKey(key));
        }

        Ok(KeyToken::Combo { modifiers, key })
    }

    /// Builds a single-key token without catalog validation.
    pub fn single(key: &str) -> Self {
        KeyToken::Single(key.to_lowercase())
    }

    pub fn is_combo(&self) -> bool {
        matches!(self, KeyToken::Combo { .. })
    }

    /// The key that is tapped (the last part of a combination).
    pub fn main_key(&self) -> &str {
        match self {
            KeyToken::Single(key) => key,
            KeyToken::Combo { key, .. } => key,
        }
    }

    /// Modifiers in canonical order (empty for single keys).
    pub fn modifiers(&self) -> Vec<Modifier> {
        match self {
            KeyToken::Single(_) => Vec::new(),
            KeyToken::Combo { modifiers, .. } => modifiers.iter().copied().collect(),
        }
    }
}

impl fmt::Display for KeyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyToken::Single(key) => f.write_str(key),
            KeyToken::Combo { modifiers, key } => {
                for modifier in modifiers {
                    write!(f, "{}+", modifier)?;
                }
                f.write_str(key)
            }
        }
    }
}

impl FromStr for KeyToken {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        KeyToken::parse(s)
    }
}

impl TryFrom<String> for KeyToken {
    type Error = KeyParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        KeyToken::parse(&value)
    }
}

impl From<KeyToken> for String {
    fn from(token: KeyToken) -> Self {
        token.to_string()
    }
}

/// Trigger keys a mapping may be bound to
///
/// Deliberately tiny: the listener must never react to keys needed for
/// normal typing, so only these two keys can start a macro.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StartKey {
    /// The Delete key
    Delete,
    /// The End key
    End,
}

impl StartKey {
    /// The complete allow-list
    pub const ALL: [StartKey; 2] = [StartKey::Delete, StartKey::End];

    /// Resolves a raw key name (any case, aliases allowed) to a start key.
    pub fn from_token(token: &str) -> Option<Self> {
        match normalize_token(token).as_str() {
            "delete" => Some(StartKey::Delete),
            "end" => Some(StartKey::End),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StartKey::Delete => "delete",
            StartKey::End => "end",
        }
    }
}

impl fmt::Display for StartKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One unit of a macro sequence
///
/// The engine waits `delay_ms` BEFORE pressing `key`; a zero delay presses
/// immediately.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct KeyStep {
    /// Key or combination to press
    pub key: KeyToken,

    /// Pre-press delay in milliseconds (0..=1000)
    #[serde(alias = "delay")]
    pub delay_ms: u32,
}

impl KeyStep {
    pub fn new(key: KeyToken, delay_ms: u32) -> Self {
        Self { key, delay_ms }
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(u64::from(self.delay_ms))
    }
}

/// Stable identifier of a mapping
///
/// Random v4 UUIDs: assigned once at creation, never reused, and unique
/// across restarts of the process because they are persisted with the record.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct MappingId(Uuid);

impl MappingId {
    /// Generates a fresh identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for MappingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MappingId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// A named macro binding one start key to an ordered key sequence
///
/// Only enabled mappings are eligible for dispatch, and at most one
/// mapping per start key is enabled at any time (enforced by the store).
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Mapping {
    /// Immutable identifier
    pub id: MappingId,

    /// Human label, never empty
    pub name: String,

    /// Trigger key
    pub start_key: StartKey,

    /// Steps played in order when triggered, never empty
    pub keys: Vec<KeyStep>,

    /// Eligible for dispatch
    pub enabled: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl fmt::Display for Mapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] → {}",
            self.name,
            self.start_key,
            format_sequence(&self.keys)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modifier_display() {
        assert_eq!(format!("{}", Modifier::Ctrl), "ctrl");
        assert_eq!(format!("{}", Modifier::Cmd), "cmd");
    }

    #[test]
    fn test_start_key_display() {
        assert_eq!(format!("{}", StartKey::Delete), "delete");
        assert_eq!(format!("{}", StartKey::End), "end");
    }

    #[test]
    fn test_combo_normalization() {
        let combo1 = KeyToken::parse("ctrl+shift+k").unwrap();
        let combo2 = KeyToken::parse("SHIFT+Ctrl+K").unwrap();

        assert_eq!(combo1, combo2);
    }

    #[test]
    fn test_single_key_is_not_combo() {
        let token = KeyToken::parse("space").unwrap();
        assert!(!token.is_combo());
        assert!(token.modifiers().is_empty());
        assert_eq!(token.main_key(), "space");
    }
}
