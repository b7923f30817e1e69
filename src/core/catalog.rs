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

//! src/core/catalog.rs
//!
//! Registry of recognised physical key tokens
//!
//! Every key that may appear in a macro sequence (on its own or as the main
//! key of a combination) must be listed here. The catalog is a WHITELIST:
//! tokens that are not listed are rejected at validation time, so the
//! injection layer only ever sees names it knows how to press.
//!
//! Tokens are canonical lower-case names. `normalize_token` folds the common
//! alternative spellings (`Escape`, `Return`, `PgUp`, ...) onto them.

use serde::Serialize;

/// A named group of key tokens, as offered to the administrative UI.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct KeyCategory {
    /// Display name of the group
    pub name: &'static str,
    /// Canonical tokens in display order
    pub keys: &'static [&'static str],
}

const NUMBER_KEYS: &[&str] = &["1", "2", "3", "4", "5", "6", "7", "8", "9", "0"];

const LETTER_KEYS: &[&str] = &[
    "a", "b", "c", "d", "e", "f", "g", "h", "i", "j", "k", "l", "m",
    "n", "o", "p", "q", "r", "s", "t", "u", "v", "w", "x", "y", "z",
];

const FUNCTION_KEYS: &[&str] = &[
    "f1", "f2", "f3", "f4", "f5", "f6", "f7", "f8", "f9", "f10", "f11", "f12",
];

const SPECIAL_KEYS: &[&str] = &[
    "delete", "space", "enter", "esc", "tab", "backspace",
    "insert", "home", "end", "pageup", "pagedown",
];

const ARROW_KEYS: &[&str] = &["left", "up", "right", "down"];

const NUMPAD_KEYS: &[&str] = &[
    "num0", "num1", "num2", "num3", "num4", "num5", "num6", "num7", "num8", "num9",
];

const MODIFIER_KEYS: &[&str] = &["shift", "ctrl", "alt", "cmd"];

const CATEGORIES: &[KeyCategory] = &[
    KeyCategory { name: "Numbers", keys: NUMBER_KEYS },
    KeyCategory { name: "Letters", keys: LETTER_KEYS },
    KeyCategory { name: "Function keys", keys: FUNCTION_KEYS },
    KeyCategory { name: "Special keys", keys: SPECIAL_KEYS },
    KeyCategory { name: "Arrow keys", keys: ARROW_KEYS },
    KeyCategory { name: "Numpad", keys: NUMPAD_KEYS },
    KeyCategory { name: "Modifiers", keys: MODIFIER_KEYS },
];

/// Alternative spellings accepted on input, mapped to their canonical token
const ALIASES: &[(&str, &str)] = &[
    ("escape", "esc"),
    ("return", "enter"),
    ("del", "delete"),
    ("pgup", "pageup"),
    ("pgdn", "pagedown"),
    ("control", "ctrl"),
    ("option", "alt"),
    ("win", "cmd"),
    ("super", "cmd"),
    ("meta", "cmd"),
];

/// Static catalog of recognised keys.
pub struct KeyCatalog;

impl KeyCatalog {
    /// All categories in display order.
    pub fn categories() -> &'static [KeyCategory] {
        CATEGORIES
    }

    /// Returns true if `token` (already normalised) names a catalog key.
    pub fn is_known(token: &str) -> bool {
        CATEGORIES
            .iter()
            .any(|category| category.keys.contains(&token))
    }

    /// Total number of distinct tokens in the catalog.
    pub fn len() -> usize {
        CATEGORIES.iter().map(|category| category.keys.len()).sum()
    }
}

/// Trims, lower-cases, and resolves aliases of a single key name.
///
/// Does not split combinations; apply it to each `+`-separated part.
pub fn normalize_token(token: &str) -> String {
    let lowered = token.trim().to_lowercase();

    ALIASES
        .iter()
        .find(|(alias, _)| *alias == lowered)
        .map(|(_, canonical)| (*canonical).to_string())
        .unwrap_or(lowered)
}
