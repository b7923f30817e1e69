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

//! src/core/mod.rs
//!
//! Core data model
//!
//! This module contains the fundamental data structures for macro mappings:
//! - The key catalog used for input validation
//! - Type definitions for keys, steps, and mappings
//! - The `key(delay),...` sequence parser and formatter
//! - Field validation with whitelisting
//!
//! Nothing here touches threads, files, or the OS, so all of it is
//! unit-tested without a keyboard hook.

pub mod catalog;
pub mod parser;
pub mod types;
pub mod validator;

pub use catalog::{KeyCatalog, KeyCategory};
pub use parser::{format_sequence, parse_sequence, SequenceParseError};
pub use types::*;
pub use validator::{validate_mapping_fields, MappingFields, ValidationError};

#[cfg(test)]
mod tests;
