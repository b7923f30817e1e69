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

//! Macro Keymapper
//!
//! A key-mapping macro engine: named "start key → key sequence" macros,
//! played back with per-step delays when a trigger key is pressed.
//!
//! # Features
//!
//! - **Safe triggers:** Only `delete` and `end` can start a macro
//! - **Duplicate arbitration:** At most one enabled mapping per start key,
//!   enforced atomically on every toggle
//! - **Snapshot reads:** The hotkey listener never blocks behind edits
//! - **Cancellable playback:** Stopping the engine interrupts running delays
//! - **Atomic persistence:** JSON mapping file with timestamped backups
//!
//! # Architecture
//!
//! - **`core`:** Key catalog, data model, sequence parser, validation
//! - **`store`:** The mapping table and its read-side queries
//! - **`engine`:** Hotkey listener, sequence executor, lifecycle controller
//! - **`config`:** Mapping file, settings, file watching
//! - **`api`:** Administrative boundary for front ends
//!
//! # Examples
//!
//! ## Parsing a key sequence
//!
//! ```
//! use macro_keymapper::core::{format_sequence, parse_sequence};
//!
//! let steps = parse_sequence("1(100), ctrl+c, space(0)", 200)?;
//! assert_eq!(format_sequence(&steps), "1(100),ctrl+c(200),space(0)");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Running the engine
//!
//! ```
//! use macro_keymapper::engine::input::{ChannelKeySource, DryRunInjector};
//! use macro_keymapper::engine::{EngineController, RetriggerPolicy};
//! use macro_keymapper::store::MappingStore;
//! use macro_keymapper::core::parse_sequence;
//! use std::sync::Arc;
//!
//! let store = Arc::new(MappingStore::default());
//! store.create("Buff", "end", parse_sequence("1(0),2(0)", 200)?, true)?;
//!
//! let source = Arc::new(ChannelKeySource::new());
//! let engine = EngineController::new(
//!     store,
//!     source.clone(),
//!     Arc::new(DryRunInjector::new()),
//!     RetriggerPolicy::Ignore,
//! );
//!
//! engine.start()?;
//! source.tap("end");
//! engine.stop();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod api;
pub mod config;
pub mod core;
pub mod engine;
pub mod store;

// Re-export commonly used types for convenience
pub use api::MacroService;
pub use core::{KeyStep, KeyToken, Mapping, MappingId, Modifier, StartKey};
pub use engine::EngineController;
pub use store::MappingStore;
