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

//! Administrative boundary
//!
//! `MacroService` is what a management front end (HTTP handler, CLI, UI)
//! talks to. It accepts transport-friendly inputs (string ids and the
//! `"key(delay),..."` sequence form), delegates to the store and the engine,
//! and returns `Serialize` responses. Duplicate annotations are derived
//! here on every listing and never stored.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

use crate::core::{
    format_sequence, parse_sequence, KeyCatalog, KeyCategory, Mapping, MappingId,
    SequenceParseError, StartKey,
};
use crate::engine::{CounterSnapshot, EngineController, ListenerInstallError, RetriggerPolicy};
use crate::store::{DuplicateInfo, MappingQuery, MappingStats, MappingStore, StoreError};

/// Errors surfaced to administrative callers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid key sequence: {0}")]
    InvalidSequence(#[from] SequenceParseError),

    #[error("Invalid mapping id '{0}'")]
    InvalidId(String),

    #[error("Unknown engine action '{0}': expected 'start' or 'stop'")]
    InvalidAction(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Engine failed to start: {0}")]
    Engine(#[from] ListenerInstallError),
}

impl ApiError {
    /// Stable error category for the transport layer.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::InvalidSequence(_)
            | ApiError::InvalidId(_)
            | ApiError::InvalidAction(_)
            | ApiError::Store(StoreError::Validation(_)) => "validation",
            ApiError::Store(StoreError::NotFound(_)) => "not_found",
            ApiError::Store(StoreError::DuplicateStartKeyConflict { .. }) => "conflict",
            ApiError::Store(StoreError::Persist(_)) => "persistence",
            ApiError::Engine(_) => "engine",
        }
    }

    /// Offending request field, when there is one.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            ApiError::InvalidSequence(_) => Some("key_sequence"),
            ApiError::InvalidId(_) => Some("id"),
            ApiError::InvalidAction(_) => Some("action"),
            ApiError::Store(StoreError::Validation(e)) => Some(e.field()),
            _ => None,
        }
    }

    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            error: self.kind(),
            field: self.field(),
            message: self.to_string(),
        }
    }
}

/// Serialisable error response
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<&'static str>,
    pub message: String,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct CreateMappingRequest {
    pub name: String,
    pub start_key: String,
    /// `"key1(delay1),key2(delay2),..."`
    pub key_sequence: String,
    /// Enable immediately (disabling any sibling on the start key)
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct UpdateMappingRequest {
    pub name: String,
    pub start_key: String,
    pub key_sequence: String,
}

/// One listed mapping with its derived duplicate annotations
#[derive(Clone, Debug, Serialize)]
pub struct MappingView {
    #[serde(flatten)]
    pub mapping: Mapping,
    /// The key list in `"key(delay),..."` form
    pub key_sequence: String,
    pub is_duplicate: bool,
    pub duplicate_index: usize,
    pub total_duplicates: usize,
}

#[derive(Clone, Debug, Serialize)]
pub struct MappingList {
    pub mappings: Vec<MappingView>,
    pub stats: MappingStats,
    pub duplicate_info: BTreeMap<StartKey, DuplicateInfo>,
}

#[derive(Clone, Debug, Serialize)]
pub struct EngineStatus {
    pub running: bool,
    pub retrigger_policy: RetriggerPolicy,
    pub stats: MappingStats,
    pub counters: CounterSnapshot,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlAction {
    Start,
    Stop,
}

impl FromStr for ControlAction {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "start" => Ok(ControlAction::Start),
            "stop" => Ok(ControlAction::Stop),
            _ => Err(ApiError::InvalidAction(s.to_string())),
        }
    }
}

impl fmt::Display for ControlAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlAction::Start => f.write_str("start"),
            ControlAction::Stop => f.write_str("stop"),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct ControlResult {
    pub action: ControlAction,
    /// False when the engine was already in the requested state
    pub changed: bool,
    pub running: bool,
}

pub struct MacroService {
    store: Arc<MappingStore>,
    engine: EngineController,
    default_delay_ms: u32,
}

impl MacroService {
    pub fn new(store: Arc<MappingStore>, engine: EngineController, default_delay_ms: u32) -> Self {
        Self {
            store,
            engine,
            default_delay_ms,
        }
    }

    pub fn store(&self) -> &Arc<MappingStore> {
        &self.store
    }

    pub fn engine(&self) -> &EngineController {
        &self.engine
    }

    pub fn list_mappings(&self) -> MappingList {
        let mappings = self.store.list();
        let query = MappingQuery::new(&mappings);

        let views = query
            .annotate()
            .into_iter()
            .map(|(mapping, annotation)| MappingView {
                key_sequence: format_sequence(&mapping.keys),
                mapping: mapping.clone(),
                is_duplicate: annotation.is_duplicate,
                duplicate_index: annotation.duplicate_index,
                total_duplicates: annotation.total_duplicates,
            })
            .collect();

        MappingList {
            mappings: views,
            stats: query.stats(),
            duplicate_info: query.duplicate_info(),
        }
    }

    pub fn create_mapping(&self, request: &CreateMappingRequest) -> Result<Mapping, ApiError> {
        let keys = parse_sequence(&request.key_sequence, self.default_delay_ms)?;
        Ok(self
            .store
            .create(&request.name, &request.start_key, keys, request.enabled)?)
    }

    pub fn update_mapping(&self, id: &str, request: &UpdateMappingRequest) -> Result<Mapping, ApiError> {
        let id = parse_id(id)?;
        let keys = parse_sequence(&request.key_sequence, self.default_delay_ms)?;
        Ok(self
            .store
            .update(id, &request.name, &request.start_key, keys)?)
    }

    pub fn delete_mapping(&self, id: &str) -> Result<Mapping, ApiError> {
        Ok(self.store.delete(parse_id(id)?)?)
    }

    pub fn toggle_mapping(&self, id: &str) -> Result<Mapping, ApiError> {
        Ok(self.store.toggle(parse_id(id)?)?)
    }

    pub fn control_engine(&self, action: &str) -> Result<ControlResult, ApiError> {
        let action: ControlAction = action.parse()?;

        let changed = match action {
            ControlAction::Start => self.engine.start()?,
            ControlAction::Stop => self.engine.stop(),
        };

        Ok(ControlResult {
            action,
            changed,
            running: self.engine.is_running(),
        })
    }

    pub fn engine_status(&self) -> EngineStatus {
        let mappings = self.store.list();

        EngineStatus {
            running: self.engine.is_running(),
            retrigger_policy: self.engine.retrigger_policy(),
            stats: MappingQuery::new(&mappings).stats(),
            counters: self.engine.counters(),
        }
    }

    pub fn available_keys(&self) -> &'static [KeyCategory] {
        KeyCatalog::categories()
    }
}

fn parse_id(id: &str) -> Result<MappingId, ApiError> {
    id.parse().map_err(|_| ApiError::InvalidId(id.to_string()))
}

#[cfg(test)]
mod tests;
