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

//! Authoritative table of key mappings.
//!
//! The store is shared between the hotkey listener (hot read path) and the
//! administrative layer (writes). Key properties:
//!
//! - **Snapshot reads**: readers clone an `Arc` to an immutable snapshot and
//!   release the lock at once, so a dispatch lookup never waits for a write
//! - **Linearised writes**: every create/update/delete/toggle runs its whole
//!   read-modify-write under one writer mutex and publishes a new snapshot
//! - **One enabled per start key**: enabling a mapping disables its siblings
//!   in the same critical section, so no snapshot ever shows two enabled
//!   mappings on one start key
//! - **Persist before publish**: with a sink attached, a change that cannot be
//!   persisted is discarded and the published snapshot stays as it was
//!
//! # Example
//!
//! ```
//! use macro_keymapper::core::{parse_sequence, StartKey};
//! use macro_keymapper::store::{DuplicatePolicy, MappingStore};
//!
//! let store = MappingStore::new(DuplicatePolicy::DisableSiblings);
//! let keys = parse_sequence("1(100),2(0)", 200)?;
//!
//! let mapping = store.create("Buff", "delete", keys, false)?;
//! store.toggle(mapping.id)?;
//!
//! let active = store.find_active_by_start_key(StartKey::Delete);
//! assert_eq!(active.map(|m| m.id), Some(mapping.id));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod error;
pub mod query;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{debug, info, warn};

use crate::config::ConfigError;
use crate::core::{validate_mapping_fields, KeyStep, Mapping, MappingId, StartKey};

pub use error::StoreError;
pub use query::{DuplicateAnnotation, DuplicateGroup, DuplicateInfo, MappingQuery, MappingStats};

/// How enabling a mapping treats an already-enabled sibling.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Last enabled wins: siblings on the same start key are disabled
    #[default]
    DisableSiblings,
    /// Refuse with `StoreError::DuplicateStartKeyConflict`
    Reject,
}

/// Receives the full table after every change, before it is published.
///
/// Implementations must be all-or-nothing: on `Err` the store discards
/// the change.
pub trait MappingSink: Send + Sync {
    fn persist(&self, mappings: &[Mapping]) -> Result<(), ConfigError>;
}

/// Immutable view of the table at one point in the write order
#[derive(Debug, Default)]
struct Snapshot {
    mappings: Vec<Arc<Mapping>>,
    active: HashMap<StartKey, Arc<Mapping>>,
}

impl Snapshot {
    fn build(mappings: Vec<Mapping>) -> Self {
        let mappings: Vec<Arc<Mapping>> = mappings.into_iter().map(Arc::new).collect();

        let mut active = HashMap::new();
        for mapping in mappings.iter().filter(|m| m.enabled) {
            // First enabled wins; writers never produce a second one
            active
                .entry(mapping.start_key)
                .or_insert_with(|| Arc::clone(mapping));
        }

        Self { mappings, active }
    }
}

/// Thread-safe mapping table.
pub struct MappingStore {
    /// Published snapshot; the lock is held only to clone or swap the `Arc`
    current: RwLock<Arc<Snapshot>>,
    /// Serialises writers for the duration of their read-modify-write
    writer: Mutex<()>,
    policy: DuplicatePolicy,
    sink: Option<Arc<dyn MappingSink>>,
}

impl MappingStore {
    /// Creates an empty in-memory store.
    pub fn new(policy: DuplicatePolicy) -> Self {
        Self {
            current: RwLock::new(Arc::new(Snapshot::default())),
            writer: Mutex::new(()),
            policy,
            sink: None,
        }
    }

    /// Attaches a persistence sink consulted on every mutation.
    pub fn with_sink(mut self, sink: Arc<dyn MappingSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn policy(&self) -> DuplicatePolicy {
        self.policy
    }

    /// Creates a mapping with a fresh id.
    ///
    /// The mapping starts disabled unless `enable` is set, in which case the
    /// duplicate policy decides what happens to an enabled sibling.
    pub fn create(
        &self,
        name: &str,
        start_key: &str,
        keys: Vec<KeyStep>,
        enable: bool,
    ) -> Result<Mapping, StoreError> {
        let fields = validate_mapping_fields(name, start_key, keys)?;

        let created = self.mutate(|mappings| {
            let now = Utc::now();
            let mut mapping = Mapping {
                id: MappingId::generate(),
                name: fields.name,
                start_key: fields.start_key,
                keys: fields.keys,
                enabled: false,
                created_at: now,
                updated_at: now,
            };

            if enable {
                claim_start_key(self.policy, mappings, mapping.id, mapping.start_key, now)?;
                mapping.enabled = true;
            }

            mappings.push(mapping.clone());
            Ok(mapping)
        })?;

        info!(id = %created.id, name = %created.name, start_key = %created.start_key,
            enabled = created.enabled, "mapping created");
        Ok(created)
    }

    /// Replaces name, start key, and keys of an existing mapping.
    ///
    /// `id` and `enabled` are preserved. An enabled mapping moved onto a
    /// start key that already has an enabled member goes through the
    /// duplicate policy like a toggle would.
    pub fn update(
        &self,
        id: MappingId,
        name: &str,
        start_key: &str,
        keys: Vec<KeyStep>,
    ) -> Result<Mapping, StoreError> {
        let fields = validate_mapping_fields(name, start_key, keys)?;

        let updated = self.mutate(|mappings| {
            let now = Utc::now();
            let index = position(mappings, id)?;

            if mappings[index].enabled && mappings[index].start_key != fields.start_key {
                claim_start_key(self.policy, mappings, id, fields.start_key, now)?;
            }

            let mapping = &mut mappings[index];
            mapping.name = fields.name;
            mapping.start_key = fields.start_key;
            mapping.keys = fields.keys;
            mapping.updated_at = now;
            Ok(mapping.clone())
        })?;

        info!(id = %updated.id, name = %updated.name, start_key = %updated.start_key, "mapping updated");
        Ok(updated)
    }

    /// Removes a mapping and returns it.
    ///
    /// Deleting the enabled member of a duplicate group does not promote
    /// another member; the group is left all-disabled.
    pub fn delete(&self, id: MappingId) -> Result<Mapping, StoreError> {
        let removed = self.mutate(|mappings| {
            let index = position(mappings, id)?;
            Ok(mappings.remove(index))
        })?;

        info!(id = %removed.id, name = %removed.name, "mapping deleted");
        Ok(removed)
    }

    /// Flips `enabled`.
    ///
    /// Turning a mapping on applies the duplicate policy to every other
    /// mapping sharing its start key, inside the same critical section.
    pub fn toggle(&self, id: MappingId) -> Result<Mapping, StoreError> {
        let toggled = self.mutate(|mappings| {
            let now = Utc::now();
            let index = position(mappings, id)?;

            if !mappings[index].enabled {
                let start_key = mappings[index].start_key;
                claim_start_key(self.policy, mappings, id, start_key, now)?;
            }

            let mapping = &mut mappings[index];
            mapping.enabled = !mapping.enabled;
            mapping.updated_at = now;
            Ok(mapping.clone())
        })?;

        info!(id = %toggled.id, name = %toggled.name, enabled = toggled.enabled, "mapping toggled");
        Ok(toggled)
    }

    /// Hot read path: the enabled mapping bound to `start_key`, if any.
    pub fn find_active_by_start_key(&self, start_key: StartKey) -> Option<Arc<Mapping>> {
        self.snapshot().active.get(&start_key).cloned()
    }

    /// Looks up a mapping by id.
    pub fn get(&self, id: MappingId) -> Option<Mapping> {
        self.snapshot()
            .mappings
            .iter()
            .find(|m| m.id == id)
            .map(|m| (**m).clone())
    }

    /// All mappings in creation order.
    pub fn list(&self) -> Vec<Mapping> {
        self.snapshot()
            .mappings
            .iter()
            .map(|m| (**m).clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.snapshot().mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().mappings.is_empty()
    }

    /// Swaps in a whole table (startup load or external file change).
    ///
    /// The table is repaired with `repair_mappings` first and is NOT sent to
    /// the sink. Returns the number of records that had to be changed or
    /// dropped.
    pub fn replace_all(&self, mut mappings: Vec<Mapping>) -> usize {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);

        let repaired = repair_mappings(&mut mappings);
        let count = mappings.len();
        self.publish(Snapshot::build(mappings));

        info!(count, repaired, "mapping table replaced");
        repaired
    }

    fn snapshot(&self) -> Arc<Snapshot> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    fn publish(&self, snapshot: Snapshot) {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(snapshot);
    }

    /// Runs one read-modify-write against a private copy of the table.
    ///
    /// Nothing is published unless `change` succeeds and the sink (if any)
    /// accepts the result.
    fn mutate<T>(
        &self,
        change: impl FnOnce(&mut Vec<Mapping>) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);

        let mut working: Vec<Mapping> = self
            .snapshot()
            .mappings
            .iter()
            .map(|m| (**m).clone())
            .collect();

        let result = change(&mut working)?;

        if let Some(sink) = &self.sink {
            sink.persist(&working)?;
        }

        self.publish(Snapshot::build(working));
        Ok(result)
    }
}

impl Default for MappingStore {
    fn default() -> Self {
        Self::new(DuplicatePolicy::default())
    }
}

fn position(mappings: &[Mapping], id: MappingId) -> Result<usize, StoreError> {
    mappings
        .iter()
        .position(|m| m.id == id)
        .ok_or(StoreError::NotFound(id))
}

/// Makes room for `owner` to be the enabled mapping on `start_key`.
fn claim_start_key(
    policy: DuplicatePolicy,
    mappings: &mut [Mapping],
    owner: MappingId,
    start_key: StartKey,
    now: DateTime<Utc>,
) -> Result<(), StoreError> {
    let mut siblings = mappings
        .iter_mut()
        .filter(|m| m.id != owner && m.start_key == start_key && m.enabled)
        .peekable();

    if policy == DuplicatePolicy::Reject {
        if let Some(active) = siblings.peek() {
            return Err(StoreError::DuplicateStartKeyConflict {
                start_key,
                active: active.name.clone(),
            });
        }
    }

    for sibling in siblings {
        sibling.enabled = false;
        sibling.updated_at = now;
        debug!(id = %sibling.id, name = %sibling.name, %start_key, "sibling disabled");
    }

    Ok(())
}

/// Restores the store invariants on an externally supplied table.
///
/// - Drops records with an empty name, invalid steps, or a repeated id
/// - Keeps only the first enabled mapping per start key
///
/// Returns the number of records dropped or disabled.
pub fn repair_mappings(mappings: &mut Vec<Mapping>) -> usize {
    let before = mappings.len();
    let mut seen_ids = HashSet::new();

    mappings.retain(|mapping| {
        let valid = validate_mapping_fields(&mapping.name, mapping.start_key.as_str(), mapping.keys.clone());
        match valid {
            Err(e) => {
                warn!(id = %mapping.id, name = %mapping.name, error = %e, "dropping invalid mapping");
                false
            }
            Ok(_) if !seen_ids.insert(mapping.id) => {
                warn!(id = %mapping.id, "dropping mapping with duplicate id");
                false
            }
            Ok(_) => true,
        }
    });
    let mut repaired = before - mappings.len();

    let mut claimed = HashSet::new();
    for mapping in mappings.iter_mut().filter(|m| m.enabled) {
        if !claimed.insert(mapping.start_key) {
            warn!(id = %mapping.id, name = %mapping.name, start_key = %mapping.start_key,
                "second enabled mapping on start key disabled");
            mapping.enabled = false;
            repaired += 1;
        }
    }

    repaired
}

#[cfg(test)]
mod tests;
