//! Read-only views over a mapping table
//!
//! Groups mappings by start key to answer the questions a management UI
//! asks when listing: which start keys are shared, which member of each
//! group is active, and overall counts. Grouping is done once per query in
//! a `BTreeMap`, so output order is stable (`delete` before `end`).
//!
//! Nothing here enforces the one-enabled-per-start-key rule; that lives in
//! the store.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::core::{Mapping, MappingId, StartKey};

/// Start keys shared by two or more mappings.
#[derive(Clone, Debug, PartialEq)]
pub struct DuplicateGroup<'a> {
    pub start_key: StartKey,

    /// All members in table order (always 2 or more)
    pub mappings: Vec<&'a Mapping>,
}

/// Per-start-key duplicate summary.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct DuplicateInfo {
    /// Number of mappings sharing the start key
    pub count: usize,

    /// Name of the enabled member, if any
    pub active: Option<String>,
}

/// Aggregate counts over a table.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct MappingStats {
    pub total: usize,
    pub enabled: usize,
    pub disabled: usize,

    /// Start keys used by more than one mapping
    pub duplicate_keys: usize,
}

/// Listing annotation for one mapping.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct DuplicateAnnotation {
    pub is_duplicate: bool,

    /// 0-based position inside its group, in table order
    pub duplicate_index: usize,

    /// Size of its group (1 for non-duplicates)
    pub total_duplicates: usize,
}

/// Query over a borrowed mapping table.
pub struct MappingQuery<'a> {
    mappings: &'a [Mapping],
    by_start_key: BTreeMap<StartKey, Vec<&'a Mapping>>,
}

impl<'a> MappingQuery<'a> {
    pub fn new(mappings: &'a [Mapping]) -> Self {
        let mut by_start_key: BTreeMap<StartKey, Vec<&'a Mapping>> = BTreeMap::new();
        for mapping in mappings {
            by_start_key.entry(mapping.start_key).or_default().push(mapping);
        }

        Self {
            mappings,
            by_start_key,
        }
    }

    pub fn stats(&self) -> MappingStats {
        let enabled = self.mappings.iter().filter(|m| m.enabled).count();

        MappingStats {
            total: self.mappings.len(),
            enabled,
            disabled: self.mappings.len() - enabled,
            duplicate_keys: self.duplicate_groups().len(),
        }
    }

    pub fn duplicate_groups(&self) -> Vec<DuplicateGroup<'a>> {
        self.by_start_key
            .iter()
            .filter(|(_, group)| group.len() > 1)
            .map(|(start_key, group)| DuplicateGroup {
                start_key: *start_key,
                mappings: group.clone(),
            })
            .collect()
    }

    pub fn has_duplicates(&self, start_key: StartKey) -> bool {
        self.by_start_key
            .get(&start_key)
            .map(|group| group.len() > 1)
            .unwrap_or(false)
    }

    /// Summary for every start key shared by two or more mappings.
    pub fn duplicate_info(&self) -> BTreeMap<StartKey, DuplicateInfo> {
        self.duplicate_groups()
            .into_iter()
            .map(|group| {
                let active = group
                    .mappings
                    .iter()
                    .find(|m| m.enabled)
                    .map(|m| m.name.clone());
                let info = DuplicateInfo {
                    count: group.mappings.len(),
                    active,
                };
                (group.start_key, info)
            })
            .collect()
    }

    /// Annotation for one mapping; `None` if `id` is not in the table.
    pub fn annotation(&self, id: MappingId) -> Option<DuplicateAnnotation> {
        let mapping = self.mappings.iter().find(|m| m.id == id)?;
        let group = self.by_start_key.get(&mapping.start_key)?;
        let position = group.iter().position(|m| m.id == id)?;

        Some(DuplicateAnnotation {
            is_duplicate: group.len() > 1,
            duplicate_index: position,
            total_duplicates: group.len(),
        })
    }

    /// Every mapping in table order, paired with its annotation.
    pub fn annotate(&self) -> Vec<(&'a Mapping, DuplicateAnnotation)> {
        self.mappings
            .iter()
            .filter_map(|m| self.annotation(m.id).map(|a| (m, a)))
            .collect()
    }
}
