use super::super::*;
use pretty_assertions::assert_eq;

use crate::core::parse_sequence;

/// Builds a table through a store so every record is valid
fn table(entries: &[(&str, &str, bool)]) -> Vec<Mapping> {
    let store = MappingStore::default();
    for (name, start_key, enable) in entries {
        let keys = parse_sequence("1(0)", 200).unwrap();
        store.create(name, start_key, keys, *enable).unwrap();
    }
    store.list()
}

#[test]
fn test_empty_table() {
    let mappings = Vec::new();
    let query = MappingQuery::new(&mappings);

    assert_eq!(query.stats(), MappingStats::default());
    assert!(query.duplicate_groups().is_empty());
    assert!(query.duplicate_info().is_empty());
}

#[test]
fn test_stats_counts() {
    let mappings = table(&[
        ("A", "delete", true),
        ("B", "delete", false),
        ("C", "end", false),
    ]);
    let stats = MappingQuery::new(&mappings).stats();

    assert_eq!(
        stats,
        MappingStats {
            total: 3,
            enabled: 1,
            disabled: 2,
            duplicate_keys: 1,
        }
    );
}

#[test]
fn test_duplicate_info_names_active_member() {
    let mappings = table(&[
        ("A", "end", false),
        ("B", "end", true),
        ("C", "end", false),
        ("Solo", "delete", true),
    ]);
    let info = MappingQuery::new(&mappings).duplicate_info();

    assert_eq!(info.len(), 1);
    assert_eq!(
        info.get(&StartKey::End),
        Some(&DuplicateInfo {
            count: 3,
            active: Some("B".to_string()),
        })
    );
    assert!(!info.contains_key(&StartKey::Delete));
}

#[test]
fn test_duplicate_info_without_active_member() {
    let mappings = table(&[("A", "delete", false), ("B", "delete", false)]);
    let info = MappingQuery::new(&mappings).duplicate_info();

    assert_eq!(info[&StartKey::Delete].active, None);
}

#[test]
fn test_annotations_follow_table_order() {
    let mappings = table(&[
        ("A", "delete", false),
        ("Solo", "end", false),
        ("B", "delete", false),
    ]);
    let query = MappingQuery::new(&mappings);
    let annotated = query.annotate();

    let summary: Vec<(&str, bool, usize, usize)> = annotated
        .iter()
        .map(|(m, a)| {
            (
                m.name.as_str(),
                a.is_duplicate,
                a.duplicate_index,
                a.total_duplicates,
            )
        })
        .collect();

    assert_eq!(
        summary,
        vec![
            ("A", true, 0, 2),
            ("Solo", false, 0, 1),
            ("B", true, 1, 2),
        ]
    );
}

#[test]
fn test_has_duplicates() {
    let mappings = table(&[("A", "delete", false), ("B", "delete", false), ("C", "end", false)]);
    let query = MappingQuery::new(&mappings);

    assert!(query.has_duplicates(StartKey::Delete));
    assert!(!query.has_duplicates(StartKey::End));
}

#[test]
fn test_annotation_for_unknown_id() {
    let mappings = table(&[("A", "end", false)]);
    assert!(MappingQuery::new(&mappings)
        .annotation(MappingId::generate())
        .is_none());
}
