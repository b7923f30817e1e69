use super::super::*;
use pretty_assertions::assert_eq;
use std::thread;
use std::time::{Duration, Instant};

use crate::core::ValidationError;
use crate::engine::input::{ChannelKeySource, DryRunInjector};
use crate::store::DuplicatePolicy;

fn service_with(policy: DuplicatePolicy) -> (MacroService, Arc<ChannelKeySource>, Arc<DryRunInjector>) {
    let store = Arc::new(MappingStore::new(policy));
    let source = Arc::new(ChannelKeySource::new());
    let injector = Arc::new(DryRunInjector::new());
    let engine = EngineController::new(
        Arc::clone(&store),
        source.clone(),
        injector.clone(),
        RetriggerPolicy::Ignore,
    );
    (MacroService::new(store, engine, 200), source, injector)
}

fn service() -> MacroService {
    service_with(DuplicatePolicy::DisableSiblings).0
}

fn create(service: &MacroService, name: &str, start_key: &str, sequence: &str) -> Mapping {
    service
        .create_mapping(&CreateMappingRequest {
            name: name.to_string(),
            start_key: start_key.to_string(),
            key_sequence: sequence.to_string(),
            enabled: false,
        })
        .unwrap()
}

#[test]
fn test_create_parses_sequence_with_default_delay() {
    let service = service();
    let mapping = create(&service, "Buff", "delete", "1(100), 2");

    assert_eq!(mapping.keys[0].delay_ms, 100);
    assert_eq!(mapping.keys[1].delay_ms, 200);
    assert!(!mapping.enabled);
}

#[test]
fn test_create_request_from_json() {
    let request: CreateMappingRequest = serde_json::from_str(
        r#"{ "name": "A", "start_key": "end", "key_sequence": "f1(0)" }"#,
    )
    .unwrap();
    assert!(!request.enabled);

    let mapping = service().create_mapping(&request).unwrap();
    assert_eq!(mapping.start_key, StartKey::End);
}

#[test]
fn test_bad_sequence_is_validation_error() {
    let service = service();
    let result = service.create_mapping(&CreateMappingRequest {
        name: "A".to_string(),
        start_key: "end".to_string(),
        key_sequence: "1(5000)".to_string(),
        enabled: false,
    });

    let error = result.unwrap_err();
    assert_eq!(error.kind(), "validation");
    assert_eq!(error.field(), Some("key_sequence"));
    assert!(service.list_mappings().mappings.is_empty());
}

#[test]
fn test_bad_start_key_reports_field() {
    let service = service();
    let error = service
        .create_mapping(&CreateMappingRequest {
            name: "A".to_string(),
            start_key: "space".to_string(),
            key_sequence: "1".to_string(),
            enabled: false,
        })
        .unwrap_err();

    assert!(matches!(
        error,
        ApiError::Store(StoreError::Validation(ValidationError::InvalidStartKey(_)))
    ));
    assert_eq!(
        error.to_body(),
        ErrorBody {
            error: "validation",
            field: Some("start_key"),
            message: error.to_string(),
        }
    );
}

#[test]
fn test_ids_are_validated() {
    let service = service();

    let error = service.toggle_mapping("not-an-id").unwrap_err();
    assert_eq!(error.kind(), "validation");
    assert_eq!(error.field(), Some("id"));

    let missing = MappingId::generate().to_string();
    assert_eq!(service.delete_mapping(&missing).unwrap_err().kind(), "not_found");
    assert_eq!(service.toggle_mapping(&missing).unwrap_err().kind(), "not_found");
}

#[test]
fn test_update_mapping() {
    let service = service();
    let mapping = create(&service, "Old", "delete", "1(0)");

    let updated = service
        .update_mapping(
            &mapping.id.to_string(),
            &UpdateMappingRequest {
                name: "New".to_string(),
                start_key: "end".to_string(),
                key_sequence: "ctrl+c(50)".to_string(),
            },
        )
        .unwrap();

    assert_eq!(updated.id, mapping.id);
    assert_eq!(updated.start_key, StartKey::End);
    assert_eq!(format_sequence(&updated.keys), "ctrl+c(50)");
}

#[test]
fn test_list_mappings_annotates_duplicates() {
    let service = service();
    let a = create(&service, "A", "end", "1(0)");
    create(&service, "B", "end", "2(0)");
    create(&service, "Solo", "delete", "3(0)");
    service.toggle_mapping(&a.id.to_string()).unwrap();

    let list = service.list_mappings();

    assert_eq!(list.stats.total, 3);
    assert_eq!(list.stats.enabled, 1);
    assert_eq!(list.stats.duplicate_keys, 1);
    assert_eq!(
        list.duplicate_info.get(&StartKey::End),
        Some(&DuplicateInfo {
            count: 2,
            active: Some("A".to_string()),
        })
    );

    let b = &list.mappings[1];
    assert!(b.is_duplicate);
    assert_eq!(b.duplicate_index, 1);
    assert_eq!(b.total_duplicates, 2);
    assert_eq!(b.key_sequence, "2(0)");
    assert!(!list.mappings[2].is_duplicate);
}

#[test]
fn test_list_mappings_json_shape() {
    let service = service();
    create(&service, "A", "end", "1(0)");
    create(&service, "B", "end", "2(0)");

    let json = serde_json::to_value(service.list_mappings()).unwrap();

    assert_eq!(json["stats"]["duplicate_keys"], 1);
    assert_eq!(json["duplicate_info"]["end"]["count"], 2);
    assert_eq!(json["duplicate_info"]["end"]["active"], serde_json::Value::Null);
    assert_eq!(json["mappings"][0]["name"], "A");
    assert_eq!(json["mappings"][0]["start_key"], "end");
    assert_eq!(json["mappings"][0]["is_duplicate"], true);
    assert_eq!(json["mappings"][0]["duplicate_index"], 0);
}

#[test]
fn test_reject_policy_surfaces_conflict() {
    let (service, _, _) = service_with(DuplicatePolicy::Reject);
    let a = create(&service, "A", "end", "1(0)");
    let b = create(&service, "B", "end", "2(0)");

    service.toggle_mapping(&a.id.to_string()).unwrap();
    let error = service.toggle_mapping(&b.id.to_string()).unwrap_err();

    assert_eq!(error.kind(), "conflict");
}

#[test]
fn test_control_engine() {
    let service = service();

    let started = service.control_engine("start").unwrap();
    assert_eq!(
        started,
        ControlResult {
            action: ControlAction::Start,
            changed: true,
            running: true,
        }
    );
    assert!(!service.control_engine("START").unwrap().changed);

    let stopped = service.control_engine("stop").unwrap();
    assert!(stopped.changed);
    assert!(!stopped.running);

    let error = service.control_engine("pause").unwrap_err();
    assert_eq!(error.field(), Some("action"));
}

#[test]
fn test_engine_status_reports_runs() {
    let (service, source, injector) = service_with(DuplicatePolicy::DisableSiblings);
    let mapping = create(&service, "A", "delete", "1(0),ctrl+c(0)");
    service.toggle_mapping(&mapping.id.to_string()).unwrap();
    service.control_engine("start").unwrap();

    source.tap("delete");

    let deadline = Instant::now() + Duration::from_secs(2);
    while service.engine_status().counters.runs_completed < 1 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(5));
    }

    let status = service.engine_status();
    assert!(status.running);
    assert_eq!(status.stats.enabled, 1);
    assert_eq!(status.counters.triggers, 1);
    assert_eq!(status.counters.runs_completed, 1);
    assert_eq!(injector.presses(), 2);
}

#[test]
fn test_available_keys() {
    let categories = service().available_keys();

    assert!(categories.iter().any(|c| c.name == "Function keys" && c.keys.contains(&"f12")));
    assert!(categories.iter().any(|c| c.name == "Modifiers" && c.keys.contains(&"ctrl")));
}
