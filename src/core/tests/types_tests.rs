use crate::core::types::{KeyParseError, KeyStep, KeyToken, Mapping, MappingId, Modifier, StartKey};
use chrono::Utc;

#[test]
fn test_modifier_display() {
    assert_eq!(format!("{}", Modifier::Shift), "shift");
    assert_eq!(format!("{}", Modifier::Alt), "alt");
}

#[test]
fn test_combo_display_is_canonical() {
    let token = KeyToken::parse("alt+ctrl+x").unwrap();
    assert_eq!(format!("{}", token), "ctrl+alt+x");
}

#[test]
fn test_combo_duplicate_modifiers_collapse() {
    let token = KeyToken::parse("ctrl+control+c").unwrap();
    assert_eq!(token.modifiers(), vec![Modifier::Ctrl]);
    assert_eq!(token.main_key(), "c");
}

#[test]
fn test_win_aliases_to_cmd() {
    let token = KeyToken::parse("win+d").unwrap();
    assert_eq!(token.modifiers(), vec![Modifier::Cmd]);
}

#[test]
fn test_combo_requires_modifier() {
    assert_eq!(
        KeyToken::parse("+c"),
        Err(KeyParseError::MissingModifier("+c".to_string()))
    );
    assert!(matches!(
        KeyToken::parse("a+b"),
        Err(KeyParseError::UnknownModifier { .. })
    ));
}

#[test]
fn test_combo_requires_main_key() {
    assert_eq!(
        KeyToken::parse("ctrl+"),
        Err(KeyParseError::MissingMainKey("ctrl+".to_string()))
    );
}

#[test]
fn test_unknown_and_empty_keys() {
    assert_eq!(KeyToken::parse("   "), Err(KeyParseError::Empty));
    assert_eq!(
        KeyToken::parse("hyper"),
        Err(KeyParseError::UnknownKey("hyper".to_string()))
    );
    assert_eq!(
        KeyToken::parse("ctrl+hyper"),
        Err(KeyParseError::UnknownKey("hyper".to_string()))
    );
}

#[test]
fn test_start_key_allow_list() {
    assert_eq!(StartKey::from_token("Delete"), Some(StartKey::Delete));
    assert_eq!(StartKey::from_token(" END "), Some(StartKey::End));
    assert_eq!(StartKey::from_token("del"), Some(StartKey::Delete));
    assert_eq!(StartKey::from_token("a"), None);
    assert_eq!(StartKey::from_token("home"), None);
}

#[test]
fn test_mapping_id_parse_round_trip() {
    let id = MappingId::generate();
    let parsed: MappingId = id.to_string().parse().unwrap();
    assert_eq!(parsed, id);
    assert!("not-a-uuid".parse::<MappingId>().is_err());
}

#[test]
fn test_mapping_ids_are_unique() {
    assert_ne!(MappingId::generate(), MappingId::generate());
}

#[test]
fn test_key_token_serializes_as_string() {
    let step = KeyStep::new(KeyToken::parse("shift+a").unwrap(), 150);
    let json = serde_json::to_value(&step).unwrap();

    assert_eq!(json, serde_json::json!({ "key": "shift+a", "delay_ms": 150 }));
}

#[test]
fn test_key_step_accepts_legacy_delay_field() {
    let step: KeyStep = serde_json::from_str(r#"{"key": "x", "delay": 200}"#).unwrap();
    assert_eq!(step, KeyStep::new(KeyToken::single("x"), 200));
}

#[test]
fn test_key_step_rejects_invalid_key_on_load() {
    let result: Result<KeyStep, _> = serde_json::from_str(r#"{"key": "ctrl+", "delay_ms": 0}"#);
    assert!(result.is_err());
}

#[test]
fn test_mapping_display() {
    let now = Utc::now();
    let mapping = Mapping {
        id: MappingId::generate(),
        name: "Buff".to_string(),
        start_key: StartKey::End,
        keys: vec![
            KeyStep::new(KeyToken::single("1"), 100),
            KeyStep::new(KeyToken::parse("ctrl+c").unwrap(), 0),
        ],
        enabled: false,
        created_at: now,
        updated_at: now,
    };

    let display = format!("{}", mapping);
    assert!(display.contains("Buff"));
    assert!(display.contains("[end]"));
    assert!(display.contains("1(100),ctrl+c(0)"));
}
