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

//! Parser module tests
//!
//! Tests for the `key(delay),...` sequence form:
//! - Single keys and combinations
//! - Optional and explicit delays
//! - Whitespace and empty entries
//! - Error reporting with entry positions
//! - Format/parse round trip

use crate::core::{
    parser::*,
    types::{KeyParseError, KeyStep, KeyToken, Modifier},
};
use pretty_assertions::assert_eq;

#[test]
fn test_parse_simple_sequence() {
    let steps = parse_sequence("1(100),2(0)", 200).unwrap();

    assert_eq!(
        steps,
        vec![
            KeyStep::new(KeyToken::single("1"), 100),
            KeyStep::new(KeyToken::single("2"), 0),
        ]
    );
}

#[test]
fn test_parse_combo_step() {
    let steps = parse_sequence("ctrl+shift+a(300)", 200).unwrap();

    assert_eq!(steps.len(), 1);
    assert!(steps[0].key.is_combo());
    assert_eq!(steps[0].key.modifiers(), vec![Modifier::Ctrl, Modifier::Shift]);
    assert_eq!(steps[0].key.main_key(), "a");
    assert_eq!(steps[0].delay_ms, 300);
}

#[test]
fn test_missing_delay_uses_default() {
    let steps = parse_sequence("space, enter(0)", 200).unwrap();
    assert_eq!(steps[0].delay_ms, 200);
    assert_eq!(steps[1].delay_ms, 0);
}

#[test]
fn test_whitespace_and_case_are_tolerated() {
    let steps = parse_sequence("  A ( 150 ) ,\tCtrl+C(0)  ", 200).unwrap();

    assert_eq!(format_sequence(&steps), "a(150),ctrl+c(0)");
}

#[test]
fn test_empty_entries_are_skipped() {
    let steps = parse_sequence("1(100),,2(100),", 200).unwrap();
    assert_eq!(steps.len(), 2);
}

#[test]
fn test_empty_sequence() {
    assert_eq!(parse_sequence("", 200), Err(SequenceParseError::Empty));
    assert_eq!(parse_sequence(" , ,", 200), Err(SequenceParseError::Empty));
}

#[test]
fn test_malformed_delay() {
    assert!(matches!(
        parse_sequence("1(abc)", 200),
        Err(SequenceParseError::InvalidSyntax(_))
    ));
    assert!(matches!(
        parse_sequence("1(100", 200),
        Err(SequenceParseError::InvalidSyntax(_))
    ));
}

#[test]
fn test_missing_separator() {
    assert!(matches!(
        parse_sequence("1(100) 2(100)", 200),
        Err(SequenceParseError::InvalidSyntax(_))
    ));
}

#[test]
fn test_delay_out_of_range() {
    assert_eq!(
        parse_sequence("1(100),2(1001)", 200),
        Err(SequenceParseError::DelayOutOfRange { index: 2, delay_ms: 1001 })
    );
    assert!(parse_sequence("1(1000)", 200).is_ok());
}

#[test]
fn test_invalid_key_reports_position() {
    assert_eq!(
        parse_sequence("1(0),bogus(0)", 200),
        Err(SequenceParseError::InvalidKey {
            index: 2,
            source: KeyParseError::UnknownKey("bogus".to_string()),
        })
    );
}

#[test]
fn test_format_then_parse_round_trip() {
    let original = vec![
        KeyStep::new(KeyToken::single("f1"), 0),
        KeyStep::new(KeyToken::parse("alt+tab").unwrap(), 1000),
        KeyStep::new(KeyToken::single("num7"), 250),
    ];

    // Default delay must not leak into a formatted sequence
    let parsed = parse_sequence(&format_sequence(&original), 999).unwrap();
    assert_eq!(parsed, original);
}
