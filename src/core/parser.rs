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

//! src/core/parser.rs
//!
//! Key sequence parser and formatter
//!
//! The administrative layer exchanges key sequences in a compact text form:
//!
//! ```text
//! 1(100), 2(0), ctrl+c(250)
//! ```
//!
//! Each entry is a key token followed by an optional pre-press delay in
//! milliseconds. It handles:
//! - Optional whitespace around entries, tokens and delays
//! - Empty entries (`1(100),,2(0)`), which are skipped
//! - Missing `(delay)`, which takes the caller's default delay
//!
//! # Architecture
//! The grammar is parsed with nom combinators into raw `(token, delay)`
//! pairs first; tokens are then resolved through `KeyToken::parse` so the
//! catalog rules live in exactly one place.

use nom::{
    bytes::complete::take_while1,
    character::complete::{char, multispace0, u32 as parse_u32},
    combinator::{all_consuming, opt},
    multi::separated_list1,
    sequence::{delimited, preceded},
    IResult, Parser,
};
use thiserror::Error;

use crate::core::types::{KeyParseError, KeyStep, KeyToken};
use crate::core::validator::MAX_DELAY_MS;

/// Parse errors with entry position context
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum SequenceParseError {
    #[error("key sequence is empty")]
    Empty,

    #[error("malformed key sequence near '{0}'")]
    InvalidSyntax(String),

    #[error("entry {index}: {source}")]
    InvalidKey {
        index: usize,
        #[source]
        source: KeyParseError,
    },

    #[error("entry {index}: delay {delay_ms}ms is outside 0..=1000ms")]
    DelayOutOfRange { index: usize, delay_ms: u32 },
}

/// A syntactically valid entry before key resolution
#[derive(Debug, PartialEq)]
struct RawStep<'a> {
    key: &'a str,
    delay_ms: Option<u32>,
}

fn is_token_char(c: char) -> bool {
    !matches!(c, '(' | ')' | ',') && !c.is_whitespace()
}

/// Parse a delay suffix: `(250)`
fn parse_delay(input: &str) -> IResult<&str, u32> {
    delimited(
        (char('('), multispace0),
        parse_u32,
        (multispace0, char(')')),
    )
    .parse(input)
}

/// Parse one entry: `ctrl+c(250)` or `space`
fn parse_step(input: &str) -> IResult<&str, RawStep<'_>> {
    let (input, key) = take_while1(is_token_char).parse(input)?;
    let (input, delay_ms) = opt(preceded(multispace0, parse_delay)).parse(input)?;

    Ok((input, RawStep { key, delay_ms }))
}

/// Parse the whole list; empty slots come back as `None`
fn parse_steps(input: &str) -> IResult<&str, Vec<Option<RawStep<'_>>>> {
    all_consuming(separated_list1(
        char(','),
        delimited(multispace0, opt(parse_step), multispace0),
    ))
    .parse(input)
}

/// Parse a serialized key sequence into steps
///
/// # Arguments
/// * `input` - Text such as `"1(100),2(0)"`
/// * `default_delay_ms` - Delay used for entries written without `(delay)`
///
/// # Returns
/// The steps in order, or the first error encountered. Entry indices in
/// errors are 1-based and count only non-empty entries.
///
/// # Example
/// ```
/// use macro_keymapper::core::parser::parse_sequence;
///
/// let steps = parse_sequence("1(100), ctrl+c(0)", 200)?;
/// assert_eq!(steps.len(), 2);
/// assert_eq!(steps[1].key.to_string(), "ctrl+c");
/// # Ok::<(), macro_keymapper::core::parser::SequenceParseError>(())
/// ```
pub fn parse_sequence(input: &str, default_delay_ms: u32) -> Result<Vec<KeyStep>, SequenceParseError> {
    if input.trim().is_empty() {
        return Err(SequenceParseError::Empty);
    }

    let raw = match parse_steps(input) {
        Ok((_, raw)) => raw,
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            return Err(SequenceParseError::InvalidSyntax(e.input.trim().to_string()));
        }
        Err(nom::Err::Incomplete(_)) => {
            return Err(SequenceParseError::InvalidSyntax(input.trim().to_string()));
        }
    };

    let mut steps = Vec::with_capacity(raw.len());
    for (index, entry) in raw.into_iter().flatten().enumerate() {
        let index = index + 1; // Human-readable positions start at 1

        let key = KeyToken::parse(entry.key)
            .map_err(|source| SequenceParseError::InvalidKey { index, source })?;

        let delay_ms = entry.delay_ms.unwrap_or(default_delay_ms);
        if delay_ms > MAX_DELAY_MS {
            return Err(SequenceParseError::DelayOutOfRange { index, delay_ms });
        }

        steps.push(KeyStep::new(key, delay_ms));
    }

    if steps.is_empty() {
        return Err(SequenceParseError::Empty);
    }

    Ok(steps)
}

/// Format steps back into the serialized form
///
/// Always writes the delay explicitly, so `parse_sequence(format_sequence(s))`
/// returns `s` regardless of the default delay.
pub fn format_sequence(steps: &[KeyStep]) -> String {
    steps
        .iter()
        .map(|step| format!("{}({})", step.key, step.delay_ms))
        .collect::<Vec<_>>()
        .join(",")
}
