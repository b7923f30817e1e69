//! Core module tests
//!
//! Contains test suites for core functionality:
//! - Key catalog tests
//! - Sequence parser tests
//! - Field validation tests
//! - Type tests (KeyToken, KeyStep, Mapping, etc.)

#[cfg(test)]
mod parser_tests;
#[cfg(test)]
mod types_tests;
