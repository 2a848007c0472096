//! Core data model and pure verdict logic for the netconverge harness.
//!
//! This crate provides:
//! - Test case model: desired-state declarations with lifecycle and scope
//! - Exit-code classification: per-command-class outcome tables
//! - Pattern matching: typed assertions with present/absent polarity
//! - Manifest synthesis: rendering a test case into agent manifest text
//! - Result accumulation: the suite-scope PASS/FAIL record
//!
//! Nothing here performs I/O; command execution and manifest persistence
//! live behind the seams in `netconverge-exec`.

#![forbid(unsafe_code)]

pub mod assertion;
pub mod error;
pub mod exit_code;
pub mod manifest;
pub mod result;
pub mod scope;
pub mod testcase;

pub use assertion::{Assertion, Polarity};
pub use error::{CaseError, PatternError};
pub use exit_code::{AcceptableCodes, Classified, CommandClass, ExitOutcome, classify};
pub use manifest::{ResourceBinding, render_manifest};
pub use result::{FailureKind, PassFailResult, SharedResult, StepRecord, Verdict};
pub use scope::Scope;
pub use testcase::{DEFAULT_SENTINEL, Lifecycle, TestCase};
