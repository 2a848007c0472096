//! Convergence harness: drives declarative device test suites end to end.
//!
//! The harness loads a suite definition ([`suite::SuiteSpec`]), compiles its
//! cases, and walks each one through the orchestration phases: manifest
//! synthesis, storage, apply, resource and device verification, and an
//! idempotence re-apply. Results accumulate in a
//! [`netconverge_core::PassFailResult`] and render as a [`report::SuiteReport`]
//! plus a structured JSONL log.
//!
//! Execution is abstracted behind [`netconverge_exec::CommandExecutor`], so
//! the same orchestrator runs against a live transport or a scripted
//! transcript.

#![forbid(unsafe_code)]

pub mod idempotence;
pub mod orchestrator;
pub mod report;
pub mod structured_log;
pub mod suite;
pub mod verify;

pub use idempotence::{IdempotenceCheck, check_idempotence};
pub use orchestrator::{Orchestrator, Phase, run_suites};
pub use report::{ArtifactEntry, ArtifactIndex, SuiteReport, SuiteSummary};
pub use structured_log::{
    LogEmitter, LogEntry, LogLevel, Outcome, validate_log_file, validate_log_line,
};
pub use suite::{CaseSpec, ScopeOverride, SetupSpec, SuiteError, SuiteSpec, TITLE_PLACEHOLDER};
pub use verify::{VerificationResult, device_assertions, resource_assertions, verify_assertions};
