//! Suite-scope pass/fail accumulation.
//!
//! The accumulator is an explicit value passed into and returned from each
//! orchestration step; there is no ambient "current result" state. For
//! suites that drive several devices in parallel, [`SharedResult`] wraps the
//! accumulator in a lock so appends stay serialized.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Failure taxonomy. Only transport failures abort a case's remaining
/// phases; every other kind is recorded and the run continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Transport,
    UnexpectedExitCode,
    AssertionMismatch,
    NonIdempotentConvergence,
}

impl FailureKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::UnexpectedExitCode => "unexpected_exit_code",
            Self::AssertionMismatch => "assertion_mismatch",
            Self::NonIdempotentConvergence => "non_idempotent_convergence",
        }
    }

    /// Transport failures are fatal to the current case.
    #[must_use]
    pub const fn is_fatal(self) -> bool {
        matches!(self, Self::Transport)
    }
}

/// Aggregate verdict over a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    #[serde(rename = "PASS")]
    Pass,
    #[serde(rename = "FAIL")]
    Fail,
}

impl Verdict {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
        }
    }
}

/// One recorded step, tagged with its originating description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: String,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<FailureKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed: Option<String>,
}

/// Ordered record of every step in a harness run.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct PassFailResult {
    steps: Vec<StepRecord>,
}

impl PassFailResult {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_pass(&mut self, step: impl Into<String>) {
        self.steps.push(StepRecord {
            step: step.into(),
            passed: true,
            kind: None,
            expected: None,
            observed: None,
        });
    }

    pub fn record_failure(
        &mut self,
        step: impl Into<String>,
        kind: FailureKind,
        expected: impl Into<String>,
        observed: impl Into<String>,
    ) {
        self.steps.push(StepRecord {
            step: step.into(),
            passed: false,
            kind: Some(kind),
            expected: Some(expected.into()),
            observed: Some(observed.into()),
        });
    }

    #[must_use]
    pub fn verdict(&self) -> Verdict {
        if self.steps.iter().all(|s| s.passed) {
            Verdict::Pass
        } else {
            Verdict::Fail
        }
    }

    #[must_use]
    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    pub fn failures(&self) -> impl Iterator<Item = &StepRecord> {
        self.steps.iter().filter(|s| !s.passed)
    }

    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.steps.iter().filter(|s| s.passed).count()
    }

    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.steps.len() - self.passed_count()
    }

    /// Append another accumulator's records, preserving order.
    pub fn merge(&mut self, other: PassFailResult) {
        self.steps.extend(other.steps);
    }
}

/// Lock-guarded accumulator handle for suite-level parallelism across
/// independent devices.
#[derive(Debug, Clone, Default)]
pub struct SharedResult(Arc<Mutex<PassFailResult>>);

impl SharedResult {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_pass(&self, step: impl Into<String>) {
        self.0.lock().record_pass(step);
    }

    pub fn record_failure(
        &self,
        step: impl Into<String>,
        kind: FailureKind,
        expected: impl Into<String>,
        observed: impl Into<String>,
    ) {
        self.0.lock().record_failure(step, kind, expected, observed);
    }

    pub fn merge(&self, other: PassFailResult) {
        self.0.lock().merge(other);
    }

    /// Copy of the accumulated state; the suite finalizes once with this.
    #[must_use]
    pub fn snapshot(&self) -> PassFailResult {
        self.0.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_result_passes() {
        assert_eq!(PassFailResult::new().verdict(), Verdict::Pass);
    }

    #[test]
    fn one_failure_fails_the_run() {
        let mut result = PassFailResult::new();
        result.record_pass("apply manifest");
        result.record_failure(
            "verify resource",
            FailureKind::AssertionMismatch,
            "timeout => '5'",
            "timeout => '30'",
        );
        assert_eq!(result.verdict(), Verdict::Fail);
        assert_eq!(result.passed_count(), 1);
        assert_eq!(result.failed_count(), 1);
    }

    #[test]
    fn failures_keep_step_descriptions_in_order() {
        let mut result = PassFailResult::new();
        result.record_failure("step a", FailureKind::UnexpectedExitCode, "[2]", "1");
        result.record_pass("step b");
        result.record_failure("step c", FailureKind::NonIdempotentConvergence, "no_change", "changed");

        let failed: Vec<&str> = result.failures().map(|s| s.step.as_str()).collect();
        assert_eq!(failed, vec!["step a", "step c"]);
    }

    #[test]
    fn only_transport_is_fatal() {
        assert!(FailureKind::Transport.is_fatal());
        assert!(!FailureKind::AssertionMismatch.is_fatal());
        assert!(!FailureKind::UnexpectedExitCode.is_fatal());
        assert!(!FailureKind::NonIdempotentConvergence.is_fatal());
    }

    #[test]
    fn merge_preserves_both_sides() {
        let mut a = PassFailResult::new();
        a.record_pass("device-one step");
        let mut b = PassFailResult::new();
        b.record_failure("device-two step", FailureKind::Transport, "exit code", "ssh refused");

        a.merge(b);
        assert_eq!(a.steps().len(), 2);
        assert_eq!(a.verdict(), Verdict::Fail);
    }

    #[test]
    fn shared_result_serializes_appends() {
        let shared = SharedResult::new();
        let threads: Vec<_> = (0..4)
            .map(|i| {
                let handle = shared.clone();
                std::thread::spawn(move || handle.record_pass(format!("step {i}")))
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(shared.snapshot().steps().len(), 4);
    }

    #[test]
    fn step_record_roundtrips_through_json() {
        let mut result = PassFailResult::new();
        result.record_failure("verify", FailureKind::AssertionMismatch, "a", "b");
        let json = serde_json::to_string(&result).unwrap();
        let restored: PassFailResult = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.failed_count(), 1);
        assert_eq!(restored.steps()[0].kind, Some(FailureKind::AssertionMismatch));
    }
}
