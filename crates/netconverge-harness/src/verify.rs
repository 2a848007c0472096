//! State verification: assertion sets evaluated against query output.

use netconverge_core::{Assertion, PatternError, Polarity, TestCase};

/// Result of one assertion against one text blob.
#[derive(Debug, Clone)]
pub struct VerificationResult {
    /// The expectation, e.g. `timeout => '5'` or `/router bgp 55/`.
    pub expected: String,
    pub polarity: Polarity,
    pub passed: bool,
    /// What the output actually showed, abbreviated for the report.
    pub observed: String,
}

/// Evaluate a set of assertions against `text`.
///
/// Every assertion is evaluated; a failure never short-circuits the rest, so
/// one verification surfaces the maximal set of mismatches.
#[must_use]
pub fn verify_assertions(text: &str, assertions: &[Assertion]) -> Vec<VerificationResult> {
    assertions
        .iter()
        .map(|assertion| {
            let found = assertion.found_in(text);
            let passed = assertion.holds(text);
            let observed = match (passed, found) {
                (true, _) => String::new(),
                (false, true) => format!("unexpectedly present in: {}", excerpt(text)),
                (false, false) => format!("not found in: {}", excerpt(text)),
            };
            VerificationResult {
                expected: assertion.describe(),
                polarity: assertion.polarity(),
                passed,
                observed,
            }
        })
        .collect()
}

/// Build the resource-query assertions for a case: expected literals with
/// must-match polarity when present, the paired expectations with
/// must-not-match polarity when absent.
pub fn resource_assertions(case: &TestCase) -> Result<Vec<Assertion>, PatternError> {
    let (props, polarity) = match case.lifecycle {
        netconverge_core::Lifecycle::Present => (&case.resource_props, Polarity::MustMatch),
        netconverge_core::Lifecycle::Absent => (&case.absence_props, Polarity::MustNotMatch),
    };
    props
        .iter()
        .map(|(key, value)| Assertion::key_value(key, value, polarity))
        .collect()
}

/// Build the device-query assertions for a case, polarity following the
/// lifecycle.
pub fn device_assertions(case: &TestCase) -> Result<Vec<Assertion>, PatternError> {
    let polarity = match case.lifecycle {
        netconverge_core::Lifecycle::Present => Polarity::MustMatch,
        netconverge_core::Lifecycle::Absent => Polarity::MustNotMatch,
    };
    case.device_patterns
        .iter()
        .map(|pattern| Assertion::pattern(pattern, polarity))
        .collect()
}

const EXCERPT_LEN: usize = 160;

fn excerpt(text: &str) -> String {
    let flat = text.trim().replace('\n', " | ");
    if flat.len() <= EXCERPT_LEN {
        flat
    } else {
        let cut = flat
            .char_indices()
            .take_while(|(i, _)| *i < EXCERPT_LEN)
            .last()
            .map_or(0, |(i, c)| i + c.len_utf8());
        format!("{}...", &flat[..cut])
    }
}
