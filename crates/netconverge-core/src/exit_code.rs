//! Exit-code classification for remote command results.
//!
//! Convergence commands and query/shell commands assign structurally
//! different meanings to the same numeric space. Apply runs follow the
//! agent's four-way convention (0 no-change, 2 changed, 1/4 error,
//! 6 changed-with-error); query and shell commands are a binary check
//! against an acceptable-code set, defaulting to `{0}`.

use serde::{Deserialize, Serialize};

/// The class of a remote command, selecting its classification table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandClass {
    /// Agent convergence run.
    Apply,
    /// Resource or device state query.
    Query,
    /// Plain shell command on the device or controller.
    Shell,
}

impl CommandClass {
    /// Stable label used in logs and step descriptions.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Apply => "apply",
            Self::Query => "query",
            Self::Shell => "shell",
        }
    }
}

/// Semantic outcome of an apply-class exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitOutcome {
    NoChange,
    Changed,
    Error,
    ChangedWithError,
    /// Any raw code outside the documented convention.
    Unclassified,
}

impl ExitOutcome {
    /// Stable label used in logs and failure records.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoChange => "no_change",
            Self::Changed => "changed",
            Self::Error => "error",
            Self::ChangedWithError => "changed_with_error",
            Self::Unclassified => "unclassified_error",
        }
    }
}

/// The set of raw exit codes a query/shell step accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcceptableCodes(Vec<i32>);

impl Default for AcceptableCodes {
    fn default() -> Self {
        Self(vec![0])
    }
}

impl AcceptableCodes {
    #[must_use]
    pub fn new(codes: impl Into<Vec<i32>>) -> Self {
        Self(codes.into())
    }

    #[must_use]
    pub fn accepts(&self, raw: i32) -> bool {
        self.0.contains(&raw)
    }

    #[must_use]
    pub fn codes(&self) -> &[i32] {
        &self.0
    }
}

impl std::fmt::Display for AcceptableCodes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        for (i, code) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{code}")?;
        }
        write!(f, "]")
    }
}

/// Result of classifying a raw exit code under a command class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classified {
    /// Apply-class outcome: the four-way label plus acceptance against the
    /// case's acceptable set.
    Apply { outcome: ExitOutcome, accepted: bool },
    /// Query/shell binary check against the acceptable set.
    Check { accepted: bool },
}

impl Classified {
    /// Whether the raw code was within the acceptable set.
    #[must_use]
    pub const fn accepted(self) -> bool {
        match self {
            Self::Apply { accepted, .. } | Self::Check { accepted } => accepted,
        }
    }
}

/// Classify an apply-class exit code. Total over all raw codes.
#[must_use]
pub const fn classify_apply(raw: i32) -> ExitOutcome {
    match raw {
        0 => ExitOutcome::NoChange,
        2 => ExitOutcome::Changed,
        1 | 4 => ExitOutcome::Error,
        6 => ExitOutcome::ChangedWithError,
        _ => ExitOutcome::Unclassified,
    }
}

/// Classify a raw exit code per command class.
///
/// Acceptance is always against `acceptable`; apply runs additionally carry
/// the agent-convention outcome label for failure records.
#[must_use]
pub fn classify(class: CommandClass, raw: i32, acceptable: &AcceptableCodes) -> Classified {
    let accepted = acceptable.accepts(raw);
    match class {
        CommandClass::Apply => Classified::Apply {
            outcome: classify_apply(raw),
            accepted,
        },
        CommandClass::Query | CommandClass::Shell => Classified::Check { accepted },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_table_matches_agent_convention() {
        assert_eq!(classify_apply(0), ExitOutcome::NoChange);
        assert_eq!(classify_apply(2), ExitOutcome::Changed);
        assert_eq!(classify_apply(1), ExitOutcome::Error);
        assert_eq!(classify_apply(4), ExitOutcome::Error);
        assert_eq!(classify_apply(6), ExitOutcome::ChangedWithError);
    }

    #[test]
    fn apply_is_total_over_unknown_codes() {
        assert_eq!(classify_apply(9), ExitOutcome::Unclassified);
        assert_eq!(classify_apply(-1), ExitOutcome::Unclassified);
        assert_eq!(classify_apply(255), ExitOutcome::Unclassified);
    }

    #[test]
    fn query_defaults_to_zero_only() {
        let default = AcceptableCodes::default();
        assert_eq!(
            classify(CommandClass::Query, 0, &default),
            Classified::Check { accepted: true }
        );
        assert_eq!(
            classify(CommandClass::Query, 1, &default),
            Classified::Check { accepted: false }
        );
    }

    #[test]
    fn shell_accepts_caller_supplied_set() {
        // A vsh command may legitimately exit 16 when a feature is disabled.
        let codes = AcceptableCodes::new(vec![0, 16]);
        assert_eq!(
            classify(CommandClass::Shell, 16, &codes),
            Classified::Check { accepted: true }
        );
        assert_eq!(
            classify(CommandClass::Shell, 2, &codes),
            Classified::Check { accepted: false }
        );
    }

    #[test]
    fn apply_carries_outcome_and_acceptance() {
        let codes = AcceptableCodes::new(vec![0, 2]);
        assert_eq!(
            classify(CommandClass::Apply, 2, &codes),
            Classified::Apply {
                outcome: ExitOutcome::Changed,
                accepted: true
            }
        );
        // An error code outside the set is labelled for the failure record.
        let failed = classify(CommandClass::Apply, 1, &codes);
        assert!(!failed.accepted());
        assert_eq!(
            failed,
            Classified::Apply {
                outcome: ExitOutcome::Error,
                accepted: false
            }
        );
    }

    #[test]
    fn acceptable_codes_display() {
        assert_eq!(AcceptableCodes::new(vec![0, 2]).to_string(), "[0, 2]");
        assert_eq!(AcceptableCodes::default().to_string(), "[0]");
    }
}
