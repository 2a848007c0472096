//! Typed assertions evaluated against raw command output.
//!
//! Two shapes exist: key/value assertions scanned line-by-line against
//! `puppet resource`-style output, and raw regex patterns scanned anywhere
//! in a text blob (device running-config). Both carry a polarity: the final
//! verdict is `found == (polarity == MustMatch)`, so an absent-state check
//! is an inverted match, never a skipped one.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::PatternError;

/// Whether the assertion requires the pattern's presence or absence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    MustMatch,
    MustNotMatch,
}

impl Polarity {
    /// The flipped polarity, used when an absent case reuses the present
    /// case's expectations.
    #[must_use]
    pub const fn inverted(self) -> Self {
        match self {
            Self::MustMatch => Self::MustNotMatch,
            Self::MustNotMatch => Self::MustMatch,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MustMatch => "must_match",
            Self::MustNotMatch => "must_not_match",
        }
    }
}

#[derive(Debug, Clone)]
enum AssertionKind {
    KeyValue { key: String, value: String },
    Pattern { raw: String },
}

/// One expectation against a text blob.
#[derive(Debug, Clone)]
pub struct Assertion {
    kind: AssertionKind,
    polarity: Polarity,
    regex: Regex,
}

impl Assertion {
    /// Key/value assertion: a line containing `key`, a separator, and the
    /// exact literal `value`. Formatting around the separator is flexible
    /// (`key => 'value'`, `key: value`, arbitrary padding) but the value
    /// itself is matched exactly, so `'5'` never matches `'50'`.
    pub fn key_value(
        key: impl Into<String>,
        value: impl Into<String>,
        polarity: Polarity,
    ) -> Result<Self, PatternError> {
        let key = key.into();
        let value = value.into();
        let pattern = format!(
            r"(?m)^\s*{}\s*(?:=>|[:=])\s*'?{}'?\s*,?\s*$",
            regex::escape(&key),
            regex::escape(&value),
        );
        let regex = compile(&pattern)?;
        Ok(Self {
            kind: AssertionKind::KeyValue { key, value },
            polarity,
            regex,
        })
    }

    /// Raw pattern assertion: the regex may match anywhere in the text.
    pub fn pattern(raw: impl Into<String>, polarity: Polarity) -> Result<Self, PatternError> {
        let raw = raw.into();
        let regex = compile(&raw)?;
        Ok(Self {
            kind: AssertionKind::Pattern { raw },
            polarity,
            regex,
        })
    }

    #[must_use]
    pub fn polarity(&self) -> Polarity {
        self.polarity
    }

    /// Whether the pattern occurs in `text`, independent of polarity.
    #[must_use]
    pub fn found_in(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }

    /// Final per-assertion verdict.
    #[must_use]
    pub fn holds(&self, text: &str) -> bool {
        self.found_in(text) == (self.polarity == Polarity::MustMatch)
    }

    /// Human-readable form for failure records, e.g. `timeout => '5'` or
    /// `/router bgp 55/`.
    #[must_use]
    pub fn describe(&self) -> String {
        match &self.kind {
            AssertionKind::KeyValue { key, value } => format!("{key} => '{value}'"),
            AssertionKind::Pattern { raw } => format!("/{raw}/"),
        }
    }
}

fn compile(pattern: &str) -> Result<Regex, PatternError> {
    Regex::new(pattern).map_err(|source| PatternError {
        pattern: pattern.to_string(),
        source,
    })
}
