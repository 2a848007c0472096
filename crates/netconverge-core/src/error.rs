//! Error types for the core model.

use thiserror::Error;

/// A test case that violates a model invariant.
#[derive(Debug, Error)]
pub enum CaseError {
    #[error("case '{name}': lifecycle absent must not carry expected resource properties")]
    AbsentWithResourceProps { name: String },
    #[error("case name must not be empty")]
    EmptyName,
}

/// A raw device pattern that failed to compile.
#[derive(Debug, Error)]
#[error("invalid pattern '{pattern}': {source}")]
pub struct PatternError {
    pub pattern: String,
    #[source]
    pub source: regex::Error,
}
