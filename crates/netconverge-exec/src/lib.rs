//! Execution seams for the netconverge harness.
//!
//! The harness never talks to a transport directly: it drives the
//! [`CommandExecutor`] and [`ManifestStore`] traits, and a concrete backend
//! (SSH, console server, lab fabric) implements them elsewhere. This crate
//! also ships the scripted in-memory doubles the harness tests and the
//! replay CLI run against.

#![forbid(unsafe_code)]

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use netconverge_core::CommandClass;

/// Raw result of one remote command: verbatim stdout plus the numeric exit
/// code, propagated without reinterpretation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    pub stdout: String,
    pub exit_code: i32,
}

/// A command that could not be executed at all. Fatal to the current test
/// case; later cases still run.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("session error on {host}: {reason}")]
    Session { host: String, reason: String },
    #[error("no scripted response left for command '{command}'")]
    ScriptExhausted { command: String },
}

/// Sends a command to a named host and returns its raw output.
pub trait CommandExecutor {
    fn execute(
        &mut self,
        host: &str,
        command: &str,
        class: CommandClass,
    ) -> Result<CommandOutput, TransportError>;
}

/// Persists rendered manifest text on the controller host so a subsequent
/// apply against the managed host reads that exact content.
pub trait ManifestStore {
    fn store(&mut self, host: &str, path: &str, manifest: &str) -> Result<(), TransportError>;
}

/// One canned response in a scripted session transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptedResponse {
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub exit_code: i32,
    /// When set, the step surfaces as a transport failure instead of output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport_error: Option<String>,
}

impl ScriptedResponse {
    #[must_use]
    pub fn output(stdout: impl Into<String>, exit_code: i32) -> Self {
        Self {
            stdout: stdout.into(),
            exit_code,
            transport_error: None,
        }
    }

    #[must_use]
    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            exit_code: 0,
            transport_error: Some(reason.into()),
        }
    }
}

/// A command the scripted executor was asked to run, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedCommand {
    pub host: String,
    pub class: CommandClass,
    pub command: String,
}

/// Test-double executor that serves pre-configured responses in order and
/// records every command it was given.
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    responses: VecDeque<ScriptedResponse>,
    transcript: Vec<ExecutedCommand>,
}

impl ScriptedExecutor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_responses(responses: Vec<ScriptedResponse>) -> Self {
        Self {
            responses: responses.into(),
            transcript: Vec::new(),
        }
    }

    /// Queue a successful response.
    pub fn push_output(&mut self, stdout: impl Into<String>, exit_code: i32) {
        self.responses.push_back(ScriptedResponse::output(stdout, exit_code));
    }

    /// Queue a transport failure.
    pub fn push_transport_failure(&mut self, reason: impl Into<String>) {
        self.responses.push_back(ScriptedResponse::failure(reason));
    }

    /// Every command executed so far, in order.
    #[must_use]
    pub fn transcript(&self) -> &[ExecutedCommand] {
        &self.transcript
    }

    /// Responses still queued (zero after a fully-consumed run).
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.responses.len()
    }
}

impl CommandExecutor for ScriptedExecutor {
    fn execute(
        &mut self,
        host: &str,
        command: &str,
        class: CommandClass,
    ) -> Result<CommandOutput, TransportError> {
        self.transcript.push(ExecutedCommand {
            host: host.to_string(),
            class,
            command: command.to_string(),
        });
        let response = self
            .responses
            .pop_front()
            .ok_or_else(|| TransportError::ScriptExhausted {
                command: command.to_string(),
            })?;
        if let Some(reason) = response.transport_error {
            return Err(TransportError::Session {
                host: host.to_string(),
                reason,
            });
        }
        Ok(CommandOutput {
            stdout: response.stdout,
            exit_code: response.exit_code,
        })
    }
}

/// A stored manifest write, for transcript inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredManifest {
    pub host: String,
    pub path: String,
    pub manifest: String,
}

/// In-memory manifest store recording every write.
#[derive(Debug, Default)]
pub struct MemoryStore {
    writes: Vec<StoredManifest>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn writes(&self) -> &[StoredManifest] {
        &self.writes
    }

    /// The most recently stored manifest text, if any.
    #[must_use]
    pub fn last(&self) -> Option<&StoredManifest> {
        self.writes.last()
    }
}

impl ManifestStore for MemoryStore {
    fn store(&mut self, host: &str, path: &str, manifest: &str) -> Result<(), TransportError> {
        self.writes.push(StoredManifest {
            host: host.to_string(),
            path: path.to_string(),
            manifest: manifest.to_string(),
        });
        Ok(())
    }
}
