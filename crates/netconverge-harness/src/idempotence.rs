//! Idempotence checking: convergence must be a fixed point.
//!
//! A second apply of the same manifest against an already-converged device
//! must classify as no-change. Anything else indicates non-convergent or
//! flapping provider behavior, which is recorded as its own failure
//! category, distinct from a wrong-value mismatch.

use netconverge_core::exit_code::{ExitOutcome, classify_apply};
use netconverge_core::CommandClass;
use netconverge_exec::{CommandExecutor, TransportError};

/// Result of a re-apply.
#[derive(Debug, Clone, Copy)]
pub struct IdempotenceCheck {
    pub raw_code: i32,
    pub outcome: ExitOutcome,
}

impl IdempotenceCheck {
    /// True when the device was already converged.
    #[must_use]
    pub const fn converged(self) -> bool {
        matches!(self.outcome, ExitOutcome::NoChange)
    }
}

/// Re-run the apply command and classify the result.
pub fn check_idempotence<E: CommandExecutor>(
    exec: &mut E,
    host: &str,
    apply_command: &str,
) -> Result<IdempotenceCheck, TransportError> {
    let output = exec.execute(host, apply_command, CommandClass::Apply)?;
    Ok(IdempotenceCheck {
        raw_code: output.exit_code,
        outcome: classify_apply(output.exit_code),
    })
}
