//! Case and suite orchestration.
//!
//! Each case-context pair walks a fixed phase sequence: build the manifest,
//! store it, apply it, verify resource state, verify device state, then
//! re-apply to check idempotence. Every phase appends to the shared
//! [`PassFailResult`]; a transport failure aborts the remaining phases of
//! the current case only, and the suite moves on to the next one.

use netconverge_core::{
    AcceptableCodes, Classified, CommandClass, FailureKind, Lifecycle, PassFailResult, Scope,
    SharedResult, TestCase, classify, render_manifest,
    scope::{anchor_line, scope_region, unscoped_region},
};
use netconverge_exec::{CommandExecutor, CommandOutput, ManifestStore, TransportError};

use crate::idempotence::check_idempotence;
use crate::structured_log::{LogEmitter, LogEntry, LogLevel, Outcome};
use crate::suite::{SuiteError, SuiteSpec};
use crate::verify::{device_assertions, resource_assertions, verify_assertions};

/// Orchestration phase. Phases run in declaration order; `Done` is reached
/// even when intermediate verifications fail, as long as transport holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    ManifestBuilt,
    Applied,
    ResourceVerified,
    DeviceVerified,
    IdempotenceVerified,
    Done,
}

impl Phase {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::ManifestBuilt => "manifest_built",
            Self::Applied => "applied",
            Self::ResourceVerified => "resource_verified",
            Self::DeviceVerified => "device_verified",
            Self::IdempotenceVerified => "idempotence_verified",
            Self::Done => "done",
        }
    }

    /// Human step description used in result labels.
    #[must_use]
    pub const fn describe(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::ManifestBuilt => "store manifest",
            Self::Applied => "apply manifest",
            Self::ResourceVerified => "verify resource state",
            Self::DeviceVerified => "verify device state",
            Self::IdempotenceVerified => "re-apply for idempotence",
            Self::Done => "done",
        }
    }
}

/// Drives a suite against an executor and a manifest store.
pub struct Orchestrator<E, S> {
    exec: E,
    store: S,
    log: Option<LogEmitter>,
}

impl<E: CommandExecutor, S: ManifestStore> Orchestrator<E, S> {
    #[must_use]
    pub fn new(exec: E, store: S) -> Self {
        Self {
            exec,
            store,
            log: None,
        }
    }

    /// Attach a structured log emitter; every recorded step becomes a
    /// `step_result` event.
    #[must_use]
    pub fn with_log(mut self, log: LogEmitter) -> Self {
        self.log = Some(log);
        self
    }

    /// Recover the executor and store, e.g. to inspect a scripted
    /// transcript after a run.
    pub fn into_parts(self) -> (E, S) {
        (self.exec, self.store)
    }

    /// Run every case of the suite under every scope context, plus the
    /// optional setup and teardown phases.
    pub fn run_suite(
        &mut self,
        suite: &SuiteSpec,
        result: &mut PassFailResult,
    ) -> Result<(), SuiteError> {
        self.emit_event(LogLevel::Info, "suite_start", Some(&suite.suite));

        if let Some(setup) = suite.setup.clone() {
            self.run_setup(suite, &setup, result)?;
        }

        for spec in &suite.cases {
            for context in suite.contexts_for(spec) {
                let case = suite.compile_case(spec, context.as_ref())?;
                self.run_case(suite, &case, result)?;
            }
        }

        if suite.teardown {
            self.run_teardown(suite, result)?;
        }

        let outcome = match result.verdict() {
            netconverge_core::Verdict::Pass => Outcome::Pass,
            netconverge_core::Verdict::Fail => Outcome::Fail,
        };
        if let Some(log) = &mut self.log {
            let entry = LogEntry::new("", LogLevel::Info, "suite_end")
                .with_suite(&suite.suite)
                .with_outcome(outcome);
            let _ = log.emit(entry);
        }
        Ok(())
    }

    /// Run a single compiled case through all phases.
    ///
    /// A transport failure records one fatal step and returns `Ok`; the
    /// suite-level error channel is reserved for suite-definition problems.
    pub fn run_case(
        &mut self,
        suite: &SuiteSpec,
        case: &TestCase,
        result: &mut PassFailResult,
    ) -> Result<(), SuiteError> {
        let label = case.step_label();

        // ManifestBuilt: render and store.
        let manifest = render_manifest(&suite.resource, case);
        let step = phase_step(&label, Phase::ManifestBuilt);
        match self
            .store
            .store(&suite.controller, &suite.manifest_path, &manifest)
        {
            Ok(()) => self.record_pass(result, case, Phase::ManifestBuilt, &step),
            Err(err) => {
                self.record_transport(result, case, Phase::ManifestBuilt, &step, &err);
                return Ok(());
            }
        }

        // Applied: converge and check the raw exit code.
        let step = phase_step(&label, Phase::Applied);
        let apply = match self
            .exec
            .execute(&suite.device, &suite.apply_command, CommandClass::Apply)
        {
            Ok(output) => output,
            Err(err) => {
                self.record_transport(result, case, Phase::Applied, &step, &err);
                return Ok(());
            }
        };
        self.check_exit_code(
            result,
            case,
            Phase::Applied,
            &step,
            CommandClass::Apply,
            apply.exit_code,
            &case.apply_codes(),
        );

        // ResourceVerified: query the resource and assert the literals.
        let step = phase_step(&label, Phase::ResourceVerified);
        let command = suite.resource_command_for(case.scope.as_ref());
        match self
            .exec
            .execute(&suite.device, &command, CommandClass::Query)
        {
            Ok(output) => {
                self.check_exit_code(
                    result,
                    case,
                    Phase::ResourceVerified,
                    &format!("{step} :: exit code"),
                    CommandClass::Query,
                    output.exit_code,
                    &case.query_codes(),
                );
                self.verify_resource(case, &output, result)?;
            }
            Err(err) => {
                self.record_transport(result, case, Phase::ResourceVerified, &step, &err);
                return Ok(());
            }
        }

        // DeviceVerified: optional raw-config check.
        if let Some(device_command) = &suite.device_command
            && !case.device_patterns.is_empty()
        {
            let step = phase_step(&label, Phase::DeviceVerified);
            match self
                .exec
                .execute(&suite.device, device_command, CommandClass::Shell)
            {
                Ok(output) => {
                    self.check_exit_code(
                        result,
                        case,
                        Phase::DeviceVerified,
                        &format!("{step} :: exit code"),
                        CommandClass::Shell,
                        output.exit_code,
                        &AcceptableCodes::default(),
                    );
                    self.verify_device(suite, case, &output, result)?;
                }
                Err(err) => {
                    self.record_transport(result, case, Phase::DeviceVerified, &step, &err);
                    return Ok(());
                }
            }
        }

        // IdempotenceVerified: the converged state must be a fixed point.
        // Skipped for negative cases, where the apply was expected to be
        // rejected and there is no converged state to re-apply.
        let expects_convergence =
            case.apply_codes().accepts(0) || case.apply_codes().accepts(2);
        if !expects_convergence {
            return Ok(());
        }
        let step = phase_step(&label, Phase::IdempotenceVerified);
        match check_idempotence(&mut self.exec, &suite.device, &suite.apply_command) {
            Ok(check) if check.converged() => {
                self.record_pass(result, case, Phase::IdempotenceVerified, &step);
            }
            Ok(check) => {
                self.record_failure(
                    result,
                    case,
                    Phase::IdempotenceVerified,
                    &step,
                    FailureKind::NonIdempotentConvergence,
                    "no_change (exit 0)",
                    &format!("{} ({})", check.raw_code, check.outcome.as_str()),
                );
            }
            Err(err) => {
                self.record_transport(result, case, Phase::IdempotenceVerified, &step, &err);
            }
        }
        Ok(())
    }

    /// Pre-test cleanup: one shell command plus absence checks of its
    /// output, so the first case starts from a known-clean device.
    fn run_setup(
        &mut self,
        suite: &SuiteSpec,
        setup: &crate::suite::SetupSpec,
        result: &mut PassFailResult,
    ) -> Result<(), SuiteError> {
        let step = format!("setup :: {}", setup.command);
        let output = match self
            .exec
            .execute(&suite.device, &setup.command, CommandClass::Shell)
        {
            Ok(output) => output,
            Err(err) => {
                self.record_step(result, None, Phase::Init, &step, Err((
                    FailureKind::Transport,
                    "command execution".to_string(),
                    err.to_string(),
                )));
                return Ok(());
            }
        };

        let codes = match &setup.acceptable_codes {
            Some(codes) => AcceptableCodes::new(codes.clone()),
            None => AcceptableCodes::default(),
        };
        if codes.accepts(output.exit_code) {
            self.record_step(result, None, Phase::Init, &step, Ok(()));
        } else {
            self.record_step(result, None, Phase::Init, &step, Err((
                FailureKind::UnexpectedExitCode,
                format!("exit code in {codes}"),
                output.exit_code.to_string(),
            )));
        }

        let assertions: Result<Vec<_>, _> = setup
            .absent_patterns
            .iter()
            .map(|p| {
                netconverge_core::Assertion::pattern(p, netconverge_core::Polarity::MustNotMatch)
            })
            .collect();
        for check in verify_assertions(&output.stdout, &assertions?) {
            let step = format!("setup :: expect absent {}", check.expected);
            if check.passed {
                self.record_step(result, None, Phase::Init, &step, Ok(()));
            } else {
                self.record_step(result, None, Phase::Init, &step, Err((
                    FailureKind::AssertionMismatch,
                    format!("absent: {}", check.expected),
                    check.observed,
                )));
            }
        }
        Ok(())
    }

    /// Final cleanup: apply an absent manifest for every named scope in
    /// declaration order, then for the default scope, and verify through a
    /// resource query that nothing the suite ever expected is still
    /// observable. Both no-change and changed applies are acceptable here.
    fn run_teardown(
        &mut self,
        suite: &SuiteSpec,
        result: &mut PassFailResult,
    ) -> Result<(), SuiteError> {
        let mut contexts: Vec<Option<Scope>> = suite
            .scopes
            .iter()
            .map(|s| Some(Scope::new(s.clone())))
            .collect();
        contexts.push(None);

        let codes = AcceptableCodes::new(vec![0, 2]);
        for context in contexts {
            let absence_props = suite.teardown_absence_props(context.as_ref());
            let case = teardown_case(context, absence_props);
            let label = case.step_label();
            let manifest = render_manifest(&suite.resource, &case);

            let step = phase_step(&label, Phase::ManifestBuilt);
            if let Err(err) =
                self.store
                    .store(&suite.controller, &suite.manifest_path, &manifest)
            {
                self.record_transport(result, &case, Phase::ManifestBuilt, &step, &err);
                return Ok(());
            }
            self.record_pass(result, &case, Phase::ManifestBuilt, &step);

            let step = phase_step(&label, Phase::Applied);
            match self
                .exec
                .execute(&suite.device, &suite.apply_command, CommandClass::Apply)
            {
                Ok(output) => {
                    self.check_exit_code(
                        result,
                        &case,
                        Phase::Applied,
                        &step,
                        CommandClass::Apply,
                        output.exit_code,
                        &codes,
                    );
                }
                Err(err) => {
                    self.record_transport(result, &case, Phase::Applied, &step, &err);
                    return Ok(());
                }
            }

            // Nothing to assert absent for suites without present cases.
            if case.absence_props.is_empty() {
                continue;
            }
            let step = phase_step(&label, Phase::ResourceVerified);
            let command = suite.resource_command_for(case.scope.as_ref());
            match self
                .exec
                .execute(&suite.device, &command, CommandClass::Query)
            {
                Ok(output) => {
                    self.check_exit_code(
                        result,
                        &case,
                        Phase::ResourceVerified,
                        &format!("{step} :: exit code"),
                        CommandClass::Query,
                        output.exit_code,
                        &case.query_codes(),
                    );
                    self.verify_resource(&case, &output, result)?;
                }
                Err(err) => {
                    self.record_transport(result, &case, Phase::ResourceVerified, &step, &err);
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    fn verify_resource(
        &mut self,
        case: &TestCase,
        output: &CommandOutput,
        result: &mut PassFailResult,
    ) -> Result<(), SuiteError> {
        let label = phase_step(&case.step_label(), Phase::ResourceVerified);
        let assertions = resource_assertions(case)?;

        if case.lifecycle == Lifecycle::Absent && assertions.is_empty() {
            self.record_failure(
                result,
                case,
                Phase::ResourceVerified,
                &label,
                FailureKind::AssertionMismatch,
                "at least one absence expectation",
                "no paired present expectations for this case",
            );
            return Ok(());
        }

        let checks = verify_assertions(&output.stdout, &assertions);
        let mut failed = 0usize;
        for check in &checks {
            if !check.passed {
                failed += 1;
                self.record_failure(
                    result,
                    case,
                    Phase::ResourceVerified,
                    &format!("{label} :: {}", check.expected),
                    FailureKind::AssertionMismatch,
                    &expected_text(check),
                    &check.observed,
                );
            }
        }
        if failed == 0 {
            let step = format!("{label} ({} assertions)", checks.len());
            self.record_pass(result, case, Phase::ResourceVerified, &step);
        }
        Ok(())
    }

    fn verify_device(
        &mut self,
        suite: &SuiteSpec,
        case: &TestCase,
        output: &CommandOutput,
        result: &mut PassFailResult,
    ) -> Result<(), SuiteError> {
        let label = phase_step(&case.step_label(), Phase::DeviceVerified);
        let assertions = device_assertions(case)?;

        // Pick the text region the case's scope actually owns, so a pattern
        // present in another scope's block neither satisfies a must-match
        // nor trips a must-not-match.
        let text = match (&case.scope, &suite.scope_anchor) {
            (Some(scope), Some(fmt)) => {
                let anchor = anchor_line(fmt, scope);
                match scope_region(&output.stdout, &anchor) {
                    Some(region) => region,
                    None if case.lifecycle == Lifecycle::Present => {
                        self.record_failure(
                            result,
                            case,
                            Phase::DeviceVerified,
                            &label,
                            FailureKind::AssertionMismatch,
                            &format!("configuration block '{anchor}'"),
                            "scope block not found in device output",
                        );
                        return Ok(());
                    }
                    // An absent case with no block left is already clean.
                    None => String::new(),
                }
            }
            (None, _) if !suite.scopes.is_empty() => {
                unscoped_region(&output.stdout, &suite.anchor_lines())
            }
            _ => output.stdout.clone(),
        };

        let checks = verify_assertions(&text, &assertions);
        let mut failed = 0usize;
        for check in &checks {
            if !check.passed {
                failed += 1;
                self.record_failure(
                    result,
                    case,
                    Phase::DeviceVerified,
                    &format!("{label} :: {}", check.expected),
                    FailureKind::AssertionMismatch,
                    &expected_text(check),
                    &check.observed,
                );
            }
        }
        if failed == 0 {
            let step = format!("{label} ({} patterns)", checks.len());
            self.record_pass(result, case, Phase::DeviceVerified, &step);
        }
        Ok(())
    }

    /// Classify a raw exit code against the acceptable set and record the
    /// step. Apply-class failures carry the agent-convention outcome label.
    fn check_exit_code(
        &mut self,
        result: &mut PassFailResult,
        case: &TestCase,
        phase: Phase,
        step: &str,
        class: CommandClass,
        raw: i32,
        acceptable: &AcceptableCodes,
    ) {
        match classify(class, raw, acceptable) {
            classified if classified.accepted() => {
                self.record_pass(result, case, phase, step);
            }
            Classified::Apply { outcome, .. } => {
                self.record_failure(
                    result,
                    case,
                    phase,
                    step,
                    FailureKind::UnexpectedExitCode,
                    &format!("exit code in {acceptable}"),
                    &format!("{} ({})", raw, outcome.as_str()),
                );
            }
            Classified::Check { .. } => {
                self.record_failure(
                    result,
                    case,
                    phase,
                    step,
                    FailureKind::UnexpectedExitCode,
                    &format!("exit code in {acceptable}"),
                    &raw.to_string(),
                );
            }
        }
    }

    fn record_pass(&mut self, result: &mut PassFailResult, case: &TestCase, phase: Phase, step: &str) {
        self.record_step(result, Some(case), phase, step, Ok(()));
    }

    fn record_failure(
        &mut self,
        result: &mut PassFailResult,
        case: &TestCase,
        phase: Phase,
        step: &str,
        kind: FailureKind,
        expected: &str,
        observed: &str,
    ) {
        self.record_step(
            result,
            Some(case),
            phase,
            step,
            Err((kind, expected.to_string(), observed.to_string())),
        );
    }

    fn record_transport(
        &mut self,
        result: &mut PassFailResult,
        case: &TestCase,
        phase: Phase,
        step: &str,
        err: &TransportError,
    ) {
        self.record_failure(
            result,
            case,
            phase,
            step,
            FailureKind::Transport,
            "command execution",
            &err.to_string(),
        );
    }

    fn record_step(
        &mut self,
        result: &mut PassFailResult,
        case: Option<&TestCase>,
        phase: Phase,
        step: &str,
        outcome: Result<(), (FailureKind, String, String)>,
    ) {
        match &outcome {
            Ok(()) => result.record_pass(step),
            Err((kind, expected, observed)) => {
                result.record_failure(step, *kind, expected.clone(), observed.clone());
            }
        }
        if let Some(log) = &mut self.log {
            let (level, log_outcome) = match &outcome {
                Ok(()) => (LogLevel::Info, Outcome::Pass),
                Err((FailureKind::Transport, ..)) => (LogLevel::Error, Outcome::Error),
                Err(_) => (LogLevel::Error, Outcome::Fail),
            };
            let mut entry = LogEntry::new("", level, "step_result")
                .with_phase(phase.label())
                .with_step(step)
                .with_outcome(log_outcome);
            if let Some(case) = case {
                entry = entry.with_case(&case.name);
                if let Some(scope) = &case.scope {
                    entry = entry.with_scope(&scope.name);
                }
            }
            if let Err((_, expected, observed)) = outcome {
                entry = entry.with_expectation(expected, observed);
            }
            let _ = log.emit(entry);
        }
    }

    fn emit_event(&mut self, level: LogLevel, event: &str, suite: Option<&str>) {
        if let Some(log) = &mut self.log {
            let mut entry = LogEntry::new("", level, event);
            if let Some(suite) = suite {
                entry = entry.with_suite(suite);
            }
            let _ = log.emit(entry);
        }
    }
}

/// Run several independent device suites in parallel, one orchestrator per
/// device, all appending to one shared accumulator. Step order interleaves
/// across devices; order within a device is preserved.
pub fn run_suites<E, S>(
    runs: &mut [(SuiteSpec, Orchestrator<E, S>)],
    shared: &SharedResult,
) -> Result<(), SuiteError>
where
    E: CommandExecutor + Send,
    S: ManifestStore + Send,
{
    std::thread::scope(|scope| {
        let handles: Vec<_> = runs
            .iter_mut()
            .map(|(suite, orch)| {
                scope.spawn(move || -> Result<(), SuiteError> {
                    let mut local = PassFailResult::new();
                    orch.run_suite(suite, &mut local)?;
                    shared.merge(local);
                    Ok(())
                })
            })
            .collect();

        let mut first_err: Option<SuiteError> = None;
        for handle in handles {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    first_err.get_or_insert(err);
                }
                Err(_) => {
                    first_err.get_or_insert(SuiteError::Worker);
                }
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    })
}

fn phase_step(label: &str, phase: Phase) -> String {
    format!("{label} :: {}", phase.describe())
}

fn expected_text(check: &crate::verify::VerificationResult) -> String {
    match check.polarity {
        netconverge_core::Polarity::MustMatch => check.expected.clone(),
        netconverge_core::Polarity::MustNotMatch => format!("absent: {}", check.expected),
    }
}

fn teardown_case(
    scope: Option<Scope>,
    absence_props: std::collections::BTreeMap<String, String>,
) -> TestCase {
    TestCase {
        name: "teardown".into(),
        description: "teardown".into(),
        lifecycle: Lifecycle::Absent,
        manifest_props: Default::default(),
        resource_props: Default::default(),
        device_patterns: Vec::new(),
        scope,
        absence_props,
        apply_codes: Some(vec![0, 2]),
        query_codes: None,
    }
}
