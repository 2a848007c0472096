//! Harness CLI.
//!
//! Runs a suite against a scripted session transcript, renders manifests for
//! inspection, and validates structured log files.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use netconverge_core::{PassFailResult, Verdict, render_manifest};
use netconverge_exec::{MemoryStore, ScriptedExecutor, ScriptedResponse};
use netconverge_harness::{
    ArtifactIndex, LogEmitter, Orchestrator, SuiteReport, SuiteSpec, validate_log_file,
};

#[derive(Parser)]
#[command(name = "harness", about = "Declarative device convergence harness")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a suite against a scripted transcript of session responses.
    Run {
        /// Suite definition (JSON).
        suite: PathBuf,
        /// Scripted responses (JSON array), consumed in order.
        transcript: PathBuf,
        /// Write the Markdown report here instead of stdout.
        #[arg(long)]
        report: Option<PathBuf>,
        /// Write a structured JSONL log here.
        #[arg(long)]
        log: Option<PathBuf>,
        /// Timestamp recorded in the report; defaults to the current time.
        #[arg(long)]
        timestamp: Option<String>,
    },
    /// Render the manifest a case would apply, without running anything.
    RenderManifest {
        suite: PathBuf,
        /// Case name as declared in the suite.
        case: String,
        /// Scope context; omitted means the default scope.
        #[arg(long)]
        scope: Option<String>,
    },
    /// Validate a structured JSONL log file against the schema.
    ValidateLog { log: PathBuf },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            suite,
            transcript,
            report,
            log,
            timestamp,
        } => run(&suite, &transcript, report.as_deref(), log.as_deref(), timestamp),
        Command::RenderManifest { suite, case, scope } => {
            render(&suite, &case, scope.as_deref())
        }
        Command::ValidateLog { log } => validate(&log),
    }
}

fn run(
    suite_path: &std::path::Path,
    transcript_path: &std::path::Path,
    report_path: Option<&std::path::Path>,
    log_path: Option<&std::path::Path>,
    timestamp: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let suite = SuiteSpec::from_file(suite_path)?;
    let responses: Vec<ScriptedResponse> =
        serde_json::from_str(&std::fs::read_to_string(transcript_path)?)?;
    let exec = ScriptedExecutor::from_responses(responses);

    let run_id = format!("run-{}", epoch_secs());
    let mut orch = Orchestrator::new(exec, MemoryStore::new());
    if let Some(path) = log_path {
        orch = orch.with_log(LogEmitter::to_file(path, &suite.suite, &run_id)?);
    }

    let mut result = PassFailResult::new();
    orch.run_suite(&suite, &mut result)?;

    let timestamp = timestamp.unwrap_or_else(|| format!("@{}", epoch_secs()));
    let report = SuiteReport::new("Convergence Report", &suite.suite, &timestamp, &result);

    match report_path {
        Some(path) => {
            report.write_markdown(path)?;
            let mut index = ArtifactIndex::new();
            index.add_file(path)?;
            if let Some(log) = log_path {
                index.add_file(log)?;
            }
            println!("{}", index.to_json()?);
        }
        None => println!("{}", report.to_markdown()),
    }

    eprintln!(
        "{}: {} steps, {} failed",
        result.verdict().as_str(),
        report.summary.total,
        report.summary.failed
    );
    if result.verdict() == Verdict::Fail {
        return Err(format!("suite '{}' failed", suite.suite).into());
    }
    Ok(())
}

fn render(
    suite_path: &std::path::Path,
    case_name: &str,
    scope: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let suite = SuiteSpec::from_file(suite_path)?;
    let spec = suite
        .cases
        .iter()
        .find(|c| c.name == case_name)
        .ok_or_else(|| format!("no case named '{case_name}' in suite '{}'", suite.suite))?;
    let scope = scope.map(netconverge_core::Scope::new);
    let case = suite.compile_case(spec, scope.as_ref())?;
    print!("{}", render_manifest(&suite.resource, &case));
    Ok(())
}

fn validate(log_path: &std::path::Path) -> Result<(), Box<dyn std::error::Error>> {
    let (lines, errors) = validate_log_file(log_path)?;
    if errors.is_empty() {
        println!("{lines} lines valid");
        Ok(())
    } else {
        for error in &errors {
            eprintln!("{error}");
        }
        Err(format!("{} validation errors in {} lines", errors.len(), lines).into())
    }
}

fn epoch_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
