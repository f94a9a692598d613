#![cfg_attr(
    test,
    allow(
        clippy::panic,
        clippy::print_stdout,
        clippy::print_stderr,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::use_debug,
        clippy::dbg_macro,
        clippy::panic_in_result_fn,
        clippy::unwrap_in_result,
        reason = "Test-only output and panic-based assertions are permitted."
    )
)]
// gate-cli/src/main.rs
// ============================================================================
// Module: Gate CLI Entry Point
// Description: Command dispatcher for task runs, bundle sealing, standalone
//              Gate evaluation, reproducibility checks, and the Monitor.
// Purpose: A thin shell over gate-core/gate-engine/gate-adapters/
//          gate-orchestrator/gate-monitor; no verification logic lives here.
// Dependencies: clap, gate-core, gate-engine, gate-adapters,
//               gate-orchestrator, gate-evidence, gate-monitor, serde_json,
//               thiserror, tokio, toml.
// ============================================================================

//! ## Overview
//! Every subcommand reads its inputs from the filesystem, calls straight
//! into the library crates, and writes one JSON document (or a short
//! status line) to stdout. The exit code always reflects the outcome
//! (`VerdictStatus::exit_code`, or failure/success for sealing and
//! reproducibility checks) so the CLI can drive CI without parsing its own
//! output.

// ============================================================================
// SECTION: Imports
// ============================================================================

mod config;

use std::fs;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use gate_adapters::AdapterRuntime;
use gate_core::ArtifactStore;
use gate_core::Claim;
use gate_core::Commitment;
use gate_core::ProfileRegistry;
use gate_core::TaskId;
use gate_engine::GateEngine;
use gate_evidence::EvidenceDb;
use gate_monitor::HttpVerdictSink;
use gate_orchestrator::CancelToken;
use gate_orchestrator::Orchestrator;
use gate_orchestrator::RunOutcome;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::config::GateConfig;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "gate", disable_help_subcommand = true, arg_required_else_help = true)]
struct Cli {
    /// Print version information and exit.
    #[arg(long = "version", action = clap::ArgAction::SetTrue, global = true)]
    show_version: bool,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a task end-to-end: Claim ingestion, adapter plan, seal, Gate,
    /// persist, and best-effort Monitor push.
    RunTask(RunTaskCommand),
    /// Seal a task's Artifact Store directory into an immutable bundle.
    Seal(SealCommand),
    /// Verify a sealed bundle's artifacts against their recorded checksums.
    VerifyBundle(VerifyBundleCommand),
    /// Evaluate the Gate directly against an already-sealed bundle, without
    /// running any adapters.
    Evaluate(EvaluateCommand),
    /// Evaluate the Gate twice and confirm the verdict bytes are
    /// reproducible modulo the timestamp (spec.md §8).
    VerifyReproducible(EvaluateCommand),
    /// Serve the Monitor's read/push HTTP API.
    Serve(ServeCommand),
}

/// Shared config-file flag used by every subcommand.
#[derive(Args, Debug)]
struct ConfigArg {
    /// Optional config file path (defaults to `gate.toml` or `GATE_CONFIG`).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Arguments for `run-task`.
#[derive(Args, Debug)]
struct RunTaskCommand {
    /// Shared config-file flag.
    #[command(flatten)]
    config: ConfigArg,
    /// Path to the Commitment JSON file.
    #[arg(long, value_name = "PATH")]
    commitment: PathBuf,
    /// Path to the Claim JSON file. Omit to exercise the missing-Claim path.
    #[arg(long, value_name = "PATH")]
    claim: Option<PathBuf>,
    /// Monitor base URL to best-effort push the decided verdict to
    /// (e.g. `http://127.0.0.1:8090`). Omit to push nowhere.
    #[arg(long, value_name = "URL")]
    monitor_url: Option<String>,
}

/// Arguments for `seal`.
#[derive(Args, Debug)]
struct SealCommand {
    /// Artifact Store root directory.
    #[arg(long, value_name = "DIR")]
    store_root: PathBuf,
    /// Task identifier whose directory should be sealed.
    #[arg(long, value_name = "ID")]
    task_id: String,
}

/// Arguments for `verify-bundle`.
#[derive(Args, Debug)]
struct VerifyBundleCommand {
    /// Artifact Store root directory.
    #[arg(long, value_name = "DIR")]
    store_root: PathBuf,
    /// Task identifier whose bundle should be verified.
    #[arg(long, value_name = "ID")]
    task_id: String,
}

/// Arguments for `evaluate` and `verify-reproducible`.
#[derive(Args, Debug)]
struct EvaluateCommand {
    /// Artifact Store root directory holding the already-sealed bundle.
    #[arg(long, value_name = "DIR")]
    store_root: PathBuf,
    /// Path to the Commitment JSON file.
    #[arg(long, value_name = "PATH")]
    commitment: PathBuf,
    /// Path to the Claim JSON file. Omit to exercise the missing-Claim path.
    #[arg(long, value_name = "PATH")]
    claim: Option<PathBuf>,
    /// Path to the `profiles.json` registry.
    #[arg(long, value_name = "PATH")]
    profile_registry: PathBuf,
}

/// Arguments for `serve`.
#[derive(Args, Debug)]
struct ServeCommand {
    /// Shared config-file flag.
    #[command(flatten)]
    config: ConfigArg,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`] from a message.
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();

    if cli.show_version {
        write_stdout_line(&format!("gate {}", env!("CARGO_PKG_VERSION")))
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        return Ok(ExitCode::SUCCESS);
    }

    match cli.command {
        Commands::RunTask(command) => command_run_task(&command),
        Commands::Seal(command) => command_seal(&command),
        Commands::VerifyBundle(command) => command_verify_bundle(&command),
        Commands::Evaluate(command) => command_evaluate(&command),
        Commands::VerifyReproducible(command) => command_verify_reproducible(&command),
        Commands::Serve(command) => command_serve(command).await,
    }
}

// ============================================================================
// SECTION: run-task
// ============================================================================

/// Executes `run-task`.
fn command_run_task(command: &RunTaskCommand) -> CliResult<ExitCode> {
    let config = GateConfig::load(command.config.config.as_deref())
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    let commitment: Commitment = read_json(&command.commitment)?;
    let claim: Option<Claim> = command.claim.as_deref().map(read_json).transpose()?;

    let registry = ProfileRegistry::load(&config.profile_registry)
        .map_err(|err| CliError::new(format!("failed to load profile registry: {err}")))?;
    let profile = registry
        .get(&commitment.profile)
        .map_err(|err| CliError::new(format!("failed to resolve profile: {err}")))?;

    let store = ArtifactStore::new(config.store_root.clone());
    let runtime = AdapterRuntime::discover(&config.adapter_dir)
        .map_err(|err| CliError::new(format!("adapter discovery failed: {err}")))?;
    let evidence = EvidenceDb::open(&config.evidence_db)
        .map_err(|err| CliError::new(format!("failed to open evidence db: {err}")))?;

    let mut orchestrator = Orchestrator::new(store, runtime, evidence);
    if let Some(monitor_url) = &command.monitor_url {
        let sink = HttpVerdictSink::new(monitor_url.clone())
            .map_err(|err| CliError::new(format!("failed to build monitor sink: {err}")))?;
        orchestrator = orchestrator.with_sink(Arc::new(sink));
    }

    let cancel = CancelToken::new();
    let outcome = orchestrator
        .run_task(&commitment, claim.as_ref(), profile, &cancel)
        .map_err(|err| CliError::new(format!("task run failed: {err}")))?;

    match outcome {
        RunOutcome::Persisted(verdict) => {
            let exit_code = verdict.status.exit_code();
            print_json(&verdict)?;
            Ok(ExitCode::from(exit_code))
        }
        RunOutcome::CancelledBeforeMeasurement => {
            write_stdout_line("cancelled before measurement; no verdict was produced")
                .map_err(|err| CliError::new(output_error("stdout", &err)))?;
            Ok(ExitCode::FAILURE)
        }
    }
}

// ============================================================================
// SECTION: seal / verify-bundle
// ============================================================================

/// Executes `seal`.
fn command_seal(command: &SealCommand) -> CliResult<ExitCode> {
    let task_id = parse_task_id(&command.task_id)?;
    let store = ArtifactStore::new(command.store_root.clone());
    let bundle = store.seal(&task_id).map_err(|err| CliError::new(format!("seal failed: {err}")))?;
    print_json(&bundle)?;
    Ok(ExitCode::SUCCESS)
}

/// Executes `verify-bundle`.
fn command_verify_bundle(command: &VerifyBundleCommand) -> CliResult<ExitCode> {
    let task_id = parse_task_id(&command.task_id)?;
    let store = ArtifactStore::new(command.store_root.clone());
    match store.verify(&task_id) {
        Ok(()) => {
            write_stdout_line("ok").map_err(|err| CliError::new(output_error("stdout", &err)))?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            write_stdout_line(&format!("mismatch: {err}"))
                .map_err(|output_err| CliError::new(output_error("stdout", &output_err)))?;
            Ok(ExitCode::FAILURE)
        }
    }
}

// ============================================================================
// SECTION: evaluate / verify-reproducible
// ============================================================================

/// Executes `evaluate`.
fn command_evaluate(command: &EvaluateCommand) -> CliResult<ExitCode> {
    let verdict = evaluate_bundle(command)?;
    let exit_code = verdict.status.exit_code();
    print_json(&verdict)?;
    Ok(ExitCode::from(exit_code))
}

/// Executes `verify-reproducible`: evaluates the bundle twice and compares
/// the reproducible byte form (spec.md §8's reproducibility invariant).
fn command_verify_reproducible(command: &EvaluateCommand) -> CliResult<ExitCode> {
    let first = evaluate_bundle(command)?;
    let second = evaluate_bundle(command)?;
    let first_bytes = first
        .reproducible_bytes()
        .map_err(|err| CliError::new(format!("failed to canonicalize first verdict: {err}")))?;
    let second_bytes = second
        .reproducible_bytes()
        .map_err(|err| CliError::new(format!("failed to canonicalize second verdict: {err}")))?;

    if first_bytes == second_bytes {
        write_stdout_line("reproducible")
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        Ok(ExitCode::SUCCESS)
    } else {
        write_stdout_line("not reproducible: repeated evaluation of the same bundle diverged")
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        Ok(ExitCode::FAILURE)
    }
}

/// Loads the inputs an `EvaluateCommand` names and runs the Gate Engine
/// directly against an already-sealed bundle.
fn evaluate_bundle(command: &EvaluateCommand) -> CliResult<gate_core::Verdict> {
    let commitment: Commitment = read_json(&command.commitment)?;
    let claim: Option<Claim> = command.claim.as_deref().map(read_json).transpose()?;
    let registry = ProfileRegistry::load(&command.profile_registry)
        .map_err(|err| CliError::new(format!("failed to load profile registry: {err}")))?;
    let profile = registry
        .get(&commitment.profile)
        .map_err(|err| CliError::new(format!("failed to resolve profile: {err}")))?;
    let store = ArtifactStore::new(command.store_root.clone());
    GateEngine::evaluate(&store, &commitment, claim.as_ref(), profile)
        .map_err(|err| CliError::new(format!("gate evaluation failed: {err}")))
}

// ============================================================================
// SECTION: serve
// ============================================================================

/// Executes `serve`.
async fn command_serve(command: ServeCommand) -> CliResult<ExitCode> {
    let config = GateConfig::load(command.config.config.as_deref())
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    let evidence = EvidenceDb::open(&config.evidence_db)
        .map_err(|err| CliError::new(format!("failed to open evidence db: {err}")))?;
    write_stderr_line(&format!("gate monitor listening on {}", config.monitor.bind))
        .map_err(|err| CliError::new(output_error("stderr", &err)))?;
    gate_monitor::serve(config.monitor.bind, evidence)
        .await
        .map_err(|err| CliError::new(format!("monitor server failed: {err}")))?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Shared Helpers
// ============================================================================

/// Reads and parses a JSON file.
fn read_json<T: DeserializeOwned>(path: &Path) -> CliResult<T> {
    let bytes = fs::read(path)
        .map_err(|err| CliError::new(format!("failed to read {}: {err}", path.display())))?;
    serde_json::from_slice(&bytes)
        .map_err(|err| CliError::new(format!("failed to parse {}: {err}", path.display())))
}

/// Parses a raw task id string into a validated [`TaskId`].
fn parse_task_id(raw: &str) -> CliResult<TaskId> {
    TaskId::new(raw.to_string()).map_err(|err| CliError::new(format!("invalid task id: {err}")))
}

/// Pretty-prints a value as JSON to stdout.
fn print_json<T: serde::Serialize>(value: &T) -> CliResult<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|err| CliError::new(format!("failed to render output: {err}")))?;
    write_stdout_line(&json).map_err(|err| CliError::new(output_error("stdout", &err)))
}

/// Writes a single line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output-stream failure message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    format!("failed to write to {stream}: {error}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
