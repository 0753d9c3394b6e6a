// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod plan;
pub mod policy;
pub mod types;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::{load_and_validate, ConfigSnapshot};
use crate::errors::{Result, RunnerError};
use crate::exec::{output_queue, LogLine, RunOutcome, Supervisor, SupervisorOptions};
use crate::plan::{is_reserved_key, InvocationPlan, PlanBuilder, PlanRequest};
use crate::policy::{SanctionedDirs, APP_DIR_NAME};

/// Build the invocation plan for `request` and supervise it to completion.
///
/// Validation happens before anything touches the filesystem: a rejected
/// configuration returns [`RunnerError::Validation`] with no scratch file
/// created and nothing spawned.
pub async fn run_invocation(
    snapshot: &ConfigSnapshot,
    request: &PlanRequest,
    instruction: Option<&str>,
    queue: Option<mpsc::Sender<LogLine>>,
    cancel: oneshot::Receiver<()>,
    options: SupervisorOptions,
) -> Result<RunOutcome> {
    let plan = PlanBuilder::new(snapshot)
        .with_sanctioned_dirs(options.sanctioned.clone())
        .build(request)?;
    debug!(command = %plan, "invocation plan built");

    Supervisor::new(options).run(plan, instruction, queue, cancel).await
}

/// High-level entry point used by `main.rs`. Returns the exit code.
///
/// This wires together:
/// - config loading
/// - plan building (or printing, with `--print-plan`)
/// - the output printer
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<i32> {
    let snapshot = load_and_validate(&args.config)?;
    info!(config = ?args.config, "configuration loaded");

    let instruction = match (&args.instruction, &args.instruction_file) {
        (Some(text), _) => Some(text.clone()),
        (None, Some(path)) => Some(fs::read_to_string(path)?),
        (None, None) => None,
    };

    let log_file = match &args.log_file {
        Some(path) => path.clone(),
        None => default_log_file()?,
    };

    let mut request = PlanRequest::new(&args.prd, log_file);
    if let Some(level) = &args.tool_log_level {
        request = request.with_log_level(level.clone());
    }

    let options = SupervisorOptions {
        grace: Duration::from_secs(args.grace_seconds),
        sanctioned: SanctionedDirs::platform_default(),
    };

    if args.print_plan {
        let plan = PlanBuilder::new(&snapshot)
            .with_sanctioned_dirs(options.sanctioned.clone())
            .build(&request)?;
        print_plan(&plan, instruction.as_deref());
        return Ok(0);
    }

    let (queue_tx, queue_rx) = output_queue(args.queue_capacity);
    let printer = tokio::spawn(print_lines(queue_rx));

    // Ctrl-C → cancellation.
    let (cancel_tx, cancel_rx) = oneshot::channel();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            return;
        }
        info!("Ctrl+C received; cancelling run");
        let _ = cancel_tx.send(());
    });

    let outcome = run_invocation(
        &snapshot,
        &request,
        instruction.as_deref(),
        Some(queue_tx),
        cancel_rx,
        options,
    )
    .await;

    if let Err(e) = printer.await {
        warn!(error = %e, "output printer task failed");
    }

    let code = outcome?.into_result()?;
    Ok(code.unwrap_or(0))
}

/// `<data dir>/autoprd/logs/run-<YYYYmmdd-HHMMSS>.log`, creating the
/// directory. Falls back to the temp directory without a data dir.
fn default_log_file() -> Result<PathBuf> {
    let base = dirs::data_dir().unwrap_or_else(std::env::temp_dir);
    let dir = base.join(APP_DIR_NAME).join("logs");
    fs::create_dir_all(&dir).map_err(|e| {
        RunnerError::Config(format!("cannot create log directory {dir:?}: {e}"))
    })?;
    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    Ok(dir.join(format!("run-{stamp}.log")))
}

async fn print_lines(mut rx: mpsc::Receiver<LogLine>) {
    while let Some(line) = rx.recv().await {
        let stamp = line.time.format("%H:%M:%S");
        if line.is_error {
            eprintln!("{stamp} {}", line.text);
        } else {
            println!("{stamp} {}", line.text);
        }
    }
}

/// Plan printout for `--print-plan`. Only the keys this program sets are
/// shown from the environment.
fn print_plan(plan: &InvocationPlan, instruction: Option<&str>) {
    println!("autoprd plan");
    println!("  executable: {}", plan.executable());
    println!();

    println!("arguments ({}):", plan.arguments().len());
    for arg in plan.arguments() {
        println!("  {arg}");
    }
    println!();

    println!("environment (set by autoprd):");
    for (key, value) in plan.env_pairs().filter(|(k, _)| is_reserved_key(k)) {
        println!("  {key}={value}");
    }

    if let Some(text) = instruction {
        println!();
        println!("instruction ({} bytes) will be prepended to {}", text.len(), display_prd(plan));
    }

    println!();
    println!("command: {plan}");

    debug!("plan printed (no execution)");
}

fn display_prd(plan: &InvocationPlan) -> String {
    plan.prd_path()
        .map(|p| Path::new(p).display().to_string())
        .unwrap_or_else(|| "<no --prd>".to_string())
}
