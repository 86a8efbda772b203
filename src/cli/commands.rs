//! CLI command implementations
//!
//! Every command except `init` and `serve` is one-shot: open the data
//! directory, reconcile any interrupted transition, run, print one JSON
//! object to stdout.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde_json::json;
use tracing::info;

use crate::backend::{CommandBackend, SimulatedPair};
use crate::http_server::HttpServer;
use crate::observability::{init_logging, Event};
use crate::orchestrator::Orchestrator;
use crate::pair::PairConfig;
use crate::report::DateRange;

use super::args::{Command, RangeArgs};
use super::config::{BackendConfig, Config};
use super::errors::{CliError, CliResult};
use super::io::{read_request, write_response};

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Init { config } => init(&config.config),
        Command::Serve { config, port } => serve(&config.config, port),
        Command::Status { config } => status(&config.config),
        Command::State { config } => state(&config.config),
        Command::Configure { config, pair } => configure(&config.config, pair.as_deref()),
        Command::Failover { config } => failover(&config.config),
        Command::Switchback { config } => switchback(&config.config),
        Command::Reset { config } => reset(&config.config),
        Command::Report { config, range } => report(&config.config, &range),
        Command::Operations { config, range } => operations(&config.config, &range),
    }
}

/// Initialize a new data directory
///
/// Creates the directory layout only. No state file or ledger entry is
/// written until the first command runs.
pub fn init(config_path: &Path) -> CliResult<()> {
    let config = load_config(config_path)?;
    let data_dir = config.data_path();

    if is_initialized(data_dir) {
        return Err(CliError::already_initialized());
    }

    let dirs = [data_dir.join("metadata"), data_dir.join("ledger")];

    for dir in &dirs {
        fs::create_dir_all(dir).map_err(|e| {
            CliError::config_error(format!("Failed to create directory {:?}: {}", dir, e))
        })?;
    }

    write_response(&json!({"initialized": true}))?;

    Ok(())
}

/// Boot the orchestrator and serve the admin API
pub fn serve(config_path: &Path, port: Option<u16>) -> CliResult<()> {
    let config = load_config(config_path)?;
    let orchestrator = Arc::new(boot(&config)?);

    let mut http_config = config.http.clone();
    if let Some(port) = port {
        http_config.port = port;
    }
    let server = HttpServer::with_config(http_config, orchestrator);

    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::boot_failed(format!("Failed to create tokio runtime: {}", e)))?;

    rt.block_on(async {
        server
            .start()
            .await
            .map_err(|e| CliError::boot_failed(format!("HTTP server failed: {}", e)))
    })?;

    Ok(())
}

pub fn status(config_path: &Path) -> CliResult<()> {
    let orchestrator = boot(&load_config(config_path)?)?;
    write_response(&orchestrator.status()?)
}

pub fn state(config_path: &Path) -> CliResult<()> {
    let orchestrator = boot(&load_config(config_path)?)?;
    write_response(&orchestrator.state()?)
}

/// Apply a pair configuration from `pair_path`, or from stdin
pub fn configure(config_path: &Path, pair_path: Option<&Path>) -> CliResult<()> {
    let config = load_config(config_path)?;

    let pair: PairConfig = match pair_path {
        Some(path) => {
            let content = fs::read_to_string(path).map_err(|e| {
                CliError::io_error(format!("Failed to read {}: {}", path.display(), e))
            })?;
            serde_json::from_str(&content)?
        }
        None => read_request()?,
    };

    let orchestrator = boot(&config)?;
    write_response(&orchestrator.configure(pair)?)
}

/// An attempt that ran but did not succeed is still reported with status
/// `ok`; the outcome carries `success: false`.
pub fn failover(config_path: &Path) -> CliResult<()> {
    let orchestrator = boot(&load_config(config_path)?)?;
    write_response(&orchestrator.failover()?)
}

pub fn switchback(config_path: &Path) -> CliResult<()> {
    let orchestrator = boot(&load_config(config_path)?)?;
    write_response(&orchestrator.switchback()?)
}

pub fn reset(config_path: &Path) -> CliResult<()> {
    let orchestrator = boot(&load_config(config_path)?)?;
    let transition_state = orchestrator.reset()?;
    write_response(&json!({
        "transitionState": transition_state,
        "message": "Transition state reset",
    }))
}

pub fn report(config_path: &Path, range: &RangeArgs) -> CliResult<()> {
    let config = load_config(config_path)?;
    let range = DateRange::parse(&range.start, &range.end)?;
    let orchestrator = boot(&config)?;
    write_response(&orchestrator.availability_report(range)?)
}

pub fn operations(config_path: &Path, range: &RangeArgs) -> CliResult<()> {
    let config = load_config(config_path)?;
    let range = DateRange::parse(&range.start, &range.end)?;
    let orchestrator = boot(&config)?;
    write_response(&orchestrator.operations(range)?)
}

// ==================
// Boot
// ==================

fn load_config(config_path: &Path) -> CliResult<Config> {
    let config = Config::load(config_path)?;
    init_logging(config.log_format);
    info!(
        event = %Event::ConfigLoaded,
        path = %config_path.display(),
        data_dir = %config.data_dir,
        "configuration loaded"
    );
    Ok(config)
}

/// Check if data directory is initialized
fn is_initialized(data_dir: &Path) -> bool {
    data_dir.join("metadata").is_dir()
}

/// Open state and ledger, build the backend, reconcile.
fn boot(config: &Config) -> CliResult<Orchestrator> {
    let data_dir = config.data_path();
    if !is_initialized(data_dir) {
        return Err(CliError::not_initialized());
    }

    info!(event = %Event::BootStart, data_dir = %data_dir.display(), "booting orchestrator");

    let options = config.orchestrator_options();
    let orchestrator = match config.backend {
        BackendConfig::Simulated { persist } => {
            let pair = if persist {
                SimulatedPair::persistent(&config.simulated_state_path())?
            } else {
                SimulatedPair::new()
            };
            Orchestrator::open(data_dir, Arc::new(pair), options)?
        }
        BackendConfig::Command(ref command) => {
            let backend = CommandBackend::new(command.clone())?;
            Orchestrator::open(data_dir, Arc::new(backend), options)?
        }
    };

    info!(
        event = %Event::BootComplete,
        backend = orchestrator.backend_name(),
        "orchestrator ready"
    );
    Ok(orchestrator)
}
