//! CLI module for the HA orchestrator
//!
//! Provides command-line interface for:
//! - init: Create directory structure
//! - serve: Boot and serve the admin HTTP API
//! - status / state: Read-only inspection
//! - configure / failover / switchback / reset: Operator actions
//! - report / operations: Availability history

mod args;
mod commands;
mod config;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{run, run_command};
pub use config::{BackendConfig, Config};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{read_request, write_error, write_response};
