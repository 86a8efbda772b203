//! CLI argument definitions using clap
//!
//! Commands:
//! - haorch init --config <path>
//! - haorch serve --config <path> [--port <port>]
//! - haorch status | state | failover | switchback | reset --config <path>
//! - haorch configure --config <path> [--pair <file>]
//! - haorch report | operations --config <path> --start <date> --end <date>

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// haorch - primary/standby HA orchestrator
#[derive(Parser, Debug)]
#[command(name = "haorch")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone)]
pub struct ConfigArg {
    /// Path to configuration file
    #[arg(long, default_value = "./ha-orchestrator.json")]
    pub config: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct RangeArgs {
    /// First day, YYYY-MM-DD
    #[arg(long)]
    pub start: String,

    /// Last day (inclusive), YYYY-MM-DD
    #[arg(long)]
    pub end: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Initialize a new data directory
    Init {
        #[command(flatten)]
        config: ConfigArg,
    },

    /// Start the admin HTTP API
    Serve {
        #[command(flatten)]
        config: ConfigArg,

        /// Override the configured port
        #[arg(long)]
        port: Option<u16>,
    },

    /// Read live replication status of the pair
    Status {
        #[command(flatten)]
        config: ConfigArg,
    },

    /// Show transition state and active pair configuration
    State {
        #[command(flatten)]
        config: ConfigArg,
    },

    /// Validate and apply a pair configuration
    Configure {
        #[command(flatten)]
        config: ConfigArg,

        /// JSON pair configuration file; read from stdin when omitted
        #[arg(long)]
        pair: Option<PathBuf>,
    },

    /// Promote the standby site
    Failover {
        #[command(flatten)]
        config: ConfigArg,
    },

    /// Return the primary role to the primary site
    Switchback {
        #[command(flatten)]
        config: ConfigArg,
    },

    /// Clear TRANSITION_FAILED after manual remediation
    Reset {
        #[command(flatten)]
        config: ConfigArg,
    },

    /// Availability report over a date range
    Report {
        #[command(flatten)]
        config: ConfigArg,

        #[command(flatten)]
        range: RangeArgs,
    },

    /// List recorded transition attempts over a date range
    Operations {
        #[command(flatten)]
        config: ConfigArg,

        #[command(flatten)]
        range: RangeArgs,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
