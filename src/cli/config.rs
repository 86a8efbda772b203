//! Configuration file
//!
//! Single JSON object. Only `data_dir` is required.
//!
//! ```json
//! {
//!   "data_dir": "/var/lib/haorch",
//!   "http": { "host": "127.0.0.1", "port": 8470 },
//!   "readiness": { "failover_ready": ["TO PRIMARY"], "max_apply_gap_seconds": 30 },
//!   "confirmation": { "max_polls": 10, "poll_interval_ms": 2000 },
//!   "backend": { "kind": "simulated" },
//!   "log_format": "json"
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::errors::{CliError, CliResult};
use crate::backend::CommandBackendConfig;
use crate::http_server::HttpServerConfig;
use crate::observability::LogFormat;
use crate::orchestrator::{ConfirmationPolicy, OrchestratorOptions};
use crate::transition::ReadinessPolicy;

fn default_true() -> bool {
    true
}

/// Which collaborator implementation drives the pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendConfig {
    /// In-memory drill pair
    Simulated {
        /// Keep simulated roles in `data_dir/simulated/pair.json`
        #[serde(default = "default_true")]
        persist: bool,
    },
    /// External tooling
    Command(CommandBackendConfig),
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Simulated { persist: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory (required)
    pub data_dir: String,

    #[serde(default)]
    pub http: HttpServerConfig,

    #[serde(default)]
    pub readiness: ReadinessPolicy,

    #[serde(default)]
    pub confirmation: ConfirmationPolicy,

    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub log_format: LogFormat,
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            CliError::config_error(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> CliResult<Self> {
        let config: Config = serde_json::from_str(content)
            .map_err(|e| CliError::config_error(format!("Invalid config JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> CliResult<()> {
        if self.data_dir.trim().is_empty() {
            return Err(CliError::config_error("data_dir cannot be empty"));
        }
        self.readiness.validate().map_err(CliError::config_error)?;
        self.confirmation.validate().map_err(CliError::config_error)?;
        if let BackendConfig::Command(ref command) = self.backend {
            command
                .validate()
                .map_err(|e| CliError::config_error(e.to_string()))?;
        }
        Ok(())
    }

    /// Get data directory as Path
    pub fn data_path(&self) -> &Path {
        Path::new(&self.data_dir)
    }

    /// Where the simulated backend keeps its roles
    pub fn simulated_state_path(&self) -> PathBuf {
        self.data_path().join("simulated").join("pair.json")
    }

    pub fn orchestrator_options(&self) -> OrchestratorOptions {
        OrchestratorOptions {
            readiness: self.readiness.clone(),
            confirmation: self.confirmation,
        }
    }
}
