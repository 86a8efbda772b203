//! Command Backend
//!
//! Drives a real pair through operator-supplied tooling. Each operation is
//! an argv template; placeholders are substituted before the process is
//! spawned and the exit code decides success.
//!
//! Per-instance placeholders: `{site}`, `{host}`, `{port}`, `{db}`.
//! Pair placeholders: `{primary_host}`, `{primary_port}`, `{primary_db}`,
//! `{standby_host}`, `{standby_port}`, `{standby_db}`.
//!
//! The status command must print an [`InstanceReport`] as JSON on stdout.
//! The admin credential reference is passed in the `HA_CREDENTIAL_REF`
//! environment variable, never on the command line.
//!
//! Every command runs under `timeout_ms`. A command still running at the
//! deadline is killed and counts as failed, so a hung tool cannot hold a
//! transition open past its confirmation budget.

use std::io::{self, Read};
use std::process::{Child, Command, Output, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{
    InstanceStatusSource, PairBackend, ProtocolFailure, RoleChangeProtocol, TopologyApplier,
    Unreachable,
};
use crate::errors::{HaError, HaResult};
use crate::pair::{ConnectionInfo, PairConfig, Site};
use crate::status::InstanceReport;

/// Environment variable carrying the credential reference
pub const CREDENTIAL_ENV: &str = "HA_CREDENTIAL_REF";

/// Default per-command deadline
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

const WAIT_POLL: Duration = Duration::from_millis(10);

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

/// Argv templates for each collaborator call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandBackendConfig {
    /// Query one instance. Runs once per site.
    pub status: Vec<String>,
    pub failover: Vec<String>,
    pub switchback: Vec<String>,
    /// Apply topology to one instance. Empty means nothing to apply.
    #[serde(default)]
    pub apply_topology: Vec<String>,
    /// Deadline for any single command
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for CommandBackendConfig {
    fn default() -> Self {
        Self {
            status: Vec::new(),
            failover: Vec::new(),
            switchback: Vec::new(),
            apply_topology: Vec::new(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl CommandBackendConfig {
    pub fn validate(&self) -> HaResult<()> {
        for (name, argv) in [
            ("status", &self.status),
            ("failover", &self.failover),
            ("switchback", &self.switchback),
        ] {
            if argv.is_empty() || argv[0].trim().is_empty() {
                return Err(HaError::InvalidConfig(format!(
                    "backend.{} command cannot be empty",
                    name
                )));
            }
        }
        if self.timeout_ms == 0 {
            return Err(HaError::InvalidConfig(
                "backend.timeout_ms must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Backend that shells out to external tooling
pub struct CommandBackend {
    config: CommandBackendConfig,
}

impl CommandBackend {
    pub fn new(config: CommandBackendConfig) -> HaResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    fn run(
        &self,
        template: &[String],
        vars: &[(&str, String)],
        credential_ref: &str,
    ) -> io::Result<Output> {
        let argv: Vec<String> = template.iter().map(|arg| substitute(arg, vars)).collect();
        debug!(program = %argv[0], args = argv.len() - 1, "running backend command");
        let child = Command::new(&argv[0])
            .args(&argv[1..])
            .env(CREDENTIAL_ENV, credential_ref)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        wait_with_deadline(child, Duration::from_millis(self.config.timeout_ms))
    }

    fn run_protocol(&self, template: &[String], pair: &PairConfig) -> Result<(), ProtocolFailure> {
        let output = self
            .run(template, &pair_vars(pair), &pair.admin_credential_ref)
            .map_err(|e| ProtocolFailure(format!("failed to run {}: {}", template[0], e)))?;
        check_exit(&output).map_err(ProtocolFailure)
    }
}

impl InstanceStatusSource for CommandBackend {
    fn query_instance(&self, conn: &ConnectionInfo) -> Result<InstanceReport, Unreachable> {
        let output = self
            .run(&self.config.status, &instance_vars(conn), &conn.credential_ref)
            .map_err(|e| Unreachable(format!("status command failed: {}", e)))?;
        check_exit(&output).map_err(Unreachable)?;
        serde_json::from_slice(&output.stdout)
            .map_err(|e| Unreachable(format!("unparseable status output: {}", e)))
    }
}

impl RoleChangeProtocol for CommandBackend {
    fn request_failover(&self, pair: &PairConfig) -> Result<(), ProtocolFailure> {
        self.run_protocol(&self.config.failover, pair)
    }

    fn request_switchback(&self, pair: &PairConfig) -> Result<(), ProtocolFailure> {
        self.run_protocol(&self.config.switchback, pair)
    }
}

impl TopologyApplier for CommandBackend {
    fn apply_topology(&self, site: Site, pair: &PairConfig) -> Result<(), ProtocolFailure> {
        if self.config.apply_topology.is_empty() {
            return Ok(());
        }
        let conn = pair.connection(site);
        let mut vars = instance_vars(&conn);
        vars.extend(pair_vars(pair));
        let output = self
            .run(&self.config.apply_topology, &vars, &conn.credential_ref)
            .map_err(|e| ProtocolFailure(format!("apply command failed: {}", e)))?;
        check_exit(&output).map_err(ProtocolFailure)
    }
}

impl PairBackend for CommandBackend {
    fn name(&self) -> &'static str {
        "command"
    }
}

fn instance_vars(conn: &ConnectionInfo) -> Vec<(&'static str, String)> {
    vec![
        ("site", conn.site.as_str().to_string()),
        ("host", conn.host.clone()),
        ("port", conn.port.to_string()),
        ("db", conn.db_name.clone()),
    ]
}

fn pair_vars(pair: &PairConfig) -> Vec<(&'static str, String)> {
    vec![
        ("primary_host", pair.primary_host.clone()),
        ("primary_port", pair.primary_port.to_string()),
        ("primary_db", pair.primary_db_name.clone()),
        ("standby_host", pair.standby_host.clone()),
        ("standby_port", pair.standby_port.to_string()),
        ("standby_db", pair.standby_db_name.clone()),
    ]
}

fn substitute(template: &str, vars: &[(&str, String)]) -> String {
    let mut out = template.to_string();
    for (name, value) in vars {
        out = out.replace(&format!("{{{}}}", name), value);
    }
    out
}

/// Collect a child's output, killing it if it outlives `timeout`.
///
/// The pipes are drained on their own threads so a chatty child cannot
/// block on a full pipe while we wait. On timeout the readers are not
/// joined: a grandchild may still hold the pipes open.
fn wait_with_deadline(mut child: Child, timeout: Duration) -> io::Result<Output> {
    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);
    let deadline = Instant::now() + timeout;

    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            warn!(timeout_ms = timeout.as_millis() as u64, "backend command timed out");
            return Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("command timed out after {} ms", timeout.as_millis()),
            ));
        }
        thread::sleep(WAIT_POLL);
    };

    Ok(Output {
        status,
        stdout: collect(stdout),
        stderr: collect(stderr),
    })
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

fn collect(reader: Option<thread::JoinHandle<Vec<u8>>>) -> Vec<u8> {
    reader.and_then(|h| h.join().ok()).unwrap_or_default()
}

fn check_exit(output: &Output) -> Result<(), String> {
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    let detail = stderr.trim();
    match output.status.code() {
        Some(code) if detail.is_empty() => Err(format!("command exited with status {}", code)),
        Some(code) => Err(format!("command exited with status {}: {}", code, detail)),
        None => Err("command terminated by signal".to_string()),
    }
}
