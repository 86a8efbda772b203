//! Transition outcome and tuning options

use serde::{Deserialize, Serialize};

use crate::errors::HaError;
use crate::transition::{ReadinessPolicy, TransitionKind, TransitionState};

/// Result of one failover or switchback attempt.
///
/// Operational failures are reported here with `success = false`, never as
/// an `Err`; the caller always gets an explicit outcome once an attempt has
/// started.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationOutcome {
    #[serde(rename = "type")]
    pub kind: TransitionKind,
    pub success: bool,
    pub duration_millis: u64,
    pub message: String,
    /// `HA_*` code of the failure
    pub error_code: Option<String>,
    /// Ledger entry recording this attempt
    pub ledger_id: u64,
    pub final_state: TransitionState,
    #[serde(skip)]
    pub error: Option<HaError>,
}

impl OperationOutcome {
    pub(crate) fn new(
        kind: TransitionKind,
        result: &Result<(), HaError>,
        duration_millis: u64,
        ledger_id: u64,
        final_state: TransitionState,
    ) -> Self {
        let (success, message, error) = match result {
            Ok(()) => (true, format!("{} completed successfully", kind.label()), None),
            Err(e) => (false, format!("{} failed: {}", kind.label(), e), Some(e.clone())),
        };
        Self {
            kind,
            success,
            duration_millis,
            message,
            error_code: error.as_ref().map(|e| e.code().to_string()),
            ledger_id,
            final_state,
            error,
        }
    }
}

fn default_max_polls() -> u32 {
    10
}

fn default_poll_interval_ms() -> u64 {
    2000
}

/// How long to wait for a status read to confirm the role swap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationPolicy {
    #[serde(default = "default_max_polls")]
    pub max_polls: u32,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self {
            max_polls: default_max_polls(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl ConfirmationPolicy {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_polls == 0 {
            return Err("confirmation.max_polls must be at least 1".into());
        }
        Ok(())
    }
}

/// Orchestrator tuning
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrchestratorOptions {
    pub readiness: ReadinessPolicy,
    pub confirmation: ConfirmationPolicy,
}
