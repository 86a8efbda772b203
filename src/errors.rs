//! HA Orchestrator Error Types
//!
//! Validation errors (InvalidConfig, InvalidRange, TransitionAlreadyInProgress)
//! never have side effects. Operational errors raised during a transition
//! (PreconditionNotMet, ProtocolError, ConfirmationTimeout) are always written
//! to the operation ledger before they reach the caller.

use std::io;

use thiserror::Error;

use crate::pair::Site;
use crate::transition::TransitionState;

/// Result type for orchestrator operations
pub type HaResult<T> = Result<T, HaError>;

/// Orchestrator errors
#[derive(Debug, Clone, Error)]
pub enum HaError {
    #[error("invalid pair configuration: {0}")]
    InvalidConfig(String),

    #[error("pair has not been configured")]
    NotConfigured,

    #[error("configuration rejected while transition state is {0}")]
    ConfigurationConflict(TransitionState),

    #[error("topology apply failed on {site} site: {message}")]
    ConfigurationApplyFailed { site: Site, message: String },

    #[error("neither instance of the pair is reachable")]
    StatusUnavailable,

    #[error("a transition is already in progress ({0})")]
    TransitionAlreadyInProgress(TransitionState),

    #[error("precondition not met: {0}")]
    PreconditionNotMet(String),

    #[error("role-change protocol failed: {0}")]
    ProtocolError(String),

    #[error("role swap not confirmed after {polls} status polls")]
    ConfirmationTimeout { polls: u32 },

    #[error("forbidden transition: {from} -> {to}")]
    ForbiddenTransition {
        from: TransitionState,
        to: TransitionState,
    },

    #[error("invalid range: {0}")]
    InvalidRange(String),

    #[error("operation ledger corrupted: {0}")]
    LedgerCorrupted(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl HaError {
    /// Stable machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            HaError::InvalidConfig(_) => "HA_INVALID_CONFIG",
            HaError::NotConfigured => "HA_NOT_CONFIGURED",
            HaError::ConfigurationConflict(_) => "HA_CONFIGURATION_CONFLICT",
            HaError::ConfigurationApplyFailed { .. } => "HA_CONFIGURATION_APPLY_FAILED",
            HaError::StatusUnavailable => "HA_STATUS_UNAVAILABLE",
            HaError::TransitionAlreadyInProgress(_) => "HA_TRANSITION_ALREADY_IN_PROGRESS",
            HaError::PreconditionNotMet(_) => "HA_PRECONDITION_NOT_MET",
            HaError::ProtocolError(_) => "HA_PROTOCOL_ERROR",
            HaError::ConfirmationTimeout { .. } => "HA_CONFIRMATION_TIMEOUT",
            HaError::ForbiddenTransition { .. } => "HA_FORBIDDEN_TRANSITION",
            HaError::InvalidRange(_) => "HA_INVALID_RANGE",
            HaError::LedgerCorrupted(_) => "HA_LEDGER_CORRUPTED",
            HaError::Storage(_) => "HA_STORAGE_ERROR",
        }
    }

    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            HaError::InvalidConfig(_) => 400,
            HaError::InvalidRange(_) => 400,
            HaError::NotConfigured => 412,
            HaError::ConfigurationConflict(_) => 409,
            HaError::TransitionAlreadyInProgress(_) => 409,
            HaError::ForbiddenTransition { .. } => 409,
            HaError::PreconditionNotMet(_) => 422,
            HaError::ConfigurationApplyFailed { .. } => 502,
            HaError::ProtocolError(_) => 502,
            HaError::StatusUnavailable => 503,
            HaError::ConfirmationTimeout { .. } => 504,
            HaError::LedgerCorrupted(_) => 500,
            HaError::Storage(_) => 500,
        }
    }

    /// Whether the caller may retry the same request later.
    ///
    /// Transition failures are not retryable: the pair is left in
    /// TRANSITION_FAILED until an operator resets it.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            HaError::ConfigurationConflict(_)
                | HaError::StatusUnavailable
                | HaError::ConfigurationApplyFailed { .. }
        )
    }

    /// Whether this error was produced by an attempted transition and
    /// therefore recorded in the ledger.
    pub fn is_operational(&self) -> bool {
        matches!(
            self,
            HaError::PreconditionNotMet(_)
                | HaError::ProtocolError(_)
                | HaError::ConfirmationTimeout { .. }
        )
    }
}

impl From<io::Error> for HaError {
    fn from(e: io::Error) -> Self {
        HaError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for HaError {
    fn from(e: serde_json::Error) -> Self {
        HaError::Storage(format!("JSON error: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(HaError::InvalidConfig("x".into()).status_code(), 400);
        assert_eq!(
            HaError::TransitionAlreadyInProgress(TransitionState::FailoverInProgress).status_code(),
            409
        );
        assert_eq!(HaError::StatusUnavailable.status_code(), 503);
        assert_eq!(HaError::ConfirmationTimeout { polls: 3 }.status_code(), 504);
    }

    #[test]
    fn test_retry_guidance() {
        assert!(HaError::StatusUnavailable.is_retryable());
        assert!(HaError::ConfigurationConflict(TransitionState::TransitionFailed).is_retryable());
        assert!(!HaError::InvalidRange("x".into()).is_retryable());
        assert!(!HaError::ProtocolError("x".into()).is_retryable());
    }

    #[test]
    fn test_operational_errors() {
        assert!(HaError::PreconditionNotMet("x".into()).is_operational());
        assert!(HaError::ConfirmationTimeout { polls: 1 }.is_operational());
        assert!(!HaError::TransitionAlreadyInProgress(TransitionState::Steady).is_operational());
    }

    #[test]
    fn test_display_includes_state() {
        let err = HaError::ConfigurationConflict(TransitionState::FailoverInProgress);
        assert!(err.to_string().contains("FAILOVER_IN_PROGRESS"));
    }
}
