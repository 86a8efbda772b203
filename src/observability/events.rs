//! Observable events
//!
//! Every structured log line carries an `event` field drawn from this
//! enum, so log pipelines can filter on a closed vocabulary.

use std::fmt;

/// Observable events in the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Lifecycle
    BootStart,
    BootComplete,
    ConfigLoaded,
    HttpListening,

    // Status reads
    StatusRead,
    StatusUnavailable,

    // Configuration
    ConfigureApplied,
    ConfigureRejected,

    // Transitions
    /// Transition flag acquired
    TransitionBegin,
    /// Second transition refused while one is in flight
    TransitionRejected,
    PreconditionFailed,
    ProtocolInvoked,
    ProtocolFailed,
    ConfirmationTimeout,
    TransitionComplete,
    TransitionFailed,
    OperatorReset,
    /// In-flight transition found on startup and resolved
    RestartReconciled,

    // Ledger
    LedgerAppend,
    /// Attempt could not be recorded (FATAL for report accuracy)
    LedgerAppendFailed,
}

impl Event {
    /// Returns the event name string
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::BootStart => "BOOT_START",
            Event::BootComplete => "BOOT_COMPLETE",
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::HttpListening => "HTTP_LISTENING",
            Event::StatusRead => "STATUS_READ",
            Event::StatusUnavailable => "STATUS_UNAVAILABLE",
            Event::ConfigureApplied => "CONFIGURE_APPLIED",
            Event::ConfigureRejected => "CONFIGURE_REJECTED",
            Event::TransitionBegin => "TRANSITION_BEGIN",
            Event::TransitionRejected => "TRANSITION_REJECTED",
            Event::PreconditionFailed => "PRECONDITION_FAILED",
            Event::ProtocolInvoked => "PROTOCOL_INVOKED",
            Event::ProtocolFailed => "PROTOCOL_FAILED",
            Event::ConfirmationTimeout => "CONFIRMATION_TIMEOUT",
            Event::TransitionComplete => "TRANSITION_COMPLETE",
            Event::TransitionFailed => "TRANSITION_FAILED",
            Event::OperatorReset => "OPERATOR_RESET",
            Event::RestartReconciled => "RESTART_RECONCILED",
            Event::LedgerAppend => "LEDGER_APPEND",
            Event::LedgerAppendFailed => "LEDGER_APPEND_FAILED",
        }
    }

    /// Whether this event marks a failed operation
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Event::StatusUnavailable
                | Event::ConfigureRejected
                | Event::PreconditionFailed
                | Event::ProtocolFailed
                | Event::ConfirmationTimeout
                | Event::TransitionFailed
                | Event::LedgerAppendFailed
        )
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
