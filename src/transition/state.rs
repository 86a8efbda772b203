//! Role-Transition State Machine
//!
//! - States are explicit and enumerable
//! - Transitions are explicit method calls, never inferred
//! - Only one transition may be in flight; the state doubles as the
//!   mutual-exclusion flag
//! - TRANSITION_FAILED is left only by an operator reset
//!
//! Crash semantics:
//! - STEADY, TRANSITION_FAILED: no effect
//! - *_IN_PROGRESS: reconciled from live status on restart

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{HaError, HaResult};

/// Kind of role transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransitionKind {
    /// Promote the standby site to primary
    Failover,
    /// Planned swap returning the primary role to the primary site
    Switchback,
}

impl TransitionKind {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Failover => "FAILOVER",
            Self::Switchback => "SWITCHBACK",
        }
    }

    /// Human-readable label for outcome messages
    pub fn label(&self) -> &'static str {
        match self {
            Self::Failover => "Failover",
            Self::Switchback => "Switchback",
        }
    }

    /// The in-progress state for this kind
    pub fn in_progress_state(&self) -> TransitionState {
        match self {
            Self::Failover => TransitionState::FailoverInProgress,
            Self::Switchback => TransitionState::SwitchbackInProgress,
        }
    }
}

impl fmt::Display for TransitionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Current value of the role-transition state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransitionState {
    /// No transition in flight; roles are stable
    #[default]
    Steady,

    /// Failover protocol invoked or about to be
    FailoverInProgress,

    /// Switchback protocol invoked or about to be
    SwitchbackInProgress,

    /// Last attempt failed; operator remediation and reset required
    TransitionFailed,
}

impl TransitionState {
    /// Get the state name for observability.
    pub fn state_name(&self) -> &'static str {
        match self {
            Self::Steady => "STEADY",
            Self::FailoverInProgress => "FAILOVER_IN_PROGRESS",
            Self::SwitchbackInProgress => "SWITCHBACK_IN_PROGRESS",
            Self::TransitionFailed => "TRANSITION_FAILED",
        }
    }

    pub fn is_steady(&self) -> bool {
        matches!(self, Self::Steady)
    }

    /// Check if a transition is in flight.
    pub fn is_in_progress(&self) -> bool {
        self.in_progress_kind().is_some()
    }

    /// Kind of the in-flight transition, if any.
    pub fn in_progress_kind(&self) -> Option<TransitionKind> {
        match self {
            Self::FailoverInProgress => Some(TransitionKind::Failover),
            Self::SwitchbackInProgress => Some(TransitionKind::Switchback),
            _ => None,
        }
    }

    // =========================================================================
    // ALLOWED TRANSITIONS
    // =========================================================================

    /// STEADY → *_IN_PROGRESS
    ///
    /// Any other starting state is rejected with TransitionAlreadyInProgress,
    /// including TRANSITION_FAILED (which still holds the exclusion flag).
    pub fn begin(self, kind: TransitionKind) -> HaResult<Self> {
        match self {
            Self::Steady => Ok(kind.in_progress_state()),
            other => Err(HaError::TransitionAlreadyInProgress(other)),
        }
    }

    /// *_IN_PROGRESS → STEADY
    ///
    /// Role swap confirmed by a post-transition status read.
    pub fn complete(self) -> HaResult<Self> {
        match self {
            Self::FailoverInProgress | Self::SwitchbackInProgress => Ok(Self::Steady),
            other => Err(HaError::ForbiddenTransition {
                from: other,
                to: Self::Steady,
            }),
        }
    }

    /// *_IN_PROGRESS → TRANSITION_FAILED
    pub fn fail(self) -> HaResult<Self> {
        match self {
            Self::FailoverInProgress | Self::SwitchbackInProgress => Ok(Self::TransitionFailed),
            other => Err(HaError::ForbiddenTransition {
                from: other,
                to: Self::TransitionFailed,
            }),
        }
    }

    /// TRANSITION_FAILED → STEADY
    ///
    /// Operator-triggered after manual remediation.
    pub fn reset(self) -> HaResult<Self> {
        match self {
            Self::TransitionFailed => Ok(Self::Steady),
            other => Err(HaError::ForbiddenTransition {
                from: other,
                to: Self::Steady,
            }),
        }
    }
}

impl fmt::Display for TransitionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.state_name())
    }
}
