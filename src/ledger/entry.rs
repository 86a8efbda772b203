//! Ledger entry types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::transition::TransitionKind;

/// One transition attempt. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationLogEntry {
    /// Assigned by the ledger, strictly increasing
    pub id: u64,

    #[serde(rename = "type")]
    pub kind: TransitionKind,

    pub started_at: DateTime<Utc>,

    pub duration_millis: u64,

    pub success: bool,

    pub error_message: Option<String>,

    /// Attempt that produced this entry. Lets restart reconciliation tell
    /// whether an interrupted attempt was already recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt_id: Option<Uuid>,
}

/// An entry before the ledger assigns its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOperation {
    pub kind: TransitionKind,
    pub started_at: DateTime<Utc>,
    pub duration_millis: u64,
    pub success: bool,
    pub error_message: Option<String>,
    pub attempt_id: Option<Uuid>,
}

impl NewOperation {
    pub fn succeeded(kind: TransitionKind, started_at: DateTime<Utc>, duration_millis: u64) -> Self {
        Self {
            kind,
            started_at,
            duration_millis,
            success: true,
            error_message: None,
            attempt_id: None,
        }
    }

    pub fn failed(
        kind: TransitionKind,
        started_at: DateTime<Utc>,
        duration_millis: u64,
        error: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            started_at,
            duration_millis,
            success: false,
            error_message: Some(error.into()),
            attempt_id: None,
        }
    }

    pub fn with_attempt(mut self, attempt_id: Uuid) -> Self {
        self.attempt_id = Some(attempt_id);
        self
    }

    pub(crate) fn into_entry(self, id: u64) -> OperationLogEntry {
        OperationLogEntry {
            id,
            kind: self.kind,
            started_at: self.started_at,
            duration_millis: self.duration_millis,
            success: self.success,
            error_message: self.error_message,
            attempt_id: self.attempt_id,
        }
    }
}

/// Entries with `start <= started_at < end`, ascending by start time.
pub(crate) fn select_range(
    entries: &[OperationLogEntry],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Vec<OperationLogEntry> {
    let mut selected: Vec<_> = entries
        .iter()
        .filter(|e| e.started_at >= start && e.started_at < end)
        .cloned()
        .collect();
    selected.sort_by(|a, b| a.started_at.cmp(&b.started_at).then(a.id.cmp(&b.id)));
    selected
}
