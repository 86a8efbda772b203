//! In-memory ledger for tests and ephemeral drills.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::entry::{select_range, NewOperation, OperationLogEntry};
use super::OperationLedger;
use crate::errors::HaResult;
use crate::sync::lock;

#[derive(Default)]
pub struct MemoryLedger {
    entries: Mutex<Vec<OperationLogEntry>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries appended so far.
    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every entry in append order.
    pub fn entries(&self) -> Vec<OperationLogEntry> {
        lock(&self.entries).clone()
    }
}

impl OperationLedger for MemoryLedger {
    fn append(&self, op: NewOperation) -> HaResult<OperationLogEntry> {
        let mut entries = lock(&self.entries);
        let entry = op.into_entry(entries.len() as u64 + 1);
        entries.push(entry.clone());
        Ok(entry)
    }

    fn query(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> HaResult<Vec<OperationLogEntry>> {
        Ok(select_range(&lock(&self.entries), start, end))
    }

    fn find_attempt(&self, attempt_id: Uuid) -> HaResult<Option<OperationLogEntry>> {
        Ok(lock(&self.entries)
            .iter()
            .find(|e| e.attempt_id == Some(attempt_id))
            .cloned())
    }
}
