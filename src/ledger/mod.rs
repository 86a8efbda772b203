//! Operation Ledger
//!
//! Append-only record of every transition attempt. There is no update or
//! delete. The orchestrator guarantees at most one append per attempt.

mod entry;
mod file;
mod memory;

pub use entry::{NewOperation, OperationLogEntry};
pub use file::FileLedger;
pub use memory::MemoryLedger;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::HaResult;

/// Durable log of transition attempts
pub trait OperationLedger: Send + Sync {
    /// Append one entry and return it with its assigned id.
    fn append(&self, op: NewOperation) -> HaResult<OperationLogEntry>;

    /// Entries started in `[start, end)`, ascending by start time.
    fn query(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> HaResult<Vec<OperationLogEntry>>;

    /// Entry recorded for a given attempt, if any.
    fn find_attempt(&self, attempt_id: Uuid) -> HaResult<Option<OperationLogEntry>>;
}
