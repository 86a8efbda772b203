//! Availability Reporter
//!
//! Aggregates ledger entries over a calendar-day range. Reports are
//! computed on demand and never cached.

use std::sync::Arc;

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::Serialize;

use crate::errors::{HaError, HaResult};
use crate::ledger::{OperationLedger, OperationLogEntry};
use crate::transition::TransitionKind;

/// Inclusive range of UTC calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> HaResult<Self> {
        if start > end {
            return Err(HaError::InvalidRange(format!(
                "start date {} is after end date {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// Parse two `YYYY-MM-DD` dates.
    pub fn parse(start: &str, end: &str) -> HaResult<Self> {
        Self::new(parse_date(start)?, parse_date(end)?)
    }

    /// Half-open instant bounds: `[start 00:00, end + 1 day 00:00)`.
    pub fn bounds(&self) -> HaResult<(DateTime<Utc>, DateTime<Utc>)> {
        let after_end = self
            .end
            .checked_add_days(Days::new(1))
            .ok_or_else(|| HaError::InvalidRange(format!("end date {} out of range", self.end)))?;
        Ok((
            self.start.and_time(chrono::NaiveTime::MIN).and_utc(),
            after_end.and_time(chrono::NaiveTime::MIN).and_utc(),
        ))
    }
}

fn parse_date(raw: &str) -> HaResult<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
        HaError::InvalidRange(format!("invalid date '{}', expected YYYY-MM-DD", raw))
    })
}

/// Aggregate statistics over a ledger slice.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityReport {
    pub total_attempts: u64,
    pub failover_attempts: u64,
    pub switchback_attempts: u64,
    pub successful_failovers: u64,
    pub successful_switchbacks: u64,
    pub avg_failover_duration_ms: f64,
    pub avg_switchback_duration_ms: f64,
    pub failover_success_rate: f64,
    pub switchback_success_rate: f64,
    pub range_start: NaiveDate,
    pub range_end: NaiveDate,
}

#[derive(Default)]
struct KindStats {
    attempts: u64,
    successes: u64,
    duration_sum: u64,
    timed: u64,
}

impl KindStats {
    fn add(&mut self, entry: &OperationLogEntry) {
        self.attempts += 1;
        if entry.success {
            self.successes += 1;
        }
        // Zero means "not measured" and must not drag the mean down
        if entry.duration_millis > 0 {
            self.duration_sum += entry.duration_millis;
            self.timed += 1;
        }
    }

    fn mean_duration(&self) -> f64 {
        if self.timed == 0 {
            return 0.0;
        }
        round2(self.duration_sum as f64 / self.timed as f64)
    }

    fn success_rate(&self) -> f64 {
        if self.attempts == 0 {
            return 0.0;
        }
        round2(self.successes as f64 / self.attempts as f64 * 100.0)
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Pure aggregation; `entries` must already be restricted to `range`.
pub fn aggregate(range: DateRange, entries: &[OperationLogEntry]) -> AvailabilityReport {
    let mut failover = KindStats::default();
    let mut switchback = KindStats::default();
    for entry in entries {
        match entry.kind {
            TransitionKind::Failover => failover.add(entry),
            TransitionKind::Switchback => switchback.add(entry),
        }
    }

    AvailabilityReport {
        total_attempts: failover.attempts + switchback.attempts,
        failover_attempts: failover.attempts,
        switchback_attempts: switchback.attempts,
        successful_failovers: failover.successes,
        successful_switchbacks: switchback.successes,
        avg_failover_duration_ms: failover.mean_duration(),
        avg_switchback_duration_ms: switchback.mean_duration(),
        failover_success_rate: failover.success_rate(),
        switchback_success_rate: switchback.success_rate(),
        range_start: range.start,
        range_end: range.end,
    }
}

/// Reads the ledger and aggregates it.
#[derive(Clone)]
pub struct AvailabilityReporter {
    ledger: Arc<dyn OperationLedger>,
}

impl AvailabilityReporter {
    pub fn new(ledger: Arc<dyn OperationLedger>) -> Self {
        Self { ledger }
    }

    pub fn generate_report(&self, range: DateRange) -> HaResult<AvailabilityReport> {
        let entries = self.entries(range)?;
        Ok(aggregate(range, &entries))
    }

    /// Raw ledger entries in the range.
    pub fn entries(&self, range: DateRange) -> HaResult<Vec<OperationLogEntry>> {
        let (start, end) = range.bounds()?;
        self.ledger.query(start, end)
    }
}
