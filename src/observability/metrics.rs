//! Orchestrator counters
//!
//! - Counters only, monotonic
//! - Reset only on process start
//! - Relaxed atomics; exact ordering between counters is not needed

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::transition::TransitionKind;

#[derive(Debug, Default)]
pub struct HaMetrics {
    failovers_started: AtomicU64,
    switchbacks_started: AtomicU64,
    transitions_succeeded: AtomicU64,
    transitions_failed: AtomicU64,
    transitions_rejected: AtomicU64,
    status_reads: AtomicU64,
    status_unavailable: AtomicU64,
    configure_applied: AtomicU64,
    configure_rejected: AtomicU64,
    resets: AtomicU64,
    reconciliations: AtomicU64,
}

impl HaMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_started(&self, kind: TransitionKind) {
        let counter = match kind {
            TransitionKind::Failover => &self.failovers_started,
            TransitionKind::Switchback => &self.switchbacks_started,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_succeeded(&self) {
        self.transitions_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_failed(&self) {
        self.transitions_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// A transition refused because another one held the flag
    pub fn increment_rejected(&self) {
        self.transitions_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_status_reads(&self) {
        self.status_reads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_status_unavailable(&self) {
        self.status_unavailable.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_configure_applied(&self) {
        self.configure_applied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_configure_rejected(&self) {
        self.configure_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_resets(&self) {
        self.resets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_reconciliations(&self) {
        self.reconciliations.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            failovers_started: self.failovers_started.load(Ordering::Relaxed),
            switchbacks_started: self.switchbacks_started.load(Ordering::Relaxed),
            transitions_succeeded: self.transitions_succeeded.load(Ordering::Relaxed),
            transitions_failed: self.transitions_failed.load(Ordering::Relaxed),
            transitions_rejected: self.transitions_rejected.load(Ordering::Relaxed),
            status_reads: self.status_reads.load(Ordering::Relaxed),
            status_unavailable: self.status_unavailable.load(Ordering::Relaxed),
            configure_applied: self.configure_applied.load(Ordering::Relaxed),
            configure_rejected: self.configure_rejected.load(Ordering::Relaxed),
            resets: self.resets.load(Ordering::Relaxed),
            reconciliations: self.reconciliations.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub failovers_started: u64,
    pub switchbacks_started: u64,
    pub transitions_succeeded: u64,
    pub transitions_failed: u64,
    pub transitions_rejected: u64,
    pub status_reads: u64,
    pub status_unavailable: u64,
    pub configure_applied: u64,
    pub configure_rejected: u64,
    pub resets: u64,
    pub reconciliations: u64,
}
