//! Replication Status Reader
//!
//! Reads both instances and normalizes the answers into a [`PairStatus`].
//! One unreachable side is tolerated (its role becomes UNKNOWN); only when
//! neither side answers does the read fail with StatusUnavailable.
//! Reads have no side effects and may run concurrently with a transition.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use super::role::{InstanceReport, ProtectionMode, ReplicationRole};
use crate::backend::InstanceStatusSource;
use crate::errors::{HaError, HaResult};
use crate::observability::Event;
use crate::pair::{PairConfig, Site};

/// Per-instance detail of a status read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceStatus {
    pub site: Site,
    pub address: String,
    pub reachable: bool,
    pub role: ReplicationRole,
    pub protection_mode: ProtectionMode,
    pub readiness: Option<String>,
    pub apply_gap_seconds: Option<u64>,
    /// Why the instance could not be read
    pub error: Option<String>,
}

impl InstanceStatus {
    fn reachable(site: Site, address: String, report: InstanceReport) -> Self {
        let readiness = Some(report.readiness).filter(|r| !r.trim().is_empty());
        Self {
            site,
            address,
            reachable: true,
            role: report.role,
            protection_mode: report.protection_mode,
            readiness,
            apply_gap_seconds: report.apply_gap_seconds,
            error: None,
        }
    }

    fn unreachable(site: Site, address: String, error: String) -> Self {
        Self {
            site,
            address,
            reachable: false,
            role: ReplicationRole::Unknown,
            protection_mode: ProtectionMode::Unknown,
            readiness: None,
            apply_gap_seconds: None,
            error: Some(error),
        }
    }
}

/// Snapshot of the pair. Recomputed on every read, never persisted.
///
/// `primary_role` / `standby_role` are the roles currently reported by the
/// *configured* primary and standby sites. In steady state exactly one of
/// them is PRIMARY; a mismatch during a transition is expected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PairStatus {
    pub primary_role: ReplicationRole,
    pub standby_role: ReplicationRole,
    pub protection_mode: ProtectionMode,
    /// Readiness reported by the standby site
    pub switchover_readiness: Option<String>,
    /// Apply gap reported by whichever instance currently holds the standby role
    pub apply_gap_seconds: Option<u64>,
    pub observed_at: DateTime<Utc>,
    pub primary: InstanceStatus,
    pub standby: InstanceStatus,
}

impl PairStatus {
    /// Combine two per-instance reads into a pair snapshot.
    pub fn from_instances(primary: InstanceStatus, standby: InstanceStatus) -> Self {
        let protection_mode = [&primary, &standby]
            .into_iter()
            .filter(|i| i.reachable)
            .find(|i| i.role == ReplicationRole::Primary)
            .or_else(|| [&primary, &standby].into_iter().find(|i| i.reachable))
            .map(|i| i.protection_mode)
            .unwrap_or(ProtectionMode::Unknown);

        let apply_gap_seconds = [&standby, &primary]
            .into_iter()
            .find(|i| i.role == ReplicationRole::Standby)
            .and_then(|i| i.apply_gap_seconds);

        Self {
            primary_role: primary.role,
            standby_role: standby.role,
            protection_mode,
            switchover_readiness: standby.readiness.clone(),
            apply_gap_seconds,
            observed_at: Utc::now(),
            primary,
            standby,
        }
    }

    /// Role reported by the given site.
    pub fn role_of(&self, site: Site) -> ReplicationRole {
        match site {
            Site::Primary => self.primary_role,
            Site::Standby => self.standby_role,
        }
    }

    /// Exactly one PRIMARY and one STANDBY.
    pub fn is_consistent(&self) -> bool {
        matches!(
            (self.primary_role, self.standby_role),
            (ReplicationRole::Primary, ReplicationRole::Standby)
                | (ReplicationRole::Standby, ReplicationRole::Primary)
        )
    }
}

/// Reads both sites of a pair through an [`InstanceStatusSource`].
#[derive(Clone)]
pub struct StatusReader {
    source: Arc<dyn InstanceStatusSource>,
}

impl StatusReader {
    pub fn new(source: Arc<dyn InstanceStatusSource>) -> Self {
        Self { source }
    }

    /// Read the current pair status.
    ///
    /// # Errors
    ///
    /// `StatusUnavailable` if neither instance answered.
    pub fn read_status(&self, pair: &PairConfig) -> HaResult<PairStatus> {
        let primary = self.read_site(pair, Site::Primary);
        let standby = self.read_site(pair, Site::Standby);

        if !primary.reachable && !standby.reachable {
            warn!(
                event = %Event::StatusUnavailable,
                primary_error = primary.error.as_deref().unwrap_or(""),
                standby_error = standby.error.as_deref().unwrap_or(""),
                "neither instance reachable"
            );
            return Err(HaError::StatusUnavailable);
        }

        let status = PairStatus::from_instances(primary, standby);
        debug!(
            event = %Event::StatusRead,
            primary_role = %status.primary_role,
            standby_role = %status.standby_role,
            readiness = status.switchover_readiness.as_deref().unwrap_or(""),
            "pair status read"
        );
        Ok(status)
    }

    fn read_site(&self, pair: &PairConfig, site: Site) -> InstanceStatus {
        let conn = pair.connection(site);
        let address = conn.address();
        match self.source.query_instance(&conn) {
            Ok(report) => InstanceStatus::reachable(site, address, report),
            Err(e) => InstanceStatus::unreachable(site, address, e.0),
        }
    }
}
