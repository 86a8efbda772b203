//! Transition preconditions and confirmation.
//!
//! Readiness vocabulary differs between vendors and versions, so the set of
//! strings accepted as "ready" is configuration, not code.

use serde::{Deserialize, Serialize};

use super::state::TransitionKind;
use crate::status::{PairStatus, ReplicationRole};

fn default_failover_ready() -> Vec<String> {
    vec!["TO PRIMARY".to_string()]
}

fn default_switchback_ready() -> Vec<String> {
    vec!["TO STANDBY".to_string(), "SESSIONS ACTIVE".to_string()]
}

fn default_max_apply_gap() -> Option<u64> {
    Some(30)
}

/// What a status read must show before a transition may start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadinessPolicy {
    /// Standby-site readiness values that allow a failover
    #[serde(default = "default_failover_ready")]
    pub failover_ready: Vec<String>,

    /// Standby-site readiness values that allow a switchback
    #[serde(default = "default_switchback_ready")]
    pub switchback_ready: Vec<String>,

    /// Largest tolerated apply gap. `None` disables the check.
    #[serde(default = "default_max_apply_gap")]
    pub max_apply_gap_seconds: Option<u64>,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self {
            failover_ready: default_failover_ready(),
            switchback_ready: default_switchback_ready(),
            max_apply_gap_seconds: default_max_apply_gap(),
        }
    }
}

impl ReadinessPolicy {
    /// Check the precondition for `kind`. The error is a human-readable reason.
    pub fn check(&self, kind: TransitionKind, status: &PairStatus) -> Result<(), String> {
        let accepted = match kind {
            TransitionKind::Failover => {
                // The primary site may be down (UNKNOWN); that is what failover is for.
                if status.standby_role != ReplicationRole::Standby {
                    return Err(format!(
                        "standby site reports role {}, expected STANDBY",
                        status.standby_role
                    ));
                }
                if status.primary_role == ReplicationRole::Standby {
                    return Err("primary site reports role STANDBY, expected PRIMARY".into());
                }
                &self.failover_ready
            }
            TransitionKind::Switchback => {
                if status.standby_role != ReplicationRole::Primary {
                    return Err(format!(
                        "standby site reports role {}, expected PRIMARY",
                        status.standby_role
                    ));
                }
                if status.primary_role != ReplicationRole::Standby {
                    return Err(format!(
                        "primary site reports role {}, expected STANDBY",
                        status.primary_role
                    ));
                }
                &self.switchback_ready
            }
        };

        let readiness = status.switchover_readiness.as_deref().unwrap_or("");
        if !accepted
            .iter()
            .any(|r| r.trim().eq_ignore_ascii_case(readiness.trim()))
        {
            return Err(format!(
                "switchover readiness is '{}', expected one of {:?}",
                readiness, accepted
            ));
        }

        if let (Some(max), Some(gap)) = (self.max_apply_gap_seconds, status.apply_gap_seconds) {
            if gap > max {
                return Err(format!(
                    "apply gap is {}s, exceeds limit of {}s",
                    gap, max
                ));
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.failover_ready.iter().all(|r| r.trim().is_empty()) {
            return Err("readiness.failover_ready cannot be empty".into());
        }
        if self.switchback_ready.iter().all(|r| r.trim().is_empty()) {
            return Err("readiness.switchback_ready cannot be empty".into());
        }
        Ok(())
    }
}

/// Whether a status read shows the role swap for `kind` as done.
///
/// Failover is done once the standby site is PRIMARY and the primary site
/// is not. Switchback is done once the configured roles are restored.
pub fn is_confirmed(kind: TransitionKind, status: &PairStatus) -> bool {
    match kind {
        TransitionKind::Failover => {
            status.standby_role == ReplicationRole::Primary
                && status.primary_role != ReplicationRole::Primary
        }
        TransitionKind::Switchback => {
            status.primary_role == ReplicationRole::Primary
                && status.standby_role == ReplicationRole::Standby
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pair::Site;
    use crate::status::{InstanceStatus, ProtectionMode};
    use chrono::Utc;

    fn instance(site: Site, role: ReplicationRole, readiness: Option<&str>) -> InstanceStatus {
        InstanceStatus {
            site,
            address: format!("{}:1521", site),
            reachable: role != ReplicationRole::Unknown,
            role,
            protection_mode: ProtectionMode::MaxPerformance,
            readiness: readiness.map(str::to_string),
            apply_gap_seconds: None,
            error: None,
        }
    }

    fn status(
        primary: ReplicationRole,
        standby: ReplicationRole,
        readiness: Option<&str>,
        gap: Option<u64>,
    ) -> PairStatus {
        PairStatus {
            primary_role: primary,
            standby_role: standby,
            protection_mode: ProtectionMode::MaxPerformance,
            switchover_readiness: readiness.map(str::to_string),
            apply_gap_seconds: gap,
            observed_at: Utc::now(),
            primary: instance(Site::Primary, primary, None),
            standby: instance(Site::Standby, standby, readiness),
        }
    }

    #[test]
    fn test_failover_ready() {
        let policy = ReadinessPolicy::default();
        let s = status(ReplicationRole::Primary, ReplicationRole::Standby, Some("TO PRIMARY"), Some(2));
        assert!(policy.check(TransitionKind::Failover, &s).is_ok());
    }

    #[test]
    fn test_failover_allowed_with_primary_down() {
        let policy = ReadinessPolicy::default();
        let s = status(ReplicationRole::Unknown, ReplicationRole::Standby, Some("to primary"), None);
        assert!(policy.check(TransitionKind::Failover, &s).is_ok());
    }

    #[test]
    fn test_failover_rejects_wrong_readiness() {
        let policy = ReadinessPolicy::default();
        let s = status(ReplicationRole::Primary, ReplicationRole::Standby, Some("NOT ALLOWED"), None);
        let reason = policy.check(TransitionKind::Failover, &s).unwrap_err();
        assert!(reason.contains("NOT ALLOWED"));
    }

    #[test]
    fn test_failover_rejects_when_standby_already_primary() {
        let policy = ReadinessPolicy::default();
        let s = status(ReplicationRole::Standby, ReplicationRole::Primary, Some("TO PRIMARY"), None);
        assert!(policy.check(TransitionKind::Failover, &s).is_err());

        let no_primary = status(ReplicationRole::Standby, ReplicationRole::Standby, Some("TO PRIMARY"), None);
        assert!(policy.check(TransitionKind::Failover, &no_primary).is_err());
    }

    #[test]
    fn test_apply_gap_limit() {
        let policy = ReadinessPolicy::default();
        let s = status(ReplicationRole::Primary, ReplicationRole::Standby, Some("TO PRIMARY"), Some(31));
        let reason = policy.check(TransitionKind::Failover, &s).unwrap_err();
        assert!(reason.contains("apply gap"));

        let unlimited = ReadinessPolicy {
            max_apply_gap_seconds: None,
            ..ReadinessPolicy::default()
        };
        assert!(unlimited.check(TransitionKind::Failover, &s).is_ok());
    }

    #[test]
    fn test_switchback_ready() {
        let policy = ReadinessPolicy::default();
        let s = status(ReplicationRole::Standby, ReplicationRole::Primary, Some("SESSIONS ACTIVE"), None);
        assert!(policy.check(TransitionKind::Switchback, &s).is_ok());
    }

    #[test]
    fn test_switchback_requires_failed_over_pair() {
        let policy = ReadinessPolicy::default();
        let s = status(ReplicationRole::Primary, ReplicationRole::Standby, Some("TO STANDBY"), None);
        assert!(policy.check(TransitionKind::Switchback, &s).is_err());
    }

    #[test]
    fn test_confirmation() {
        let swapped = status(ReplicationRole::Standby, ReplicationRole::Primary, None, None);
        let primary_down = status(ReplicationRole::Unknown, ReplicationRole::Primary, None, None);
        let original = status(ReplicationRole::Primary, ReplicationRole::Standby, None, None);

        assert!(is_confirmed(TransitionKind::Failover, &swapped));
        assert!(is_confirmed(TransitionKind::Failover, &primary_down));
        assert!(!is_confirmed(TransitionKind::Failover, &original));

        assert!(is_confirmed(TransitionKind::Switchback, &original));
        assert!(!is_confirmed(TransitionKind::Switchback, &swapped));
    }

    #[test]
    fn test_policy_deserializes_with_defaults() {
        let policy: ReadinessPolicy = serde_json::from_str("{}").unwrap();
        assert_eq!(policy, ReadinessPolicy::default());
    }
}
