//! Replication roles and protection modes as reported by an instance.
//!
//! Vendors report roles with their own vocabulary ("PHYSICAL STANDBY",
//! "SNAPSHOT STANDBY", ...). Parsing normalizes these into the three roles
//! the orchestrator reasons about; anything unrecognized is UNKNOWN.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Role of a single database instance at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReplicationRole {
    /// Accepts writes
    Primary,
    /// Applies the replicated log from the primary
    Standby,
    /// Unreachable, or reported a role we do not recognize
    Unknown,
}

impl ReplicationRole {
    /// Normalize a vendor-reported role string.
    pub fn parse(raw: &str) -> Self {
        let normalized = raw.trim().to_ascii_uppercase();
        match normalized.as_str() {
            "PRIMARY" => Self::Primary,
            "STANDBY" | "PHYSICAL STANDBY" | "LOGICAL STANDBY" | "SNAPSHOT STANDBY" => {
                Self::Standby
            }
            _ => Self::Unknown,
        }
    }

    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "PRIMARY",
            Self::Standby => "STANDBY",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ReplicationRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl<'de> Deserialize<'de> for ReplicationRole {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

/// Durability contract of the replication link. Reported, never changed here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProtectionMode {
    MaxProtection,
    MaxAvailability,
    MaxPerformance,
    Unknown,
}

impl ProtectionMode {
    /// Normalize a vendor-reported protection mode string.
    pub fn parse(raw: &str) -> Self {
        let normalized = raw.trim().to_ascii_uppercase().replace(' ', "_");
        match normalized.as_str() {
            "MAX_PROTECTION" | "MAXIMUM_PROTECTION" => Self::MaxProtection,
            "MAX_AVAILABILITY" | "MAXIMUM_AVAILABILITY" => Self::MaxAvailability,
            "MAX_PERFORMANCE" | "MAXIMUM_PERFORMANCE" => Self::MaxPerformance,
            _ => Self::Unknown,
        }
    }

    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MaxProtection => "MAX_PROTECTION",
            Self::MaxAvailability => "MAX_AVAILABILITY",
            Self::MaxPerformance => "MAX_PERFORMANCE",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ProtectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl<'de> Deserialize<'de> for ProtectionMode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

/// Raw answer of one instance to a status query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceReport {
    pub role: ReplicationRole,

    pub protection_mode: ProtectionMode,

    /// Vendor switchover readiness, e.g. "TO PRIMARY", "TO STANDBY",
    /// "SESSIONS ACTIVE", "NOT ALLOWED".
    #[serde(default)]
    pub readiness: String,

    /// Seconds of replicated log not yet applied. Only meaningful on a standby.
    #[serde(default)]
    pub apply_gap_seconds: Option<u64>,
}

impl InstanceReport {
    /// Create a report with no readiness and no apply gap.
    pub fn new(role: ReplicationRole, protection_mode: ProtectionMode) -> Self {
        Self {
            role,
            protection_mode,
            readiness: String::new(),
            apply_gap_seconds: None,
        }
    }

    /// Set the readiness string.
    pub fn with_readiness(mut self, readiness: impl Into<String>) -> Self {
        self.readiness = readiness.into();
        self
    }

    /// Set the apply gap.
    pub fn with_apply_gap(mut self, seconds: u64) -> Self {
        self.apply_gap_seconds = Some(seconds);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse_vendor_vocabulary() {
        assert_eq!(ReplicationRole::parse("PRIMARY"), ReplicationRole::Primary);
        assert_eq!(ReplicationRole::parse("physical standby"), ReplicationRole::Standby);
        assert_eq!(ReplicationRole::parse(" LOGICAL STANDBY "), ReplicationRole::Standby);
        assert_eq!(ReplicationRole::parse("FAR SYNC"), ReplicationRole::Unknown);
    }

    #[test]
    fn test_protection_mode_parse() {
        assert_eq!(ProtectionMode::parse("MAXIMUM PERFORMANCE"), ProtectionMode::MaxPerformance);
        assert_eq!(ProtectionMode::parse("max_availability"), ProtectionMode::MaxAvailability);
        assert_eq!(ProtectionMode::parse("UNPROTECTED"), ProtectionMode::Unknown);
    }

    #[test]
    fn test_instance_report_from_json() {
        let json = r#"{"role":"PHYSICAL STANDBY","protection_mode":"MAXIMUM AVAILABILITY","readiness":"TO PRIMARY","apply_gap_seconds":4}"#;
        let report: InstanceReport = serde_json::from_str(json).unwrap();

        assert_eq!(report.role, ReplicationRole::Standby);
        assert_eq!(report.protection_mode, ProtectionMode::MaxAvailability);
        assert_eq!(report.readiness, "TO PRIMARY");
        assert_eq!(report.apply_gap_seconds, Some(4));
    }

    #[test]
    fn test_role_serializes_canonical() {
        let json = serde_json::to_string(&ReplicationRole::Standby).unwrap();
        assert_eq!(json, "\"STANDBY\"");
    }
}
