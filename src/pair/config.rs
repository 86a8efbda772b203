//! Pair Configuration
//!
//! Connection and topology settings for a primary/standby pair. A config is
//! validated in full before anything is applied to either instance.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::{HaError, HaResult};

/// One side of the configured pair.
///
/// Sites are fixed by configuration; the *role* an instance holds moves
/// between sites as transitions happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Site {
    /// The site configured as primary (the "remote" side for drills)
    Primary,
    /// The site configured as standby (the "local" side for drills)
    Standby,
}

impl Site {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Site::Primary => "primary",
            Site::Standby => "standby",
        }
    }

    /// The other side of the pair.
    pub fn peer(&self) -> Site {
        match self {
            Site::Primary => Site::Standby,
            Site::Standby => Site::Primary,
        }
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Everything a collaborator needs to reach one instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub site: Site,
    pub host: String,
    pub port: u16,
    pub db_name: String,
    /// Reference to the admin credential (env var name, vault path, ...).
    /// Never the secret itself.
    pub credential_ref: String,
}

impl ConnectionInfo {
    /// `host:port` address string
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Primary/standby pair configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairConfig {
    pub primary_host: String,
    pub primary_port: u32,
    pub standby_host: String,
    pub standby_port: u32,
    pub primary_db_name: String,
    pub standby_db_name: String,
    #[serde(default)]
    pub admin_credential_ref: String,
}

impl PairConfig {
    /// Validate every field. Nothing is applied unless this passes.
    pub fn validate(&self) -> HaResult<()> {
        if self.primary_host.trim().is_empty() {
            return Err(HaError::InvalidConfig("primary host cannot be empty".into()));
        }
        if self.standby_host.trim().is_empty() {
            return Err(HaError::InvalidConfig("standby host cannot be empty".into()));
        }
        if !valid_port(self.primary_port) {
            return Err(HaError::InvalidConfig(format!(
                "invalid primary port: {}",
                self.primary_port
            )));
        }
        if !valid_port(self.standby_port) {
            return Err(HaError::InvalidConfig(format!(
                "invalid standby port: {}",
                self.standby_port
            )));
        }
        if self.primary_db_name.trim().is_empty() {
            return Err(HaError::InvalidConfig(
                "primary database name cannot be empty".into(),
            ));
        }
        if self.standby_db_name.trim().is_empty() {
            return Err(HaError::InvalidConfig(
                "standby database name cannot be empty".into(),
            ));
        }
        // Unique names are case-insensitive on every vendor we target
        if self
            .primary_db_name
            .trim()
            .eq_ignore_ascii_case(self.standby_db_name.trim())
        {
            return Err(HaError::InvalidConfig(format!(
                "primary and standby database names must differ (both '{}')",
                self.primary_db_name.trim()
            )));
        }
        Ok(())
    }

    /// Connection info for one site. Call only on a validated config.
    pub fn connection(&self, site: Site) -> ConnectionInfo {
        let (host, port, db_name) = match site {
            Site::Primary => (&self.primary_host, self.primary_port, &self.primary_db_name),
            Site::Standby => (&self.standby_host, self.standby_port, &self.standby_db_name),
        };
        ConnectionInfo {
            site,
            host: host.trim().to_string(),
            port: u16::try_from(port).unwrap_or(0),
            db_name: db_name.trim().to_string(),
            credential_ref: self.admin_credential_ref.clone(),
        }
    }
}

fn valid_port(port: u32) -> bool {
    (1..=65535).contains(&port)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> PairConfig {
        PairConfig {
            primary_host: "db-east.internal".into(),
            primary_port: 1521,
            standby_host: "db-west.internal".into(),
            standby_port: 1522,
            primary_db_name: "ORCL_EAST".into(),
            standby_db_name: "ORCL_WEST".into(),
            admin_credential_ref: "env:HA_ADMIN".into(),
        }
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_empty_host_rejected() {
        let mut config = valid_config();
        config.standby_host = "   ".into();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, HaError::InvalidConfig(ref m) if m.contains("standby host")));
    }

    #[test]
    fn test_port_bounds() {
        let mut config = valid_config();
        config.primary_port = 0;
        assert!(config.validate().is_err());

        config.primary_port = 65536;
        assert!(config.validate().is_err());

        config.primary_port = 65535;
        assert!(config.validate().is_ok());

        config.primary_port = 1;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_db_names_must_differ() {
        let mut config = valid_config();
        config.standby_db_name = "orcl_east".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("must differ"));
    }

    #[test]
    fn test_empty_db_name_rejected() {
        let mut config = valid_config();
        config.primary_db_name = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_connection_per_site() {
        let config = valid_config();
        let standby = config.connection(Site::Standby);
        assert_eq!(standby.address(), "db-west.internal:1522");
        assert_eq!(standby.db_name, "ORCL_WEST");
        assert_eq!(standby.credential_ref, "env:HA_ADMIN");
        assert_eq!(Site::Standby.peer(), Site::Primary);
    }

    #[test]
    fn test_camel_case_wire_format() {
        let json = serde_json::to_value(valid_config()).unwrap();
        assert_eq!(json["primaryHost"], "db-east.internal");
        assert_eq!(json["standbyDbName"], "ORCL_WEST");
    }
}
