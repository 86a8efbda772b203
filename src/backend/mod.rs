//! External collaborators
//!
//! The orchestrator never talks to a database directly. It consumes three
//! narrow contracts:
//! - a raw status query per instance
//! - a role-change protocol for the pair
//! - a per-instance topology applier used by `configure`
//!
//! Two implementations ship with the crate: an in-memory [`SimulatedPair`]
//! for drills and tests, and a [`CommandBackend`] that shells out to
//! operator-supplied tooling.

mod command;
mod simulated;

pub use command::{CommandBackend, CommandBackendConfig};
pub use simulated::SimulatedPair;

use thiserror::Error;

use crate::pair::{ConnectionInfo, PairConfig, Site};
use crate::status::InstanceReport;

/// An instance could not be queried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("instance unreachable: {0}")]
pub struct Unreachable(pub String);

/// A role-change or topology command was refused or failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ProtocolFailure(pub String);

/// Raw status query against a single instance.
pub trait InstanceStatusSource: Send + Sync {
    /// Read role, protection mode, readiness and apply gap.
    fn query_instance(&self, conn: &ConnectionInfo) -> Result<InstanceReport, Unreachable>;
}

/// Role-change protocol for the pair.
///
/// Calls block until the vendor tooling returns; they are not cancellable.
pub trait RoleChangeProtocol: Send + Sync {
    /// Promote the standby site.
    fn request_failover(&self, pair: &PairConfig) -> Result<(), ProtocolFailure>;

    /// Return the primary role to the primary site.
    fn request_switchback(&self, pair: &PairConfig) -> Result<(), ProtocolFailure>;
}

/// Applies topology settings to one instance. Must be idempotent.
pub trait TopologyApplier: Send + Sync {
    fn apply_topology(&self, site: Site, pair: &PairConfig) -> Result<(), ProtocolFailure>;
}

/// Everything the orchestrator needs from the outside world.
pub trait PairBackend: InstanceStatusSource + RoleChangeProtocol + TopologyApplier {
    /// Short name for logs
    fn name(&self) -> &'static str;
}
