//! ha-orchestrator - failover/switchback orchestration for a replicated
//! primary/standby database pair
//!
//! Drives role transitions through an external role-change protocol,
//! persists the transition state machine, records every attempt in a
//! durable ledger and reports availability over date ranges.

pub mod backend;
pub mod cli;
pub mod errors;
pub mod http_server;
pub mod ledger;
pub mod observability;
pub mod orchestrator;
pub mod pair;
pub mod report;
pub mod status;
pub mod transition;

pub(crate) mod sync;

pub use errors::{HaError, HaResult};
pub use orchestrator::{OperationOutcome, Orchestrator, OrchestratorOptions};
