//! Replication status
//!
//! Role vocabulary and the read-only status reader. Nothing in this module
//! mutates the pair.

mod reader;
mod role;

pub use reader::{InstanceStatus, PairStatus, StatusReader};
pub use role::{InstanceReport, ProtectionMode, ReplicationRole};
