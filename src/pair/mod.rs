//! Pair configuration
//!
//! Which two instances form the pair, how to reach them, and the manager
//! that validates and applies a new configuration.

mod config;
mod manager;

pub use config::{ConnectionInfo, PairConfig, Site};
pub use manager::PairConfigManager;
