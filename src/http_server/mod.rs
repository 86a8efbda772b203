//! # HTTP Server Module
//!
//! Admin API for the orchestrator.
//!
//! # Endpoints
//!
//! - `/health` - Health check
//! - `/api/ha/*` - Status, configuration, transitions, reports

pub mod config;
pub mod ha_routes;
pub mod observability_routes;
pub mod server;

pub use config::HttpServerConfig;
pub use server::HttpServer;
