//! Observability
//!
//! - Structured logging through `tracing`, JSON or human-readable
//! - Typed event names
//! - Atomic counters exposed over HTTP
//!
//! Logs go to stderr so CLI output on stdout stays machine-readable.

mod events;
mod metrics;

pub use events::Event;
pub use metrics::{HaMetrics, MetricsSnapshot};

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

static LOG_INIT: OnceLock<()> = OnceLock::new();

/// Log line format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

/// Install the global subscriber. Later calls are no-ops.
///
/// The filter defaults to `info` and is overridden by `RUST_LOG`.
pub fn init_logging(format: LogFormat) {
    LOG_INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr);
        let _ = match format {
            LogFormat::Json => builder.json().try_init(),
            LogFormat::Pretty => builder.try_init(),
        };
    });
}
