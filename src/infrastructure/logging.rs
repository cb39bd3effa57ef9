//! Opt-in tracing initialization for host processes.
//!
//! The pipeline only emits `tracing` events; it never installs a
//! subscriber on its own. Hosts that do not already have one can call
//! [`init`] once at startup. `RUST_LOG` overrides the default level.

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

/// Install a formatted stderr subscriber with the given default level.
///
/// Fails if a global subscriber is already set.
pub fn init(default_level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.to_string()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))
}
