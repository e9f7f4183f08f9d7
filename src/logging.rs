// src/logging.rs

//! Tracing subscriber setup for hosts embedding the restore core

use tracing_subscriber::EnvFilter;

/// Install a formatted tracing subscriber
///
/// `RUST_LOG` takes precedence; otherwise `default_filter` (or `"info"`) is
/// used. Returns false if a global subscriber was already installed.
pub fn init_logging(default_filter: Option<&str>) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter.unwrap_or("info")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .is_ok()
}
