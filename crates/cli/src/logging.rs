//! Logging setup for the plugin binary
//!
//! stdout carries the protoc response, so every event goes to stderr.

use std::io;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize tracing; `RUST_LOG` overrides the default level
pub fn init(verbose: bool) {
    init_with_filter(if verbose { "debug" } else { "warn" });
}

/// Initialize tracing with a custom default filter
pub fn init_with_filter(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    // A subscriber may already be set when embedded in tests
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(io::stderr))
        .try_init();
}
