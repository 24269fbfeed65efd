//! Structured logging setup. Initialized once at startup; every subsystem
//! emits through `tracing` from then on instead of ad hoc `println!`s.

use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::prelude::*;

/// Installs a global subscriber reading its level filter from `RUST_LOG`,
/// defaulting to `info` when unset or invalid.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true);
    tracing_subscriber::registry().with(filter).with(fmt_layer).init();
}
