//! Structured logging setup. Handlers and the server/client surfaces emit
//! `tracing` events; this just wires up a subscriber for binaries that embed
//! this crate (library code never installs one itself).

use tracing_subscriber::EnvFilter;

/// Installs a subscriber honoring `RUST_LOG`, defaulting to `info`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
