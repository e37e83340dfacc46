//! Optional `tracing` initialization helper.
//!
//! The crate itself only ever calls `tracing::{debug,info,warn,error}!`.
//! It never installs a subscriber on its own, so embedding it in an
//! application with its own logging setup is a no-op import. This helper
//! is here for binaries and tests that want a reasonable default.

use tracing_subscriber::EnvFilter;

/// Install a stderr `tracing` subscriber, honoring `RUST_LOG` if set and
/// otherwise defaulting to `info` for this crate and `warn` elsewhere.
///
/// Safe to call more than once; only the first call takes effect.
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,taskloom=info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
