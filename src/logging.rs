//! Shared tracing-subscriber bootstrap for all three binaries.

use tracing_subscriber::{fmt, EnvFilter};

/// Initializes a `tracing` subscriber reading `RUST_LOG` (default `info`).
/// Modules favor a per-module `LOG_TARGET` const plus `#[instrument]` on
/// hot async paths over ad-hoc `println!`.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
