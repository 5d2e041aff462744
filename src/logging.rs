//! Thin `tracing` wiring: an `EnvFilter` driven by `RUST_LOG`, installed at most once per
//! process.

use std::sync::Once;

static INIT: Once = Once::new();

/// Installs a global `tracing` subscriber driven by the `RUST_LOG` environment variable,
/// defaulting to `info` when unset.
///
/// Safe to call more than once; only the first call takes effect.
pub fn init() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        tracing_subscriber::fmt().with_env_filter(filter).with_ansi(false).compact().init();
    });
}
