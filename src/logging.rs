//! Logging setup

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize logging with tracing
///
/// Reads the filter from the `RUST_LOG` environment variable and falls back
/// to `ssj_core=debug,warn`. Calling this more than once has no effect.
pub fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ssj_core=debug,warn"));
    if tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .try_init()
        .is_ok()
    {
        tracing::info!("ssj_core logging initialized");
    }
}
