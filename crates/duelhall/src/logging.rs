//! Log output setup for binaries built on Duelhall.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Installs a `fmt` subscriber filtered by `RUST_LOG` (default `info`).
///
/// Call once at startup. A second call, or a call after another global
/// subscriber was installed, is a no-op.
pub fn init() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true);

    if tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .is_ok()
    {
        tracing::info!("logging initialized");
    }
}
