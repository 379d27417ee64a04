//! Logging configuration using tracing.
//!
//! Logs go to stderr so reports on stdout stay machine-readable. `RUST_LOG`
//! overrides the default level.

use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Installs the global subscriber. A second call is a no-op.
pub fn init_logging(debug: bool) {
    let default_level = if debug { Level::DEBUG } else { Level::WARN };
    let env_filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .try_init();
}
