//! Logging initialization

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LoggingConfig;

/// Initialize logging from configuration. The `RUST_LOG` environment
/// variable overrides the configured level.
pub fn init(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));

    if config.json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_target(true))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_level(true))
            .with(filter)
            .init();
    }
}
