//! Tracing subscriber setup

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

use crate::config::{LogFormat, ObservabilityConfig};

/// Install the global subscriber
///
/// `RUST_LOG` overrides `observability.log_level`. A second call is a no-op so
/// tests and embedders can call this freely.
pub fn init(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = fmt().with_env_filter(filter).with_target(true);
    let installed = match config.log_format {
        LogFormat::Json => builder.json().with_current_span(true).try_init(),
        LogFormat::Pretty => builder.try_init(),
    };

    if installed.is_ok() {
        tracing::debug!(
            level = %config.log_level,
            format = ?config.log_format,
            "Tracing initialised"
        );
    }
}
