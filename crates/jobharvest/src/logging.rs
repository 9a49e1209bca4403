//! Process-wide log output.
//!
//! Library code logs through the `log` facade and opens `tracing` spans; both
//! end up in one `tracing-subscriber` pipeline.

use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Invalid log filter '{filter}': {reason}")]
    Filter { filter: String, reason: String },

    #[error("Failed to install logger: {0}")]
    Install(String),
}

/// Output format for [`init_tracing`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Builds the filter: `RUST_LOG` wins, otherwise `default_filter`.
pub fn build_filter(default_filter: &str) -> Result<EnvFilter, LoggingError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(default_filter).map_err(|e| LoggingError::Filter {
            filter: default_filter.to_string(),
            reason: e.to_string(),
        }),
    }
}

/// Installs the global subscriber and routes `log` records into it.
///
/// Can only succeed once per process.
pub fn init_tracing(default_filter: &str, format: LogFormat) -> Result<(), LoggingError> {
    let filter = build_filter(default_filter)?;

    let result = match format {
        LogFormat::Text => {
            let subscriber = Registry::default()
                .with(filter)
                .with(fmt::layer().with_target(true));
            tracing::subscriber::set_global_default(subscriber)
        }
        LogFormat::Json => {
            let subscriber = Registry::default()
                .with(filter)
                .with(fmt::layer().json().with_current_span(true));
            tracing::subscriber::set_global_default(subscriber)
        }
    };
    result.map_err(|e| LoggingError::Install(e.to_string()))?;

    tracing_log::LogTracer::init().map_err(|e| LoggingError::Install(e.to_string()))?;
    Ok(())
}
