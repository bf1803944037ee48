//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber once per process
//! - Pick the output format from config
//!
//! # Design Decisions
//! - JSON format for production, pretty format for development
//! - `RUST_LOG` overrides the configured level

use thiserror::Error;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::schema::{LogFormat, ObservabilityConfig};

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to install tracing subscriber: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// Install the global subscriber.
pub fn init_logging(config: &ObservabilityConfig) -> Result<(), LoggingError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    match config.log_format {
        LogFormat::Json => {
            let layer = fmt::layer()
                .json()
                .with_target(true)
                .with_current_span(true)
                .flatten_event(true)
                .with_filter(filter);
            tracing_subscriber::registry().with(layer).try_init()?;
        }
        LogFormat::Pretty => {
            let layer = fmt::layer().with_target(true).with_filter(filter);
            tracing_subscriber::registry().with(layer).try_init()?;
        }
    }
    Ok(())
}
