//! Process-wide tracing setup.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

use crate::config::{LogFormat, LoggingSettings};
use crate::error::LoggingError;

/// Builds the filter from `RUST_LOG`, falling back to the configured level.
pub fn env_filter(default_level: &str) -> Result<EnvFilter, LoggingError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(default_level).map_err(|e| LoggingError::Filter {
            filter: default_level.to_string(),
            reason: e.to_string(),
        }),
    }
}

/// Installs the global subscriber and routes `log` records into it.
///
/// Fails if a subscriber is already installed.
pub fn init(settings: &LoggingSettings) -> Result<(), LoggingError> {
    let filter = env_filter(&settings.level)?;

    let (pretty, json) = match settings.format {
        LogFormat::Pretty => (Some(fmt::layer().with_target(true)), None),
        LogFormat::Json => (None, Some(fmt::layer().json().with_current_span(true))),
    };

    let subscriber = Registry::default().with(filter).with(pretty).with(json);
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| LoggingError::Install(e.to_string()))?;
    tracing_log::LogTracer::init().map_err(|e| LoggingError::Install(e.to_string()))?;
    Ok(())
}
