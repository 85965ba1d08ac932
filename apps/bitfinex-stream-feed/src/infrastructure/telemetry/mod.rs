//! Logging Initialization
//!
//! Sets up the `tracing` subscriber: console output filtered through
//! `RUST_LOG` (default `info`), plus an optional file destination from
//! configuration.

use std::fs::File;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::infrastructure::config::LogSettings;

/// Telemetry setup error.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The configured log file could not be opened.
    #[error("failed to open log file {path}: {source}")]
    LogFile {
        /// The configured destination.
        path: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

/// Initialize the global tracing subscriber.
///
/// # Errors
///
/// Returns an error when the configured log file cannot be opened.
pub fn init(settings: &LogSettings) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console = tracing_subscriber::fmt::layer();

    match &settings.file {
        Some(path) => {
            let file = File::create(path).map_err(|source| TelemetryError::LogFile {
                path: path.display().to_string(),
                source,
            })?;
            let file_layer = tracing_subscriber::fmt::layer()
                .with_writer(Arc::new(file))
                .with_ansi(false);
            tracing_subscriber::registry()
                .with(filter)
                .with(console)
                .with(file_layer)
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(console)
                .init();
        }
    }

    Ok(())
}
