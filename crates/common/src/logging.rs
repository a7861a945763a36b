//! Logging bootstrap for vip-manager components.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Human-readable single-line output.
    Plain,
    /// Structured JSON output, one object per event.
    Json,
}

/// Initialize tracing.
///
/// `default_level` applies when RUST_LOG is not set; RUST_LOG always wins
/// so operators can raise verbosity without touching the settings file.
pub fn init(format: Format, default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match format {
        Format::Plain => tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init(),
        Format::Json => tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init(),
    }
}
