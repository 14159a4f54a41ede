//! Structured logging and tracing configuration.
//!
//! Provides setup for observability using the `tracing` crate with:
//! - Structured logging with JSON output option
//! - Configurable log levels, overridable through `RUST_LOG`
//! - Span helpers for per-connection and per-surface work

use tracing_subscriber::{
    filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, Layer,
};

use crate::{Error, Result};

/// Initialize the global subscriber.
///
/// `RUST_LOG`, when set, takes precedence over `level`. JSON output carries
/// the current span's fields on every line.
///
/// # Errors
///
/// Returns an error if `level` is not a valid filter or a subscriber is
/// already installed.
pub fn init_tracing(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| Error::config(format!("invalid log filter '{level}': {e}")))?;

    let layer = if json {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_target(true)
            .boxed()
    } else {
        fmt::layer().with_target(true).boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init()
        .map_err(|e| Error::internal(format!("tracing already initialized: {e}")))?;

    tracing::debug!(level, json, "Tracing initialized");
    Ok(())
}

/// Span constructors shared by the server, relay and display agents.
pub mod spans {
    use tracing::{info_span, Span};

    /// Span for one broadcast consumer connection.
    #[must_use]
    pub fn connection_span(connection_id: &str) -> Span {
        info_span!("connection", connection = %connection_id)
    }

    /// Span for one relay session against the broadcast endpoint.
    #[must_use]
    pub fn relay_span(url: &str) -> Span {
        info_span!("relay", url = %url)
    }

    /// Span for one display agent.
    #[must_use]
    pub fn surface_span(surface: &str) -> Span {
        info_span!("surface", surface = %surface)
    }
}
