//! Configuration settings and validation.

use crate::{Error, Result};
use std::path::PathBuf;
use std::time::Duration;

/// Default broadcast port.
pub const DEFAULT_PORT: u16 = 8765;

/// Main configuration for classwatch.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directories scanned for identifiers.
    pub scan_dirs: Vec<PathBuf>,

    /// File extensions (without leading dot) that are scanned.
    pub extensions: Vec<String>,

    /// Host address to bind to, or to connect to for the relay.
    pub host: String,

    /// Broadcast port.
    pub port: u16,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines.
    pub log_json: bool,

    /// Debounce window for file-system events, in milliseconds.
    pub debounce_ms: u64,

    /// Fixed wait between relay reconnect attempts, in milliseconds.
    pub reconnect_delay_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scan_dirs: vec![
                PathBuf::from("./src/content-scripts"),
                PathBuf::from("./src/components"),
            ],
            extensions: vec!["tsx".to_string()],
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            log_level: "info".to_string(),
            log_json: false,
            debounce_ms: 200,
            reconnect_delay_ms: 3000,
        }
    }
}

impl Config {
    /// Create a new configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(Error::config("port cannot be 0"));
        }

        if self.host.is_empty() {
            return Err(Error::config("host cannot be empty"));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(Error::config(format!(
                "invalid log level '{}', must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            )));
        }

        if self.normalized_extensions().is_empty() {
            return Err(Error::config("at least one file extension is required"));
        }

        if self.debounce_ms > 10_000 {
            return Err(Error::config("debounce_ms cannot exceed 10000"));
        }

        if self.reconnect_delay_ms == 0 {
            return Err(Error::config("reconnect_delay_ms cannot be 0"));
        }

        Ok(())
    }

    /// Extensions lowercased with any leading dot stripped; empty entries dropped.
    #[must_use]
    pub fn normalized_extensions(&self) -> Vec<String> {
        self.extensions
            .iter()
            .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect()
    }

    /// Get the server address as a string.
    #[must_use]
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Websocket URL of the broadcast endpoint.
    #[must_use]
    pub fn server_url(&self) -> String {
        format!("ws://{}:{}/", self.host, self.port)
    }

    /// Debounce window as a `Duration`.
    #[must_use]
    pub const fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Reconnect delay as a `Duration`.
    #[must_use]
    pub const fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}
