//! Configuration management for classwatch.
//!
//! Supports configuration from:
//! - Command-line arguments (highest priority)
//! - Environment variables (`CLASSWATCH_*`)
//! - Built-in defaults (lowest priority)

mod settings;

pub use settings::{Config, DEFAULT_PORT};
