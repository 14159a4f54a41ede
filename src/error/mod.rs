//! Error types and Result aliases for classwatch.
//!
//! This module defines the error hierarchy used throughout the crate.
//! All public functions return `Result<T, Error>` or `Result<T>`.
//!
//! None of these errors stop a running pipeline on their own: scan,
//! protocol, connection and surface errors are logged at the point they
//! occur and the affected component keeps its last good state. Only
//! startup failures (configuration, bind, watch setup) propagate to `main`.

use thiserror::Error;

/// Result type alias using classwatch's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for classwatch operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Source file scan error.
    #[error("scan error: {0}")]
    Scan(#[from] ScanError),

    /// Wire message error.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Relay connection error.
    #[error("connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// Rendered surface inspection error.
    #[error("surface error: {0}")]
    Surface(#[from] SurfaceError),

    /// File watching error.
    #[error("watcher error: {0}")]
    Watcher(#[from] WatcherError),

    /// Server error.
    #[error("server error: {0}")]
    Server(#[from] ServerError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Errors reading a source file for identifiers.
#[derive(Error, Debug)]
pub enum ScanError {
    /// The file could not be read.
    #[error("failed to read '{path}': {reason}")]
    Read { path: String, reason: String },
}

/// Errors encoding or decoding wire messages.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The message is not well-formed.
    #[error("malformed message: {0}")]
    Decode(#[from] serde_json::Error),

    /// A well-formed message of a kind this channel does not carry.
    #[error("unexpected message: {0}")]
    UnexpectedMessage(String),
}

/// Relay connection errors.
#[derive(Error, Debug)]
pub enum ConnectionError {
    /// Failed to open the connection.
    #[error("failed to connect to {url}: {reason}")]
    Connect { url: String, reason: String },

    /// The connection closed or errored after opening.
    #[error("connection to {url} closed: {reason}")]
    Closed { url: String, reason: String },
}

/// Rendered surface inspection errors.
#[derive(Error, Debug)]
pub enum SurfaceError {
    /// A style source exists but its rules may not be read.
    #[error("style source '{source_ref}' is restricted")]
    Restricted { source_ref: String },

    /// A style source or the document itself could not be read.
    #[error("failed to read '{source_ref}': {reason}")]
    Unreadable { source_ref: String, reason: String },
}

/// File watcher errors.
#[derive(Error, Debug)]
pub enum WatcherError {
    /// Failed to watch path.
    #[error("failed to watch path '{path}': {reason}")]
    WatchFailed { path: String, reason: String },
}

/// Server errors.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Failed to bind to address.
    #[error("failed to bind to {address}: {reason}")]
    BindFailed { address: String, reason: String },

    /// Serving error.
    #[error("serve error: {0}")]
    Serve(String),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl ScanError {
    /// Create a read error for `path`.
    pub fn read(path: &std::path::Path, reason: impl ToString) -> Self {
        Self::Read {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }
}

impl SurfaceError {
    /// Create a restricted-source error.
    pub fn restricted(source_ref: impl Into<String>) -> Self {
        Self::Restricted {
            source_ref: source_ref.into(),
        }
    }

    /// Create an unreadable-source error.
    pub fn unreadable(source_ref: impl Into<String>, reason: impl ToString) -> Self {
        Self::Unreadable {
            source_ref: source_ref.into(),
            reason: reason.to_string(),
        }
    }
}
