//! Wire envelopes.
//!
//! Two channels carry registries:
//! - The broadcast channel (server to relay): every frame is a
//!   `{"type": "CLASS_REGISTRY_UPDATE", "registry": ...}` envelope.
//! - The surface channel (relay to display agents): pushes of
//!   `{"type": "CLASS_REGISTRY_UPDATED", "data": ...}` plus a pull pair,
//!   `{"action": "query-class-validator"}` answered with
//!   `{"status": "success", "data": ...}`.
//!
//! Every message carries a complete registry; there are no diffs.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;
use crate::registry::Registry;

/// Type tag of broadcast frames.
pub const REGISTRY_UPDATE: &str = "CLASS_REGISTRY_UPDATE";

/// Type tag of surface pushes.
pub const REGISTRY_UPDATED: &str = "CLASS_REGISTRY_UPDATED";

/// Action tag of the surface pull request.
pub const QUERY_ACTION: &str = "query-class-validator";

/// Server to relay message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Full registry snapshot.
    #[serde(rename = "CLASS_REGISTRY_UPDATE")]
    RegistryUpdate { registry: Arc<Registry> },
}

impl ServerMessage {
    /// Wrap a snapshot.
    #[must_use]
    pub const fn update(registry: Arc<Registry>) -> Self {
        Self::RegistryUpdate { registry }
    }

    /// The carried registry.
    #[must_use]
    pub fn into_registry(self) -> Arc<Registry> {
        match self {
            Self::RegistryUpdate { registry } => registry,
        }
    }

    /// Encode as a JSON text frame.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a JSON text frame.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError::Decode` for malformed JSON or a malformed
    /// registry, and `ProtocolError::UnexpectedMessage` for any other type tag.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        match value.get("type").and_then(serde_json::Value::as_str) {
            Some(REGISTRY_UPDATE) => Ok(serde_json::from_value(value)?),
            Some(other) => Err(ProtocolError::UnexpectedMessage(other.to_string())),
            None => Err(ProtocolError::UnexpectedMessage("missing type".to_string())),
        }
    }
}

/// Relay to display agent push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SurfaceMessage {
    /// The relay cache was replaced.
    #[serde(rename = "CLASS_REGISTRY_UPDATED")]
    RegistryUpdated { data: Arc<Registry> },
}

impl SurfaceMessage {
    /// The carried registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        match self {
            Self::RegistryUpdated { data } => data,
        }
    }
}

/// Display agent to relay pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum SurfaceRequest {
    /// Ask for the cached registry.
    #[serde(rename = "query-class-validator")]
    Query,
}

impl SurfaceRequest {
    /// Decode a request, returning `None` for actions the relay does not answer.
    #[must_use]
    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        match value.get("action").and_then(serde_json::Value::as_str) {
            Some(QUERY_ACTION) => Some(Self::Query),
            _ => None,
        }
    }
}

/// Relay to display agent pull response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum SurfaceResponse {
    /// The cached registry.
    #[serde(rename = "success")]
    Success { data: Arc<Registry> },
}

impl SurfaceResponse {
    /// The carried registry.
    #[must_use]
    pub fn into_registry(self) -> Arc<Registry> {
        match self {
            Self::Success { data } => data,
        }
    }
}
