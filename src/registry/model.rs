//! The registry snapshot.

use std::collections::HashSet;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Authoritative snapshot of every known identifier.
///
/// `classes` is sorted and deduplicated, so two registries built from equal
/// identifier sets serialize to the same `classes` array. The placeholder
/// registry held by consumers before first receipt has no timestamp.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registry {
    /// When the snapshot was built.
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub last_updated: Option<DateTime<Utc>>,
    /// Sorted, deduplicated identifiers.
    #[serde(default)]
    pub classes: Vec<String>,
    /// Files with an index entry.
    #[serde(default)]
    pub files: Vec<PathBuf>,
}

impl Registry {
    /// The empty placeholder registry.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether this is a placeholder that was never produced by a builder.
    #[must_use]
    pub const fn is_placeholder(&self) -> bool {
        self.last_updated.is_none()
    }

    /// Identifiers as a set, for membership checks.
    #[must_use]
    pub fn class_set(&self) -> HashSet<&str> {
        self.classes.iter().map(String::as_str).collect()
    }
}

/// Accepts RFC 3339 timestamps, `null`, or the empty string.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref() {
        None | Some("") => Ok(None),
        Some(text) => DateTime::parse_from_rfc3339(text)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(serde::de::Error::custom),
    }
}
