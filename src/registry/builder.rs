//! Registry builder state machine.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use super::index::{canonical_path, FileIndex};
use super::model::Registry;
use super::scanner::scan_file;
use crate::server::metrics;
use crate::watcher::FileEvent;

/// Owns the file index and the authoritative registry snapshot.
///
/// Events are applied one at a time by a single owner, so reading a file,
/// replacing its entry and rebuilding the aggregate needs no locking.
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    index: FileIndex,
    current: Option<Arc<Registry>>,
}

impl RegistryBuilder {
    /// Create a builder with an empty index and no baseline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one file event.
    ///
    /// Before the baseline exists only the index is updated and `None` is
    /// returned. Afterwards every event rebuilds the registry and the new
    /// snapshot is returned for broadcast.
    pub fn apply(&mut self, event: &FileEvent) -> Option<Arc<Registry>> {
        match event {
            FileEvent::Changed(path) => {
                let path = canonical_path(path);
                match scan_file(&path) {
                    Ok(identifiers) => {
                        tracing::debug!(
                            path = %path.display(),
                            classes = identifiers.len(),
                            "Scanned file"
                        );
                        self.index.insert(path, identifiers);
                    }
                    Err(e) => {
                        // Prior entry, if any, stays in place until the next event.
                        tracing::warn!(error = %e, "Scan failed, keeping previous entry");
                        metrics::SCAN_ERRORS_TOTAL.inc();
                    }
                }
            }
            FileEvent::Removed(path) => {
                // The path may have been a directory holding indexed files.
                let path = canonical_path(path);
                let removed = self.index.remove_prefix(&path);
                if removed > 0 {
                    tracing::debug!(path = %path.display(), files = removed, "Removed from index");
                }
            }
        }

        if self.current.is_some() {
            Some(self.rebuild())
        } else {
            None
        }
    }

    /// Establish the baseline once the initial enumeration is done.
    pub fn complete_initial_scan(&mut self) -> Arc<Registry> {
        self.rebuild()
    }

    /// Whether a baseline has been established.
    #[must_use]
    pub const fn has_baseline(&self) -> bool {
        self.current.is_some()
    }

    /// The latest snapshot, if a baseline exists.
    #[must_use]
    pub fn snapshot(&self) -> Option<Arc<Registry>> {
        self.current.clone()
    }

    /// Whether a removal of `path` would drop any indexed file.
    #[must_use]
    pub fn tracks(&self, path: &Path) -> bool {
        self.index.covers(&canonical_path(path))
    }

    /// The per-file index.
    #[must_use]
    pub const fn index(&self) -> &FileIndex {
        &self.index
    }

    #[allow(clippy::cast_possible_wrap)]
    fn rebuild(&mut self) -> Arc<Registry> {
        let registry = Arc::new(Registry {
            last_updated: Some(self.next_stamp()),
            classes: self.index.union(),
            files: self.index.paths().cloned().collect(),
        });

        metrics::CLASSES_TOTAL.set(registry.classes.len() as i64);
        metrics::FILES_TOTAL.set(registry.files.len() as i64);

        self.current = Some(Arc::clone(&registry));
        registry
    }

    /// Current time, nudged forward if the clock has not advanced.
    fn next_stamp(&self) -> DateTime<Utc> {
        let now = Utc::now();
        match self.current.as_ref().and_then(|r| r.last_updated) {
            Some(previous) if now <= previous => previous + Duration::milliseconds(1),
            _ => now,
        }
    }
}
