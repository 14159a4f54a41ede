//! File system event types and handling.

#![allow(clippy::missing_const_for_fn)]

use std::path::{Path, PathBuf};

/// File system event types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileEvent {
    /// File was added or its contents changed.
    Changed(PathBuf),
    /// File was deleted or moved away.
    Removed(PathBuf),
}

impl FileEvent {
    /// Get the path associated with this event.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Changed(p) | Self::Removed(p) => p,
        }
    }

    /// Classify a raw notification by what is on disk now.
    ///
    /// Returns `None` for existing directories, which carry no identifiers.
    /// A path that no longer exists is a removal, whether it was a file or a
    /// directory.
    #[must_use]
    pub fn from_disk(path: PathBuf) -> Option<Self> {
        if path.is_file() {
            Some(Self::Changed(path))
        } else if path.exists() {
            None
        } else {
            Some(Self::Removed(path))
        }
    }
}

/// Ordered batch of file events for processing.
///
/// Holds at most one event per path; a later event for the same path
/// replaces the earlier one and moves to the end.
#[derive(Debug, Default)]
pub struct EventBatch {
    events: Vec<FileEvent>,
}

impl EventBatch {
    /// Create a new empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an event to the batch.
    pub fn add(&mut self, event: FileEvent) {
        self.events.retain(|existing| existing.path() != event.path());
        self.events.push(event);
    }

    /// Check if batch is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Get total number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Events in delivery order.
    #[must_use]
    pub fn events(&self) -> &[FileEvent] {
        &self.events
    }
}

impl FromIterator<FileEvent> for EventBatch {
    fn from_iter<I: IntoIterator<Item = FileEvent>>(iter: I) -> Self {
        let mut batch = Self::new();
        for event in iter {
            batch.add(event);
        }
        batch
    }
}

impl IntoIterator for EventBatch {
    type Item = FileEvent;
    type IntoIter = std::vec::IntoIter<FileEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.into_iter()
    }
}
