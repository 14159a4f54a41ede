//! File system watching and scan target discovery.
//!
//! This module provides:
//! - Directory watching using notify-rs with debouncing
//! - Extension and build-directory filtering
//! - Gitignore-aware initial directory walk

mod events;
mod filter;
mod walk;
#[allow(clippy::module_inception)]
mod watcher;

pub use events::{EventBatch, FileEvent};
pub use filter::{is_default_ignored, is_in_scope, FileFilter};
pub use walk::{collect_files, collect_files_async, WalkStats};
pub use watcher::{FileWatcher, WatcherConfig};
