//! Debounced notify watcher over the scan roots.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{new_debouncer, DebounceEventHandler, DebounceEventResult, Debouncer};
use parking_lot::RwLock;
use tokio::sync::mpsc;

use super::events::{EventBatch, FileEvent};
use super::filter::{is_in_scope, FileFilter};
use crate::error::WatcherError;
use crate::Result;

const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(200);

/// Batches buffered before the notify thread blocks.
const BATCH_QUEUE: usize = 100;

/// Watcher configuration.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Roots watched recursively.
    pub roots: Vec<PathBuf>,
    /// Quiet period before a burst of notifications is delivered.
    pub debounce: Duration,
    /// Which paths are forwarded.
    pub filter: FileFilter,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            debounce: DEFAULT_DEBOUNCE,
            filter: FileFilter::new(["tsx"]),
        }
    }
}

/// Runs on the debouncer thread: classifies, filters and forwards.
struct BatchForwarder {
    tx: mpsc::Sender<EventBatch>,
    roots: Arc<RwLock<Vec<PathBuf>>>,
    filter: FileFilter,
}

impl BatchForwarder {
    /// Removals skip the extension check: a removed directory carries none,
    /// yet may hold indexed files.
    fn accepts(&self, roots: &[PathBuf], event: &FileEvent) -> bool {
        roots.iter().any(|root| match event {
            FileEvent::Changed(path) => self.filter.matches(root, path),
            FileEvent::Removed(path) => is_in_scope(root, path),
        })
    }
}

impl DebounceEventHandler for BatchForwarder {
    fn handle_event(&mut self, result: DebounceEventResult) {
        let events = match result {
            Ok(events) => events,
            Err(e) => {
                tracing::error!(error = %e, "Watch error");
                return;
            }
        };

        let batch: EventBatch = {
            let roots = self.roots.read();
            events
                .into_iter()
                .filter_map(|event| FileEvent::from_disk(event.path))
                .filter(|event| self.accepts(&roots, event))
                .collect()
        };

        if batch.is_empty() {
            return;
        }
        tracing::trace!(events = batch.len(), "Forwarding event batch");
        if self.tx.blocking_send(batch).is_err() {
            tracing::debug!("Event receiver dropped");
        }
    }
}

/// Delivers debounced, filtered file events for the scan roots.
///
/// Each batch holds at most one event per path, classified by what is on
/// disk when the batch is formed.
pub struct FileWatcher {
    debouncer: Debouncer<RecommendedWatcher>,
    batches: mpsc::Receiver<EventBatch>,
    roots: Arc<RwLock<Vec<PathBuf>>>,
}

impl FileWatcher {
    /// Start watching every configured root.
    ///
    /// # Errors
    ///
    /// Returns an error if the watcher cannot be created or a root cannot
    /// be watched.
    pub fn new(config: &WatcherConfig) -> Result<Self> {
        let (tx, batches) = mpsc::channel(BATCH_QUEUE);
        let roots = Arc::new(RwLock::new(Vec::new()));

        let forwarder = BatchForwarder {
            tx,
            roots: Arc::clone(&roots),
            filter: config.filter.clone(),
        };
        let debouncer =
            new_debouncer(config.debounce, forwarder).map_err(|e| WatcherError::WatchFailed {
                path: "<debouncer>".to_string(),
                reason: e.to_string(),
            })?;

        let mut watcher = Self {
            debouncer,
            batches,
            roots,
        };
        for root in &config.roots {
            watcher.add_root(root)?;
        }

        Ok(watcher)
    }

    /// Watch another root recursively.
    ///
    /// # Errors
    ///
    /// Returns an error if `root` does not exist or cannot be watched.
    pub fn add_root(&mut self, root: &Path) -> Result<()> {
        let failed = |reason: String| WatcherError::WatchFailed {
            path: root.display().to_string(),
            reason,
        };

        // Notify reports canonical paths on some platforms.
        let root = std::fs::canonicalize(root).map_err(|e| failed(e.to_string()))?;
        self.debouncer
            .watcher()
            .watch(&root, RecursiveMode::Recursive)
            .map_err(|e| failed(e.to_string()))?;

        tracing::info!(path = %root.display(), "Watching directory");
        self.roots.write().push(root);
        Ok(())
    }

    /// Next batch of events, or `None` once the watcher has stopped.
    pub async fn recv(&mut self) -> Option<EventBatch> {
        self.batches.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_for(root: &Path) -> WatcherConfig {
        WatcherConfig {
            roots: vec![root.to_path_buf()],
            debounce: Duration::from_millis(50),
            ..WatcherConfig::default()
        }
    }

    async fn next_batch(watcher: &mut FileWatcher) -> EventBatch {
        tokio::time::timeout(Duration::from_secs(5), watcher.recv())
            .await
            .expect("watcher should report an event")
            .expect("watcher stopped")
    }

    #[test]
    fn test_config_default() {
        let config = WatcherConfig::default();
        assert!(config.roots.is_empty());
        assert_eq!(config.debounce, DEFAULT_DEBOUNCE);
        assert_eq!(config.filter.extensions(), ["tsx"]);
    }

    #[test]
    fn test_missing_root_fails() {
        let mut watcher = FileWatcher::new(&WatcherConfig::default()).unwrap();
        assert!(watcher.add_root(Path::new("/nonexistent/directory")).is_err());
    }

    #[test]
    fn test_accepts_directory_removal() {
        let (tx, _rx) = mpsc::channel(1);
        let forwarder = BatchForwarder {
            tx,
            roots: Arc::default(),
            filter: FileFilter::new(["tsx"]),
        };
        let roots = [PathBuf::from("/p/src")];

        assert!(forwarder.accepts(&roots, &FileEvent::Removed(PathBuf::from("/p/src/widgets"))));
        assert!(!forwarder.accepts(&roots, &FileEvent::Changed(PathBuf::from("/p/src/widgets"))));
        assert!(!forwarder.accepts(&roots, &FileEvent::Removed(PathBuf::from("/p/other"))));
        assert!(!forwarder.accepts(
            &roots,
            &FileEvent::Removed(PathBuf::from("/p/src/node_modules/pkg"))
        ));
    }

    #[tokio::test]
    async fn test_reports_events_under_ignored_ancestor() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("build").join("app");
        std::fs::create_dir_all(&root).unwrap();
        let mut watcher = FileWatcher::new(&config_for(&root)).unwrap();

        std::fs::write(root.join("Nested.tsx"), "<i className=\"n\" />").unwrap();

        let batch = next_batch(&mut watcher).await;
        assert!(batch
            .events()
            .iter()
            .any(|e| matches!(e, FileEvent::Changed(p) if p.ends_with("Nested.tsx"))));
    }

    #[tokio::test]
    async fn test_reports_removed_directory() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("src");
        let widgets = root.join("widgets");
        std::fs::create_dir_all(&widgets).unwrap();
        std::fs::write(widgets.join("W.tsx"), "<i className=\"w\" />").unwrap();
        let mut watcher = FileWatcher::new(&config_for(&root)).unwrap();

        std::fs::rename(&widgets, tmp.path().join("widgets")).unwrap();

        let removed = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let batch = watcher.recv().await.expect("watcher stopped");
                if batch
                    .events()
                    .iter()
                    .any(|e| matches!(e, FileEvent::Removed(p) if p.ends_with("widgets")))
                {
                    return;
                }
            }
        })
        .await;
        assert!(removed.is_ok(), "directory removal should be forwarded");
    }

    #[tokio::test]
    async fn test_reports_new_file() {
        let tmp = TempDir::new().unwrap();
        let mut watcher = FileWatcher::new(&config_for(tmp.path())).unwrap();

        std::fs::write(tmp.path().join("New.tsx"), "<i className=\"x\" />").unwrap();

        let batch = next_batch(&mut watcher).await;
        assert!(batch
            .events()
            .iter()
            .any(|e| matches!(e, FileEvent::Changed(p) if p.ends_with("New.tsx"))));
    }

    #[tokio::test]
    async fn test_filters_other_extensions() {
        let tmp = TempDir::new().unwrap();
        let mut watcher = FileWatcher::new(&config_for(tmp.path())).unwrap();

        std::fs::write(tmp.path().join("notes.md"), "# notes").unwrap();
        std::fs::write(tmp.path().join("Card.tsx"), "<b className=\"card\" />").unwrap();

        // The markdown file never shows up, alone or alongside the component.
        let batch = next_batch(&mut watcher).await;
        assert!(batch.events().iter().all(|e| e.path().ends_with("Card.tsx")));
    }
}
