//! Builder service: file events in, broadcasts out.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::builder::RegistryBuilder;
use crate::server::BroadcastHub;
use crate::watcher::{collect_files_async, FileEvent, FileFilter, FileWatcher, WatcherConfig};
use crate::{Config, Result};

/// Runs the registry builder on its own task.
pub struct BuilderService {
    scan_dirs: Vec<PathBuf>,
    filter: FileFilter,
    debounce: Duration,
    hub: Arc<BroadcastHub>,
}

impl BuilderService {
    /// Create a service feeding `hub`.
    #[must_use]
    pub fn new(config: &Config, hub: Arc<BroadcastHub>) -> Self {
        Self {
            scan_dirs: config.scan_dirs.clone(),
            filter: FileFilter::new(config.normalized_extensions()),
            debounce: config.debounce(),
            hub,
        }
    }

    /// Scan, publish the baseline, then rebuild and broadcast on every file
    /// event until `shutdown` is cancelled.
    ///
    /// # Errors
    ///
    /// Returns an error if a scan directory cannot be watched or the initial
    /// walk fails.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        // Watch first so edits racing the walk arrive as post-baseline events.
        let watch_dirs: Vec<PathBuf> = self
            .scan_dirs
            .iter()
            .filter(|dir| {
                let exists = dir.is_dir();
                if !exists {
                    tracing::warn!(path = %dir.display(), "Scan directory does not exist, not watching");
                }
                exists
            })
            .cloned()
            .collect();
        let mut watcher = FileWatcher::new(&WatcherConfig {
            roots: watch_dirs,
            debounce: self.debounce,
            filter: self.filter.clone(),
        })?;

        let mut builder = RegistryBuilder::new();
        let (files, stats) = collect_files_async(&self.scan_dirs, &self.filter).await?;
        tracing::info!(
            roots = self.scan_dirs.len(),
            found = stats.files_found,
            matched = stats.files_matched,
            errors = stats.errors,
            "Initial scan complete"
        );
        for path in files {
            builder.apply(&FileEvent::Changed(path));
        }

        let baseline = builder.complete_initial_scan();
        tracing::info!(
            classes = baseline.classes.len(),
            files = baseline.files.len(),
            "Extracted baseline registry"
        );
        self.hub.publish_baseline(baseline);

        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                batch = watcher.recv() => {
                    let Some(batch) = batch else {
                        tracing::warn!("File watcher stopped");
                        break;
                    };
                    for event in batch {
                        if let FileEvent::Removed(path) = &event {
                            if !self.filter.has_extension(path) && !builder.tracks(path) {
                                tracing::trace!(path = %path.display(), "Ignoring untracked removal");
                                continue;
                            }
                        }
                        tracing::info!(event = ?event, "File event");
                        if let Some(snapshot) = builder.apply(&event) {
                            self.hub.broadcast(snapshot);
                        }
                    }
                }
            }
        }

        tracing::info!("Builder service stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn config_for(dir: &std::path::Path) -> Config {
        Config {
            scan_dirs: vec![dir.to_path_buf()],
            debounce_ms: 50,
            ..Config::default()
        }
    }

    async fn wait_for_baseline(hub: &BroadcastHub) -> Arc<crate::registry::Registry> {
        for _ in 0..200 {
            if let Some(registry) = hub.latest() {
                return registry;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("baseline was not published");
    }

    /// Wait for a broadcast satisfying `done`.
    async fn wait_for_frame(
        frames: &mut tokio::sync::mpsc::UnboundedReceiver<Arc<str>>,
        done: impl Fn(&crate::registry::Registry) -> bool,
    ) -> Arc<crate::registry::Registry> {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let frame = frames.recv().await.unwrap();
                let registry = crate::protocol::ServerMessage::decode(&frame)
                    .unwrap()
                    .into_registry();
                if done(registry.as_ref()) {
                    return registry;
                }
            }
        })
        .await
        .expect("expected broadcast did not arrive")
    }

    #[tokio::test]
    async fn test_service_publishes_baseline() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("A.tsx"), r#"<div className="alpha beta" />"#).unwrap();
        fs::write(tmp.path().join("notes.md"), r#"<div className="ignored" />"#).unwrap();

        let hub = Arc::new(BroadcastHub::new());
        let token = CancellationToken::new();
        let service = BuilderService::new(&config_for(tmp.path()), Arc::clone(&hub));
        let handle = tokio::spawn(service.run(token.clone()));

        let baseline = wait_for_baseline(&hub).await;
        assert_eq!(baseline.classes, vec!["alpha", "beta"]);
        assert_eq!(baseline.files.len(), 1);

        token.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_service_broadcasts_changes() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("A.tsx"), r#"<div className="alpha" />"#).unwrap();

        let hub = Arc::new(BroadcastHub::new());
        let token = CancellationToken::new();
        let service = BuilderService::new(&config_for(tmp.path()), Arc::clone(&hub));
        let handle = tokio::spawn(service.run(token.clone()));

        wait_for_baseline(&hub).await;
        let (_id, mut frames) = hub.connect();
        let _baseline = frames.recv().await.unwrap();

        fs::write(tmp.path().join("B.tsx"), r#"<p class="gamma" />"#).unwrap();

        let frame = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let frame = frames.recv().await.unwrap();
                let registry = crate::protocol::ServerMessage::decode(&frame)
                    .unwrap()
                    .into_registry();
                if registry.classes.contains(&"gamma".to_string()) {
                    return registry;
                }
            }
        })
        .await
        .expect("change should be broadcast");
        assert_eq!(frame.classes, vec!["alpha", "gamma"]);

        token.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_service_tolerates_missing_scan_dir() {
        let tmp = TempDir::new().unwrap();
        let config = Config {
            scan_dirs: vec![tmp.path().join("missing")],
            ..Config::default()
        };

        let hub = Arc::new(BroadcastHub::new());
        let token = CancellationToken::new();
        let handle = tokio::spawn(BuilderService::new(&config, Arc::clone(&hub)).run(token.clone()));

        let baseline = wait_for_baseline(&hub).await;
        assert!(baseline.classes.is_empty());

        token.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_service_scans_root_under_ignored_ancestor() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("build").join("app").join("src");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("A.tsx"), r#"<div className="alpha" />"#).unwrap();

        let hub = Arc::new(BroadcastHub::new());
        let token = CancellationToken::new();
        let service = BuilderService::new(&config_for(&root), Arc::clone(&hub));
        let handle = tokio::spawn(service.run(token.clone()));

        let baseline = wait_for_baseline(&hub).await;
        assert_eq!(baseline.classes, vec!["alpha"]);

        let (_id, mut frames) = hub.connect();
        let _baseline = frames.recv().await.unwrap();
        fs::write(root.join("B.tsx"), r#"<p className="beta" />"#).unwrap();

        let registry = wait_for_frame(&mut frames, |r| r.classes.contains(&"beta".to_string())).await;
        assert_eq!(registry.classes, vec!["alpha", "beta"]);

        token.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_service_drops_directory_moved_out() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("src");
        let widgets = root.join("widgets");
        fs::create_dir_all(&widgets).unwrap();
        fs::write(root.join("App.tsx"), r#"<div className="app" />"#).unwrap();
        fs::write(widgets.join("W.tsx"), r#"<div className="widget" />"#).unwrap();

        let hub = Arc::new(BroadcastHub::new());
        let token = CancellationToken::new();
        let service = BuilderService::new(&config_for(&root), Arc::clone(&hub));
        let handle = tokio::spawn(service.run(token.clone()));

        let baseline = wait_for_baseline(&hub).await;
        assert_eq!(baseline.classes, vec!["app", "widget"]);

        let (_id, mut frames) = hub.connect();
        let _baseline = frames.recv().await.unwrap();
        fs::rename(&widgets, tmp.path().join("widgets")).unwrap();

        let registry =
            wait_for_frame(&mut frames, |r| !r.classes.contains(&"widget".to_string())).await;
        assert_eq!(registry.classes, vec!["app"]);
        assert_eq!(registry.files.len(), 1);

        token.cancel();
        handle.await.unwrap().unwrap();
    }
}
