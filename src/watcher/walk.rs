//! Directory walk for the initial scan.
//!
//! Walks scan roots respecting .gitignore and collects scan targets.

use std::ops::AddAssign;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;

use super::filter::FileFilter;
use crate::Result;

/// Walk statistics.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WalkStats {
    pub files_found: u64,
    pub files_matched: u64,
    pub files_skipped: u64,
    pub errors: u64,
}

impl AddAssign for WalkStats {
    fn add_assign(&mut self, other: Self) {
        self.files_found += other.files_found;
        self.files_matched += other.files_matched;
        self.files_skipped += other.files_skipped;
        self.errors += other.errors;
    }
}

/// Collect scan targets under `root`.
///
/// Ignore rules apply to the part of each path below `root` only.
/// Unreadable entries are logged and counted, never fatal.
#[must_use]
pub fn collect_files(root: &Path, filter: &FileFilter) -> (Vec<PathBuf>, WalkStats) {
    let mut stats = WalkStats::default();
    let mut files = Vec::new();

    tracing::debug!(path = %root.display(), "Starting directory walk");

    let walker = WalkBuilder::new(root)
        .hidden(true) // Respect hidden files/dirs
        .git_ignore(true) // Respect .gitignore
        .git_exclude(true) // Respect .git/info/exclude
        .ignore(true) // Respect .ignore files
        .parents(true) // Check parent directories for ignore files
        .build();

    for entry in walker {
        match entry {
            Ok(entry) => {
                if !entry.file_type().is_some_and(|t| t.is_file()) {
                    continue;
                }

                stats.files_found += 1;
                if filter.matches(root, entry.path()) {
                    stats.files_matched += 1;
                    files.push(entry.into_path());
                } else {
                    stats.files_skipped += 1;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Error walking directory");
                stats.errors += 1;
            }
        }
    }

    tracing::info!(
        path = %root.display(),
        found = stats.files_found,
        matched = stats.files_matched,
        skipped = stats.files_skipped,
        errors = stats.errors,
        "Directory walk complete"
    );

    (files, stats)
}

/// Walk every root on the blocking pool, skipping roots that do not exist.
///
/// Returns the files of every root with the combined statistics.
///
/// # Errors
///
/// Returns an error if the blocking task fails.
pub async fn collect_files_async(
    roots: &[PathBuf],
    filter: &FileFilter,
) -> Result<(Vec<PathBuf>, WalkStats)> {
    let roots = roots.to_vec();
    let filter = filter.clone();

    tokio::task::spawn_blocking(move || {
        let mut all = Vec::new();
        let mut total = WalkStats::default();
        for root in &roots {
            if !root.is_dir() {
                tracing::warn!(path = %root.display(), "Scan directory does not exist, skipping");
                continue;
            }
            let (files, stats) = collect_files(root, &filter);
            all.extend(files);
            total += stats;
        }
        (all, total)
    })
    .await
    .map_err(|e| crate::Error::internal(format!("Walk task failed: {e}")))
}
