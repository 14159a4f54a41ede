//! Scan target filtering by extension and well-known ignored directories.

use std::path::{Component, Path};

/// Directories never scanned when they appear below a scan root.
const IGNORED_DIRS: &[&str] = &[
    "node_modules",
    "target",
    "build",
    "dist",
    "coverage",
    "vendor",
    "out",
];

/// Decides which files are scan targets.
#[derive(Debug, Clone)]
pub struct FileFilter {
    extensions: Vec<String>,
}

impl FileFilter {
    /// Create a filter accepting the given extensions (no leading dot).
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|e| e.into().to_lowercase())
                .collect(),
        }
    }

    /// Accepted extensions.
    #[must_use]
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Check whether `path` is a scan target under `root`.
    ///
    /// Only the path is inspected, so this also works for files that have
    /// already been deleted.
    #[must_use]
    pub fn matches(&self, root: &Path, path: &Path) -> bool {
        is_in_scope(root, path) && self.has_extension(path)
    }

    /// Check the extension alone.
    #[must_use]
    pub fn has_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| {
                let ext = ext.to_lowercase();
                self.extensions.iter().any(|e| *e == ext)
            })
    }
}

/// Check whether `path` lies in the scanned part of `root`, whatever its
/// extension.
///
/// Directories above `root` never count, so a root nested inside a `build`
/// or dot-directory is still scanned.
#[must_use]
pub fn is_in_scope(root: &Path, path: &Path) -> bool {
    path.strip_prefix(root)
        .is_ok_and(|rel| !is_default_ignored(rel) && !is_hidden(rel))
}

/// Check if a root-relative path lies under a build or dependency
/// directory.
#[must_use]
pub fn is_default_ignored(relative: &Path) -> bool {
    let mut components = relative.components().peekable();
    while let Some(component) = components.next() {
        // The last component is the file name itself.
        if components.peek().is_none() {
            break;
        }
        if let Component::Normal(name) = component {
            let name = name.to_string_lossy();
            if IGNORED_DIRS.contains(&name.as_ref()) {
                return true;
            }
        }
    }
    false
}

/// Hidden entries below a root are skipped, matching the initial walk.
fn is_hidden(relative: &Path) -> bool {
    relative
        .components()
        .any(|c| c.as_os_str().to_str().is_some_and(|s| s.starts_with('.')))
}
