//! Per-file identifier index.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};

/// Identifiers extracted from each successfully scanned file.
///
/// An entry exists only while its file has been scanned at least once and
/// not removed since. Keys are canonical absolute paths.
#[derive(Debug, Default, Clone)]
pub struct FileIndex {
    entries: BTreeMap<PathBuf, HashSet<String>>,
}

impl FileIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the entry for `path`, returning the previous set.
    pub fn insert(&mut self, path: PathBuf, identifiers: HashSet<String>) -> Option<HashSet<String>> {
        self.entries.insert(path, identifiers)
    }

    /// Remove the entry for `path`, if any.
    pub fn remove(&mut self, path: &Path) -> Option<HashSet<String>> {
        self.entries.remove(path)
    }

    /// Remove `path` and every entry below it, returning how many went.
    pub fn remove_prefix(&mut self, path: &Path) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.starts_with(path));
        before - self.entries.len()
    }

    /// Whether `path` or anything below it has an entry.
    #[must_use]
    pub fn covers(&self, path: &Path) -> bool {
        self.entries.keys().any(|key| key.starts_with(path))
    }

    /// Identifiers recorded for `path`.
    #[must_use]
    pub fn get(&self, path: &Path) -> Option<&HashSet<String>> {
        self.entries.get(path)
    }

    /// Whether `path` has an entry.
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    /// Number of indexed files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Indexed paths in sorted order.
    pub fn paths(&self) -> impl Iterator<Item = &PathBuf> {
        self.entries.keys()
    }

    /// Sorted, deduplicated union of every entry, recomputed on each call.
    #[must_use]
    pub fn union(&self) -> Vec<String> {
        self.entries
            .values()
            .flatten()
            .map(String::as_str)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(str::to_owned)
            .collect()
    }
}

/// Absolute form of `path` with its parent directory canonicalized.
///
/// The file name itself is not resolved, so a path keeps the same key after
/// the file is deleted.
#[must_use]
pub fn canonical_path(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    match (absolute.parent(), absolute.file_name()) {
        (Some(parent), Some(name)) => std::fs::canonicalize(parent)
            .map_or_else(|_| absolute.clone(), |dir| dir.join(name)),
        _ => absolute,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn set(items: &[&str]) -> HashSet<String> {
        items.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_insert_and_replace() {
        let mut index = FileIndex::new();
        assert!(index.insert(PathBuf::from("/a.tsx"), set(&["x"])).is_none());
        let old = index.insert(PathBuf::from("/a.tsx"), set(&["y"])).unwrap();
        assert_eq!(old, set(&["x"]));
        assert_eq!(index.get(Path::new("/a.tsx")), Some(&set(&["y"])));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_remove_missing_is_noop() {
        let mut index = FileIndex::new();
        assert!(index.remove(Path::new("/nope.tsx")).is_none());
        assert!(index.is_empty());
    }

    #[test]
    fn test_remove_prefix_drops_subtree() {
        let mut index = FileIndex::new();
        index.insert(PathBuf::from("/src/widgets/A.tsx"), set(&["a"]));
        index.insert(PathBuf::from("/src/widgets/deep/B.tsx"), set(&["b"]));
        index.insert(PathBuf::from("/src/widgets2/C.tsx"), set(&["c"]));
        index.insert(PathBuf::from("/src/D.tsx"), set(&["d"]));

        assert!(index.covers(Path::new("/src/widgets")));
        assert_eq!(index.remove_prefix(Path::new("/src/widgets")), 2);
        assert!(!index.covers(Path::new("/src/widgets")));
        assert_eq!(index.union(), vec!["c", "d"]);

        assert_eq!(index.remove_prefix(Path::new("/src/D.tsx")), 1);
        assert_eq!(index.remove_prefix(Path::new("/nowhere")), 0);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_union_sorted_and_deduplicated() {
        let mut index = FileIndex::new();
        index.insert(PathBuf::from("/b.tsx"), set(&["zeta", "alpha"]));
        index.insert(PathBuf::from("/a.tsx"), set(&["alpha", "mid"]));

        assert_eq!(index.union(), vec!["alpha", "mid", "zeta"]);
        let paths: Vec<_> = index.paths().cloned().collect();
        assert_eq!(paths, vec![PathBuf::from("/a.tsx"), PathBuf::from("/b.tsx")]);
    }

    #[test]
    fn test_canonical_path_stable_after_delete() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("gone.tsx");
        std::fs::write(&file, "").unwrap();

        let before = canonical_path(&file);
        std::fs::remove_file(&file).unwrap();
        let after = canonical_path(&file);

        assert_eq!(before, after);
        assert!(before.is_absolute());
    }

    #[test]
    fn test_canonical_path_resolves_dot_dot() {
        let tmp = TempDir::new().unwrap();
        let sub = tmp.path().join("sub");
        std::fs::create_dir(&sub).unwrap();

        let direct = canonical_path(&tmp.path().join("x.tsx"));
        let dotted = canonical_path(&sub.join("..").join("x.tsx"));
        assert_eq!(direct, dotted);
    }
}
