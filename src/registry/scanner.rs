//! Identifier extraction from source text.
//!
//! Each pattern locates one attribute-like or call-like construct and
//! captures a whitespace-separated token list. Patterns run independently
//! and their results are unioned.

use std::collections::HashSet;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ScanError;

/// Extraction patterns; capture group 1 holds the token list.
const CLASS_PATTERNS: &[&str] = &[
    // JSX attribute
    r#"className=["'](.*?)["']"#,
    // HTML attribute
    r#"class=["'](.*?)["']"#,
    // DOM calls
    r#"classList\.add\(["'](.*?)["']\)"#,
    r#"classList\.toggle\(["'](.*?)["']\)"#,
];

static COMPILED_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    CLASS_PATTERNS
        .iter()
        .map(|pattern| Regex::new(pattern).expect("class pattern must compile"))
        .collect()
});

/// Extract every identifier referenced in `content`.
///
/// Never fails: text that matches no pattern yields an empty set.
#[must_use]
pub fn extract_identifiers(content: &str) -> HashSet<String> {
    let mut identifiers = HashSet::new();

    for pattern in COMPILED_PATTERNS.iter() {
        for captures in pattern.captures_iter(content) {
            if let Some(list) = captures.get(1) {
                identifiers.extend(list.as_str().split_whitespace().map(str::to_owned));
            }
        }
    }

    identifiers
}

/// Read `path` and extract its identifiers.
///
/// # Errors
///
/// Returns `ScanError::Read` if the file cannot be read as UTF-8 text.
pub fn scan_file(path: &Path) -> Result<HashSet<String>, ScanError> {
    let content = std::fs::read_to_string(path).map_err(|e| ScanError::read(path, e))?;
    Ok(extract_identifiers(&content))
}
