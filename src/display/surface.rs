//! Rendered-surface inspection.
//!
//! Inspecting a surface yields two read-only views taken together: the
//! identifier attributes of its rendered elements, and the selector text of
//! every style source it can reach. Style sources are inspected best-effort;
//! a restricted or broken source is skipped without failing the pass.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::Regex;

use crate::error::SurfaceError;

/// Selector texts of one style source, or why it could not be read.
pub type StyleSource = Result<Vec<String>, SurfaceError>;

/// One consistent reading of a surface.
#[derive(Debug, Default)]
pub struct Inspection {
    /// Identifier tokens of every rendered element.
    pub classes: Vec<String>,
    /// Selector texts, one entry per style source.
    pub style_sources: Vec<StyleSource>,
}

/// Read-only view of a rendered document.
pub trait Surface: Send + Sync {
    /// Human-readable name used in logs.
    fn name(&self) -> String;

    /// Read elements and style sources from the same document state.
    ///
    /// # Errors
    ///
    /// Returns an error if the document itself cannot be inspected; this
    /// fails the validation pass.
    fn inspect(&self) -> Result<Inspection, SurfaceError>;
}

static SELECTOR_CLASS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.([a-zA-Z0-9_-]+)").expect("valid selector regex"));

/// Class names referenced by a selector, without the leading dot.
pub fn selector_classes(selector: &str) -> impl Iterator<Item = &str> {
    SELECTOR_CLASS
        .captures_iter(selector)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Every identifier observable on `surface`.
///
/// # Errors
///
/// Returns an error only if the element view fails; style source failures
/// are logged and skipped.
pub fn observed_classes(surface: &dyn Surface) -> Result<HashSet<String>, SurfaceError> {
    let Inspection {
        classes,
        style_sources,
    } = surface.inspect()?;
    let mut observed: HashSet<String> = classes.into_iter().collect();

    for source in style_sources {
        match source {
            Ok(selectors) => {
                for selector in &selectors {
                    observed.extend(selector_classes(selector).map(str::to_string));
                }
            }
            Err(e) => {
                tracing::debug!(error = %e, "Skipping style source");
            }
        }
    }

    Ok(observed)
}

static CLASS_ATTR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\sclass\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("valid class regex")
});

static STYLE_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<style\b[^>]*>(.*?)</style>").expect("valid style regex"));

static LINK_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<link\b[^>]*>").expect("valid link regex"));

static STYLESHEET_REL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\srel\s*=\s*["']?stylesheet\b"#).expect("valid rel regex")
});

static HREF_ATTR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\shref\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("valid href regex")
});

static CSS_COMMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)/\*.*?\*/").expect("valid comment regex"));

static RULE_PRELUDE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([^{}]+)\{").expect("valid prelude regex"));

/// Selector texts of the style rules in a stylesheet.
///
/// At-rule preludes (`@media`, `@font-face`, ...) are not selectors and are
/// skipped; rules nested inside them are kept. Statements ending in `;`
/// before a rule, such as `@import` or `@charset`, are dropped from its
/// prelude.
pub fn stylesheet_selectors(css: &str) -> Vec<String> {
    let css = CSS_COMMENT.replace_all(css, "");
    RULE_PRELUDE
        .captures_iter(&css)
        .filter_map(|caps| caps.get(1))
        .filter_map(|m| m.as_str().rsplit(';').next())
        .map(str::trim)
        .filter(|prelude| !prelude.is_empty() && !prelude.starts_with('@'))
        .map(str::to_string)
        .collect()
}

fn first_group<'t>(caps: &regex::Captures<'t>) -> Option<&'t str> {
    caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str())
}

fn is_remote(href: &str) -> bool {
    href.starts_with("//") || href.contains("://")
}

/// A rendered HTML document on disk, read once per inspection.
///
/// Inline `<style>` blocks and local `<link rel="stylesheet">` files are
/// readable style sources. Remote stylesheets are restricted.
#[derive(Debug, Clone)]
pub struct HtmlSurface {
    path: PathBuf,
}

impl HtmlSurface {
    /// Inspect the document at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Document path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn document(&self) -> Result<String, SurfaceError> {
        std::fs::read_to_string(&self.path)
            .map_err(|e| SurfaceError::unreadable(self.path.display().to_string(), e))
    }

    fn element_classes(html: &str) -> Vec<String> {
        CLASS_ATTR
            .captures_iter(html)
            .filter_map(|caps| first_group(&caps))
            .flat_map(str::split_whitespace)
            .map(str::to_string)
            .collect()
    }

    fn style_sources(&self, html: &str) -> Vec<StyleSource> {
        let inline = STYLE_BLOCK
            .captures_iter(html)
            .filter_map(|caps| caps.get(1))
            .map(|m| Ok(stylesheet_selectors(m.as_str())));

        let linked = LINK_TAG
            .find_iter(html)
            .map(|m| m.as_str())
            .filter(|tag| STYLESHEET_REL.is_match(tag))
            .filter_map(|tag| {
                HREF_ATTR
                    .captures(tag)
                    .and_then(|caps| first_group(&caps).map(str::to_string))
            })
            .map(|href| self.linked_stylesheet(&href));

        inline.chain(linked).collect()
    }

    fn linked_stylesheet(&self, href: &str) -> StyleSource {
        if is_remote(href) {
            return Err(SurfaceError::restricted(href));
        }

        let base = self.path.parent().unwrap_or_else(|| Path::new("."));
        let css = std::fs::read_to_string(base.join(href))
            .map_err(|e| SurfaceError::unreadable(href, e))?;
        Ok(stylesheet_selectors(&css))
    }
}

impl Surface for HtmlSurface {
    fn name(&self) -> String {
        self.path.display().to_string()
    }

    fn inspect(&self) -> Result<Inspection, SurfaceError> {
        let html = self.document()?;
        Ok(Inspection {
            classes: Self::element_classes(&html),
            style_sources: self.style_sources(&html),
        })
    }
}

/// In-memory surface whose contents can be swapped between passes.
#[derive(Debug, Default)]
pub struct StaticSurface {
    name: String,
    contents: RwLock<StaticContents>,
}

#[derive(Debug, Clone, Default)]
struct StaticContents {
    classes: Vec<String>,
    selectors: Vec<String>,
    restricted: Vec<String>,
}

impl StaticSurface {
    /// Empty surface called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            contents: RwLock::default(),
        }
    }

    /// Set the rendered element identifiers.
    #[must_use]
    pub fn with_classes<I, S>(self, classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_classes(classes);
        self
    }

    /// Add a readable style source with the given selectors.
    #[must_use]
    pub fn with_selectors<I, S>(self, selectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.contents
            .write()
            .selectors
            .extend(selectors.into_iter().map(Into::into));
        self
    }

    /// Add a style source that refuses inspection.
    #[must_use]
    pub fn with_restricted(self, source_ref: impl Into<String>) -> Self {
        self.contents.write().restricted.push(source_ref.into());
        self
    }

    /// Replace the rendered element identifiers.
    pub fn set_classes<I, S>(&self, classes: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.contents.write().classes = classes.into_iter().map(Into::into).collect();
    }
}

impl Surface for StaticSurface {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn inspect(&self) -> Result<Inspection, SurfaceError> {
        let contents = self.contents.read();
        let style_sources = std::iter::once(Ok(contents.selectors.clone()))
            .chain(
                contents
                    .restricted
                    .iter()
                    .map(|source_ref| -> StyleSource {
                        Err(SurfaceError::restricted(source_ref.as_str()))
                    }),
            )
            .collect();
        Ok(Inspection {
            classes: contents.classes.clone(),
            style_sources,
        })
    }
}
