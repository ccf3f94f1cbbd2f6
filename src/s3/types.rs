//! Storage and CDN data types

use std::path::{Path, PathBuf};

/// One page of a bucket listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectPage {
    pub keys: Vec<String>,
    /// Cursor for the next page, `None` on the last page
    pub next_token: Option<String>,
}

impl ObjectPage {
    pub fn is_last(&self) -> bool {
        self.next_token.is_none()
    }
}

/// Remote key and content type computed for a local file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedKey {
    pub key: String,
    pub content_type: Option<String>,
}

impl MappedKey {
    /// Content type for display, empty when unknown
    pub fn content_type_str(&self) -> &str {
        self.content_type.as_deref().unwrap_or_default()
    }
}

/// A regular file found under the site directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteFile {
    /// Path on disk
    pub path: PathBuf,
    /// Path relative to the site root, always `/`-separated
    pub relative: String,
}

impl SiteFile {
    pub fn new(base: &Path, path: PathBuf) -> Option<Self> {
        let relative = path
            .strip_prefix(base)
            .ok()?
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        if relative.is_empty() {
            return None;
        }

        Some(Self { path, relative })
    }
}

/// A CDN distribution and its origins, in configured order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionSummary {
    pub id: String,
    pub origin_domains: Vec<String>,
}

impl DistributionSummary {
    pub fn first_origin(&self) -> Option<&str> {
        self.origin_domains.first().map(String::as_str)
    }
}

/// Reference to a submitted invalidation; completion is not awaited
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidationHandle {
    pub distribution_id: String,
    pub invalidation_id: String,
    pub status: String,
    pub caller_reference: String,
}
