//! Local path to object key and content type mapping
//!
//! HTML pages lose their `.html` extension so visitors reach `/about` rather
//! than `/about.html`. `index.html` and `error.html` keep their names since
//! the hosting platform looks them up verbatim as default and error documents.

use crate::s3::types::MappedKey;

/// File names uploaded with their `.html` extension intact
pub const RESERVED_PAGES: [&str; 2] = ["index.html", "error.html"];

const HTML_EXTENSION: &str = ".html";

/// Content types for common site assets.
///
/// Consulted before `mime_guess` so text assets carry an explicit charset.
const WEB_CONTENT_TYPES: &[(&str, &str)] = &[
    ("avif", "image/avif"),
    ("css", "text/css; charset=utf-8"),
    ("gif", "image/gif"),
    ("htm", "text/html; charset=utf-8"),
    ("html", "text/html; charset=utf-8"),
    ("jpeg", "image/jpeg"),
    ("jpg", "image/jpeg"),
    ("js", "text/javascript; charset=utf-8"),
    ("json", "application/json"),
    ("mjs", "text/javascript; charset=utf-8"),
    ("pdf", "application/pdf"),
    ("png", "image/png"),
    ("svg", "image/svg+xml"),
    ("wasm", "application/wasm"),
    ("webp", "image/webp"),
    ("xml", "text/xml; charset=utf-8"),
];

/// Map a `/`-separated path relative to the site root to its remote key and
/// content type. Never fails.
pub fn map_key(relative: &str, prefix: &str) -> MappedKey {
    MappedKey {
        key: join_prefix(prefix, &object_key_for(relative)),
        content_type: content_type_for(relative),
    }
}

/// Remote key for a relative path, before any prefix is applied.
pub fn object_key_for(relative: &str) -> String {
    let base_name = relative.rsplit('/').next().unwrap_or(relative);

    if RESERVED_PAGES.contains(&base_name) {
        return relative.to_string();
    }

    match relative.strip_suffix(HTML_EXTENSION) {
        Some(stripped) if !base_name.eq(HTML_EXTENSION) => stripped.to_string(),
        _ => relative.to_string(),
    }
}

/// Content type from the file extension, `None` when unknown.
pub fn content_type_for(relative: &str) -> Option<String> {
    let base_name = relative.rsplit('/').next().unwrap_or(relative);
    let (stem, ext) = base_name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    let ext = ext.to_ascii_lowercase();

    if let Some((_, content_type)) = WEB_CONTENT_TYPES.iter().find(|(e, _)| *e == ext) {
        return Some(content_type.to_string());
    }

    let guessed = mime_guess::from_ext(&ext).first()?;
    if guessed.type_() == mime_guess::mime::TEXT && guessed.get_param(mime_guess::mime::CHARSET).is_none() {
        Some(format!("{}; charset=utf-8", guessed.essence_str()))
    } else {
        Some(guessed.to_string())
    }
}

/// Join a prefix and a key with a single `/`. An empty prefix leaves the key alone.
pub fn join_prefix(prefix: &str, key: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}/{}", prefix, key)
    }
}

/// Listing prefix that scopes clearing to the prefix "directory" only.
pub fn listing_prefix(prefix: &str) -> Option<String> {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        None
    } else {
        Some(format!("{}/", prefix))
    }
}
