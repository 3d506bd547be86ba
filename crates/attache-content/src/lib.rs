//! Attache Content Library
//!
//! Finds and rewrites storage references embedded in rich-text (HTML) and
//! Markdown bodies. Only relative URLs are considered references; absolute
//! URLs (`http://`, `https://`, any other scheme, protocol-relative `//host`)
//! are never extracted or rewritten.
//!
//! Malformed input never fails: anything that does not match degrades to
//! "no reference found".

pub mod html;
pub mod markdown;
pub mod url;

use std::collections::{BTreeSet, HashMap};

pub use url::{is_absolute_url, is_reference_candidate};

/// Text dialect of a body field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentFormat {
    Html,
    Markdown,
}

impl ContentFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentFormat::Html => "html",
            ContentFormat::Markdown => "markdown",
        }
    }
}

impl std::str::FromStr for ContentFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "html" | "richtext" => Ok(ContentFormat::Html),
            "markdown" | "md" => Ok(ContentFormat::Markdown),
            other => Err(format!("Unknown content format: {}", other)),
        }
    }
}

/// Distinct relative URLs referenced by `body`.
pub fn extract_urls(format: ContentFormat, body: &str) -> BTreeSet<String> {
    match format {
        ContentFormat::Html => html::extract_urls(body),
        ContentFormat::Markdown => markdown::extract_urls(body),
    }
}

/// Rewrite every URL in `body` that is a key of `mapping`, preserving the
/// surrounding markup byte for byte.
pub fn rewrite_urls(format: ContentFormat, body: &str, mapping: &HashMap<String, String>) -> String {
    match format {
        ContentFormat::Html => html::rewrite_urls(body, mapping),
        ContentFormat::Markdown => markdown::rewrite_urls(body, mapping),
    }
}
