//! Markdown reference scanning.
//!
//! Inline images `![alt](url "title")` and links `[text](url "title")` are
//! recognized. The destination may be wrapped in angle brackets and may be
//! followed by a single- or double-quoted title, which is kept intact on
//! rewrite. Reference-style links and autolinks are not inspected.

use std::collections::{BTreeSet, HashMap};
use std::ops::Range;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::url::is_reference_candidate;

// The parenthesised part may hold one level of balanced parentheses, as in
// `img(1).png`; an unbalanced `(` leaves the construct unmatched.
static IMAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"!\[([^\]]*)\]\(((?:[^()]|\([^()]*\))*)\)")
        .expect("Markdown image pattern is valid")
});

static LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[([^\[\]]*)\]\(((?:[^()]|\([^()]*\))*)\)")
        .expect("Markdown link pattern is valid")
});

/// Byte range of the URL inside the parenthesised part of an image or link.
///
/// Returns `None` when the destination is empty or is followed by anything
/// other than a quoted title.
fn destination_span(inner: &str) -> Option<Range<usize>> {
    let start = inner.len() - inner.trim_start().len();
    let rest = &inner[start..];

    let (span, tail) = if let Some(bracketed) = rest.strip_prefix('<') {
        let close = bracketed.find('>')?;
        let url_start = start + 1;
        (url_start..url_start + close, &bracketed[close + 1..])
    } else {
        let len = rest.find(char::is_whitespace).unwrap_or(rest.len());
        (start..start + len, &rest[len..])
    };

    if span.is_empty() || !is_title(tail.trim()) {
        return None;
    }
    Some(span)
}

fn is_title(tail: &str) -> bool {
    if tail.is_empty() {
        return true;
    }
    tail.len() >= 2
        && ((tail.starts_with('"') && tail.ends_with('"'))
            || (tail.starts_with('\'') && tail.ends_with('\'')))
}

/// The link pattern also matches the bracketed part of an image.
fn is_image_tail(haystack: &str, caps: &Captures<'_>) -> bool {
    caps.get(0)
        .map(|m| haystack[..m.start()].ends_with('!'))
        .unwrap_or(false)
}

fn collect(inner: &str, urls: &mut BTreeSet<String>) {
    if let Some(span) = destination_span(inner) {
        let url = &inner[span];
        if is_reference_candidate(url) {
            urls.insert(url.to_string());
        }
    }
}

/// Distinct relative URLs used as image sources or link targets.
pub fn extract_urls(body: &str) -> BTreeSet<String> {
    let mut urls = BTreeSet::new();
    if body.is_empty() {
        return urls;
    }

    for caps in IMAGE_RE.captures_iter(body) {
        collect(&caps[2], &mut urls);
    }
    for caps in LINK_RE.captures_iter(body) {
        if !is_image_tail(body, &caps) {
            collect(&caps[2], &mut urls);
        }
    }

    urls
}

/// Rebuild one match with its destination replaced, or `None` to keep it.
fn replace_destination(
    caps: &Captures<'_>,
    opener: &str,
    mapping: &HashMap<String, String>,
) -> Option<String> {
    let inner = &caps[2];
    let span = destination_span(inner)?;
    let url = &inner[span.clone()];
    if !is_reference_candidate(url) {
        return None;
    }
    let new_url = mapping.get(url)?;
    Some(format!(
        "{}{}]({}{}{})",
        opener,
        &caps[1],
        &inner[..span.start],
        new_url,
        &inner[span.end..]
    ))
}

/// Rewrite image sources, then link targets, found in `mapping`.
///
/// Alt text, link text and titles are preserved. Images go first so the link
/// pass never consumes an image's leading `!`.
pub fn rewrite_urls(body: &str, mapping: &HashMap<String, String>) -> String {
    if body.is_empty() || mapping.is_empty() {
        return body.to_string();
    }

    let images = IMAGE_RE.replace_all(body, |caps: &Captures<'_>| {
        replace_destination(caps, "![", mapping).unwrap_or_else(|| caps[0].to_string())
    });
    let images = images.into_owned();

    let links = LINK_RE.replace_all(&images, |caps: &Captures<'_>| {
        if is_image_tail(&images, caps) {
            return caps[0].to_string();
        }
        replace_destination(caps, "[", mapping).unwrap_or_else(|| caps[0].to_string())
    });

    links.into_owned()
}
