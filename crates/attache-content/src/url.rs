//! URL classification shared by the HTML and Markdown scanners.

/// Whether `url` points outside the storage namespace.
///
/// True for any URL carrying an RFC 3986 scheme (`http:`, `https:`, `data:`,
/// `mailto:`...) and for protocol-relative `//host/path` URLs.
pub fn is_absolute_url(url: &str) -> bool {
    let url = url.trim();
    if url.starts_with("//") {
        return true;
    }

    let Some(colon) = url.find(':') else {
        return false;
    };
    let scheme = &url[..colon];
    let mut chars = scheme.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => chars
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')),
        _ => false,
    }
}

/// Whether `url` can be a storage reference: not blank, not absolute and not a
/// same-document fragment.
pub fn is_reference_candidate(url: &str) -> bool {
    let trimmed = url.trim();
    !trimmed.is_empty() && !trimmed.starts_with('#') && !is_absolute_url(trimmed)
}
