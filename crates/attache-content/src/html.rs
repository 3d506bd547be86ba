//! HTML reference scanning.
//!
//! Opening tags of media and link elements are matched first. Their attribute
//! list is then walked one attribute at a time, so a quoted value is consumed
//! whole and `src=` appearing inside another attribute's value is never read
//! as an attribute. Only the attributes named exactly `src`, `href` and `data`
//! count; `data-src` or `:src` do not.
//!
//! The `regex` crate has no backreferences, so each quote character gets its
//! own alternative: a value opened with `"` must close with `"`, and
//! `src="a.jpg'` never matches.

use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::url::is_reference_candidate;

/// Tag name, then the attribute list up to the closing `>`. Quoted values may
/// contain `>` but not `<`, so an unclosed quote cannot run into the next tag;
/// a stray quote is taken as a plain character.
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)<(?:img|a|video|audio|source|embed|object)\b((?:[^>"']|"[^"<]*"|'[^'<]*'|["'])*)"#,
    )
    .expect("HTML tag pattern is valid")
});

/// One attribute: leading whitespace, name, then optionally `=` with its
/// surrounding whitespace and a double-quoted, single-quoted or bare value.
static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(^|\s+)([^\s"'=<>/]+)(?:(\s*=\s*)(?:"([^"]*)"|'([^']*)'|([^\s"'>]+)))?"#,
    )
    .expect("HTML attribute pattern is valid")
});

const LEAD: usize = 1;
const NAME: usize = 2;
const EQUALS: usize = 3;

fn is_reference_attr(name: &str) -> bool {
    ["src", "href", "data"]
        .iter()
        .any(|known| name.eq_ignore_ascii_case(known))
}

/// Quote character and value of a quoted reference attribute.
fn reference_value<'h>(caps: &Captures<'h>) -> Option<(char, &'h str)> {
    if !is_reference_attr(&caps[NAME]) {
        return None;
    }
    if let Some(m) = caps.get(4) {
        return Some(('"', m.as_str()));
    }
    caps.get(5).map(|m| ('\'', m.as_str()))
}

/// Distinct relative URLs referenced from `src`/`href`/`data` attributes of
/// `img`, `a`, `video`, `audio`, `source`, `embed` and `object` tags.
pub fn extract_urls(body: &str) -> BTreeSet<String> {
    let mut urls = BTreeSet::new();
    if body.is_empty() {
        return urls;
    }

    for tag in TAG_RE.captures_iter(body) {
        let Some(attrs) = tag.get(1) else {
            continue;
        };
        for attr in ATTR_RE.captures_iter(attrs.as_str()) {
            if let Some((_, url)) = reference_value(&attr) {
                if is_reference_candidate(url) {
                    urls.insert(url.to_string());
                }
            }
        }
    }

    urls
}

fn rewrite_attrs(attrs: &str, mapping: &HashMap<String, String>, rewritten: &mut usize) -> String {
    ATTR_RE
        .replace_all(attrs, |caps: &Captures<'_>| {
            let replacement = reference_value(caps)
                .filter(|(_, url)| is_reference_candidate(url))
                .and_then(|(quote, url)| mapping.get(url).map(|new_url| (quote, new_url)));
            match replacement {
                Some((quote, new_url)) => {
                    *rewritten += 1;
                    format!(
                        "{}{}{}{}{}{}",
                        &caps[LEAD], &caps[NAME], &caps[EQUALS], quote, new_url, quote
                    )
                }
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Replace attribute values found in `mapping`, keeping the attribute name,
/// spacing and quote character of the original. Only the tags and attributes
/// [`extract_urls`] reads are touched.
pub fn rewrite_urls(body: &str, mapping: &HashMap<String, String>) -> String {
    if body.is_empty() || mapping.is_empty() {
        return body.to_string();
    }

    let mut rewritten = 0usize;
    let out = TAG_RE.replace_all(body, |tag: &Captures<'_>| {
        let whole = &tag[0];
        let Some(attrs) = tag.get(1) else {
            return whole.to_string();
        };
        let head_len = attrs.start() - tag.get(0).map_or(attrs.start(), |m| m.start());
        let mut out = whole[..head_len].to_string();
        out.push_str(&rewrite_attrs(attrs.as_str(), mapping, &mut rewritten));
        out
    });

    tracing::debug!(rewritten, "Rewrote HTML references");
    out.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_extract_matching_quotes() {
        assert_eq!(extract_urls(r#"<img src="a.jpg">"#), set(&["a.jpg"]));
        assert_eq!(extract_urls("<img src='a.jpg'>"), set(&["a.jpg"]));
    }

    #[test]
    fn test_extract_rejects_mismatched_quotes() {
        assert!(extract_urls(r#"<img src="a.jpg'>"#).is_empty());
        assert!(extract_urls(r#"<img src='a.jpg">"#).is_empty());
    }

    #[test]
    fn test_extract_all_supported_tags_case_insensitive() {
        let body = r#"
            <IMG SRC="img.png">
            <a class="x" href="docs/file.pdf">file</a>
            <video src="v.mp4"></video>
            <audio src='a.mp3'></audio>
            <source src="s.webm">
            <embed src="e.swf">
            <object data="o.svg"></object>
        "#;
        assert_eq!(
            extract_urls(body),
            set(&[
                "img.png",
                "docs/file.pdf",
                "v.mp4",
                "a.mp3",
                "s.webm",
                "e.swf",
                "o.svg"
            ])
        );
    }

    #[test]
    fn test_unclosed_quote_does_not_swallow_next_tag() {
        let body = r#"<img src="a.jpg'><img src="b.jpg">"#;
        assert_eq!(extract_urls(body), set(&["b.jpg"]));
    }

    #[test]
    fn test_extract_ignores_other_tags() {
        assert!(extract_urls(r#"<iframe src="x.html"></iframe>"#).is_empty());
        assert!(extract_urls(r#"<abbr href="x.html">"#).is_empty());
    }

    #[test]
    fn test_extract_skips_absolute_and_blank() {
        let body = r##"
            <img src="https://cdn.example.com/a.jpg">
            <img src="HTTP://cdn.example.com/b.jpg">
            <img src="">
            <img src="   ">
            <a href="#top">top</a>
            <img src="temp/c.jpg">
        "##;
        assert_eq!(extract_urls(body), set(&["temp/c.jpg"]));
    }

    #[test]
    fn test_extract_only_exact_attribute_names() {
        let body = r#"<img data-src="temp/lazy.jpg" :src="temp/bound.jpg" src="p/ph.png">"#;
        assert_eq!(extract_urls(body), set(&["p/ph.png"]));

        let body = r#"<object data-type="x" DATA='o.svg'></object>"#;
        assert_eq!(extract_urls(body), set(&["o.svg"]));
    }

    #[test]
    fn test_extract_ignores_attribute_text_inside_values() {
        let body = r#"<img alt="see src='x.jpg'" src="p/ph.png">"#;
        assert_eq!(extract_urls(body), set(&["p/ph.png"]));

        let body = r#"<a title='a > b href="y.pdf"' href="docs/z.pdf">z</a>"#;
        assert_eq!(extract_urls(body), set(&["docs/z.pdf"]));
    }

    #[test]
    fn test_extract_after_bare_and_valueless_attributes() {
        let body = r#"<video controls width=320 src="v.mp4"></video>"#;
        assert_eq!(extract_urls(body), set(&["v.mp4"]));
    }

    #[test]
    fn test_extract_deduplicates() {
        let body = r#"<img src="a.jpg"><a href="a.jpg">again</a>"#;
        assert_eq!(extract_urls(body), set(&["a.jpg"]));
    }

    #[test]
    fn test_extract_empty_and_garbage() {
        assert!(extract_urls("").is_empty());
        assert!(extract_urls("no markup here").is_empty());
        assert!(extract_urls("<img src=").is_empty());
        assert!(extract_urls("<<<>>>\"'").is_empty());
    }

    #[test]
    fn test_rewrite_preserves_attribute_and_quote() {
        let body = r#"<p><img src="temp/a.jpg" alt="x"> <a href='temp/d.pdf'>d</a></p>"#;
        let out = rewrite_urls(
            body,
            &map(&[("temp/a.jpg", "a.jpg"), ("temp/d.pdf", "d.pdf")]),
        );
        assert_eq!(
            out,
            r#"<p><img src="a.jpg" alt="x"> <a href='d.pdf'>d</a></p>"#
        );
    }

    #[test]
    fn test_rewrite_keeps_spacing_around_equals() {
        let body = r#"<img SRC = "temp/a.jpg">"#;
        let out = rewrite_urls(body, &map(&[("temp/a.jpg", "a.jpg")]));
        assert_eq!(out, r#"<img SRC = "a.jpg">"#);
    }

    #[test]
    fn test_rewrite_leaves_unmapped_and_absolute() {
        let body = r#"<img src="keep.jpg"><img src="https://x.io/a.jpg">"#;
        let out = rewrite_urls(
            body,
            &map(&[("https://x.io/a.jpg", "a.jpg"), ("other.jpg", "o.jpg")]),
        );
        assert_eq!(out, body);
    }

    #[test]
    fn test_rewrite_mismatched_quotes_untouched() {
        let body = r#"<img src="temp/a.jpg'>"#;
        let out = rewrite_urls(body, &map(&[("temp/a.jpg", "a.jpg")]));
        assert_eq!(out, body);
    }

    #[test]
    fn test_rewrite_skips_lookalike_attributes() {
        let body = r#"<img alt="src='temp/a.jpg'" data-src="temp/a.jpg" src="temp/a.jpg">"#;
        let out = rewrite_urls(body, &map(&[("temp/a.jpg", "a.jpg")]));
        assert_eq!(
            out,
            r#"<img alt="src='temp/a.jpg'" data-src="temp/a.jpg" src="a.jpg">"#
        );
    }

    #[test]
    fn test_rewrite_only_inside_supported_tags() {
        let body = r#"<iframe src="temp/a.jpg"></iframe><img src="temp/a.jpg">"#;
        let out = rewrite_urls(body, &map(&[("temp/a.jpg", "a.jpg")]));
        assert_eq!(out, r#"<iframe src="temp/a.jpg"></iframe><img src="a.jpg">"#);
    }

    #[test]
    fn test_rewrite_noop_shortcuts() {
        assert_eq!(rewrite_urls("", &map(&[("a", "b")])), "");
        let body = r#"<img src="a">"#;
        assert_eq!(rewrite_urls(body, &HashMap::new()), body);
    }
}
