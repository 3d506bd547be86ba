//! Field annotations and the descriptors built from them.
//!
//! An annotation reads `<category>[=<key>:<value>[ <key>:<value>...]]`, for
//! example `uploaded_file=kind:avatar acl:public`. Several clauses may be joined
//! with `;`; only one category is honored per field, chosen by the order of
//! [`FieldCategory`] (uploaded files first, then rich text, then Markdown).

use attache_content::ContentFormat;
use attache_core::FieldAttrs;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// How a field holds storage references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldCategory {
    /// The whole value is a storage key.
    UploadedFile,
    /// An HTML body with embedded references.
    RichText,
    /// A Markdown body with embedded references.
    Markdown,
}

impl FieldCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldCategory::UploadedFile => "uploaded_file",
            FieldCategory::RichText => "richtext",
            FieldCategory::Markdown => "markdown",
        }
    }

    /// Dialect used to scan the field, `None` for whole-value keys.
    pub fn content_format(&self) -> Option<ContentFormat> {
        match self {
            FieldCategory::UploadedFile => None,
            FieldCategory::RichText => Some(ContentFormat::Html),
            FieldCategory::Markdown => Some(ContentFormat::Markdown),
        }
    }
}

impl fmt::Display for FieldCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "uploaded_file" => Ok(FieldCategory::UploadedFile),
            "richtext" => Ok(FieldCategory::RichText),
            "markdown" => Ok(FieldCategory::Markdown),
            other => Err(format!("unknown category '{}'", other)),
        }
    }
}

/// Metadata describing one annotated field. Read-only once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDescriptor {
    pub path: String,
    pub category: FieldCategory,
    pub is_array: bool,
    pub attrs: FieldAttrs,
}

/// Parsed form of a field annotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    pub category: FieldCategory,
    pub attrs: FieldAttrs,
    /// Categories declared alongside the honored one and ignored.
    pub discarded: Vec<FieldCategory>,
}

enum ClauseError {
    UnknownCategory(String),
    Malformed(String),
}

fn parse_clause(clause: &str) -> Result<(FieldCategory, FieldAttrs), ClauseError> {
    let (category, attrs) = match clause.split_once('=') {
        Some((category, attrs)) => (category, attrs),
        None => (clause, ""),
    };
    let category = category
        .parse::<FieldCategory>()
        .map_err(ClauseError::UnknownCategory)?;

    let mut parsed = FieldAttrs::new();
    for pair in attrs.split_whitespace() {
        let Some((key, value)) = pair.split_once(':') else {
            return Err(ClauseError::Malformed(format!(
                "attribute '{}' is not key:value",
                pair
            )));
        };
        if key.is_empty() {
            return Err(ClauseError::Malformed(format!(
                "attribute '{}' has an empty key",
                pair
            )));
        }
        parsed.insert(key, value);
    }
    Ok((category, parsed))
}

/// Parse an annotation, returning a reason when no category can be honored.
///
/// Clauses with an unknown category are ignored as long as another clause is
/// recognized; a malformed attribute list always rejects the annotation.
pub fn parse_annotation(raw: &str) -> Result<Annotation, String> {
    let mut recognized: Vec<(FieldCategory, FieldAttrs)> = Vec::new();
    let mut unknown = Vec::new();

    for clause in raw.split(';').map(str::trim).filter(|c| !c.is_empty()) {
        match parse_clause(clause) {
            Ok(parsed) => recognized.push(parsed),
            Err(ClauseError::UnknownCategory(reason)) => unknown.push(reason),
            Err(ClauseError::Malformed(reason)) => return Err(reason),
        }
    }

    if recognized.is_empty() {
        return Err(unknown
            .into_iter()
            .next()
            .unwrap_or_else(|| "empty annotation".to_string()));
    }

    recognized.sort_by_key(|(category, _)| *category);
    let mut clauses = recognized.into_iter();
    let Some((category, attrs)) = clauses.next() else {
        return Err("empty annotation".to_string());
    };
    let discarded = clauses
        .map(|(c, _)| c)
        .filter(|c| *c != category)
        .collect();

    Ok(Annotation {
        category,
        attrs,
        discarded,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_category() {
        let annotation = parse_annotation("richtext").unwrap();
        assert_eq!(annotation.category, FieldCategory::RichText);
        assert!(annotation.attrs.is_empty());
        assert!(annotation.discarded.is_empty());
    }

    #[test]
    fn test_parse_attributes_in_order() {
        let annotation = parse_annotation("uploaded_file=kind:avatar acl:public").unwrap();
        assert_eq!(annotation.category, FieldCategory::UploadedFile);
        let pairs: Vec<_> = annotation.attrs.iter().collect();
        assert_eq!(pairs, vec![("kind", "avatar"), ("acl", "public")]);
    }

    #[test]
    fn test_parse_value_may_contain_colon() {
        let annotation = parse_annotation("uploaded_file=bucket:s3:media").unwrap();
        assert_eq!(annotation.attrs.get("bucket"), Some("s3:media"));
    }

    #[test]
    fn test_parse_rejects_unknown_and_empty() {
        assert!(parse_annotation("").is_err());
        assert!(parse_annotation(" ; ").is_err());
        assert!(parse_annotation("json").is_err());
        assert!(parse_annotation("uploaded_file=kind").is_err());
        assert!(parse_annotation("uploaded_file=:x").is_err());
    }

    #[test]
    fn test_multiple_categories_use_fixed_precedence() {
        let annotation = parse_annotation("markdown=a:1; uploaded_file=b:2; richtext").unwrap();
        assert_eq!(annotation.category, FieldCategory::UploadedFile);
        assert_eq!(annotation.attrs.get("b"), Some("2"));
        assert_eq!(annotation.attrs.get("a"), None);
        assert_eq!(
            annotation.discarded,
            vec![FieldCategory::RichText, FieldCategory::Markdown]
        );
    }

    #[test]
    fn test_unknown_clause_ignored_next_to_known() {
        let annotation = parse_annotation("json; markdown").unwrap();
        assert_eq!(annotation.category, FieldCategory::Markdown);
    }

    #[test]
    fn test_category_formats() {
        assert_eq!(FieldCategory::UploadedFile.content_format(), None);
        assert_eq!(
            FieldCategory::RichText.content_format(),
            Some(ContentFormat::Html)
        );
        assert_eq!(FieldCategory::Markdown.to_string(), "markdown");
    }
}
