//! File lifecycle events emitted by the promotion engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

/// What happened to a stored file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FileOperation {
    /// A temp upload was moved to its permanent key.
    Promote,
    /// An obsolete reference was removed from storage.
    Delete,
}

impl Display for FileOperation {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            FileOperation::Promote => write!(f, "file.promoted"),
            FileOperation::Delete => write!(f, "file.deleted"),
        }
    }
}

impl FromStr for FileOperation {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file.promoted" => Ok(FileOperation::Promote),
            "file.deleted" => Ok(FileOperation::Delete),
            _ => Err(anyhow::anyhow!("Invalid file operation: {}", s)),
        }
    }
}

/// Ordered `key:value` attributes declared on an annotated field.
///
/// Declaration order is kept; a repeated key overrides the earlier value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldAttrs(Vec<(String, String)>);

impl FieldAttrs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.0.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FieldAttrs {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut attrs = FieldAttrs::new();
        for (k, v) in iter {
            attrs.insert(k, v);
        }
        attrs
    }
}

/// One event per affected reference. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEvent {
    pub id: Uuid,
    pub operation: FileOperation,
    /// Logical type of the record that owned the reference.
    pub meta_type: String,
    /// Field the reference was found in.
    pub field: String,
    /// Resulting key: the permanent key for a promote, the removed key for a delete.
    pub key: String,
    pub attrs: FieldAttrs,
    pub occurred_at: DateTime<Utc>,
}

impl FileEvent {
    pub fn new(
        operation: FileOperation,
        meta_type: impl Into<String>,
        field: impl Into<String>,
        key: impl Into<String>,
        attrs: FieldAttrs,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            operation,
            meta_type: meta_type.into(),
            field: field.into(),
            key: key.into(),
            attrs,
            occurred_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_attrs_keep_declaration_order() {
        let attrs: FieldAttrs = [("kind", "avatar"), ("acl", "public"), ("kind", "cover")]
            .into_iter()
            .collect();
        let pairs: Vec<_> = attrs.iter().collect();
        assert_eq!(pairs, vec![("kind", "cover"), ("acl", "public")]);
        assert_eq!(attrs.get("acl"), Some("public"));
        assert_eq!(attrs.get("missing"), None);
    }

    #[test]
    fn test_file_operation_display_and_parse() {
        assert_eq!(FileOperation::Promote.to_string(), "file.promoted");
        assert_eq!(
            "file.deleted".parse::<FileOperation>().unwrap(),
            FileOperation::Delete
        );
        assert!("file.moved".parse::<FileOperation>().is_err());
    }

    #[test]
    fn test_file_event_serializes_snake_case_operation() {
        let event = FileEvent::new(
            FileOperation::Promote,
            "profile",
            "avatar",
            "users/1/a.jpg",
            FieldAttrs::new(),
        );
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["operation"], "promote");
        assert_eq!(json["meta_type"], "profile");
        assert_eq!(json["key"], "users/1/a.jpg");
    }
}
