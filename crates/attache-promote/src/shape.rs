//! Adapters between record field types and the flat string values the
//! reconciler works on.

/// Whether a field type can hold references, and how many.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    /// Zero or one value.
    Single,
    /// An ordered list of values.
    Array,
    /// Cannot carry a reference; annotations on it are skipped.
    Unsupported,
}

/// A string that may be SQL-style null: `valid == false` means no value.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct NullString {
    pub value: String,
    pub valid: bool,
}

impl NullString {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            valid: true,
        }
    }

    pub fn null() -> Self {
        Self::default()
    }
}

/// A scalar that may hold one string value.
pub trait TextValue {
    fn text(&self) -> Option<&str>;
    fn from_text(value: String) -> Self;
}

impl TextValue for String {
    fn text(&self) -> Option<&str> {
        Some(self)
    }

    fn from_text(value: String) -> Self {
        value
    }
}

impl TextValue for Option<String> {
    fn text(&self) -> Option<&str> {
        self.as_deref()
    }

    fn from_text(value: String) -> Self {
        Some(value)
    }
}

impl TextValue for NullString {
    fn text(&self) -> Option<&str> {
        self.valid.then_some(self.value.as_str())
    }

    fn from_text(value: String) -> Self {
        NullString::new(value)
    }
}

/// A field type the schema builder can bind.
pub trait FieldShape: Send + Sync + 'static {
    fn kind() -> ShapeKind
    where
        Self: Sized;

    /// Present values in field order. Null entries are omitted; blank strings
    /// are kept for the caller to judge.
    fn read(&self) -> Vec<String>;

    /// Replace the field content. A single-valued field takes the first value
    /// and is left untouched when `values` is empty.
    fn write(&mut self, values: Vec<String>);
}

macro_rules! single_text_shape {
    ($($ty:ty),*) => {
        $(
            impl FieldShape for $ty {
                fn kind() -> ShapeKind {
                    ShapeKind::Single
                }

                fn read(&self) -> Vec<String> {
                    self.text().map(str::to_string).into_iter().collect()
                }

                fn write(&mut self, values: Vec<String>) {
                    if let Some(value) = values.into_iter().next() {
                        *self = <$ty as TextValue>::from_text(value);
                    }
                }
            }
        )*
    };
}

single_text_shape!(String, Option<String>, NullString);

impl<T> FieldShape for Vec<T>
where
    T: TextValue + Send + Sync + 'static,
{
    fn kind() -> ShapeKind {
        ShapeKind::Array
    }

    fn read(&self) -> Vec<String> {
        self.iter()
            .filter_map(|item| item.text().map(str::to_string))
            .collect()
    }

    fn write(&mut self, values: Vec<String>) {
        *self = values.into_iter().map(T::from_text).collect();
    }
}

macro_rules! unsupported_shape {
    ($($ty:ty),*) => {
        $(
            impl FieldShape for $ty {
                fn kind() -> ShapeKind {
                    ShapeKind::Unsupported
                }

                fn read(&self) -> Vec<String> {
                    Vec::new()
                }

                fn write(&mut self, _values: Vec<String>) {}
            }
        )*
    };
}

unsupported_shape!(bool, i16, i32, i64, u16, u32, u64, usize, f32, f64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_shapes_read() {
        assert_eq!("a.jpg".to_string().read(), vec!["a.jpg"]);
        assert_eq!(Some("a.jpg".to_string()).read(), vec!["a.jpg"]);
        assert!(None::<String>.read().is_empty());
        assert_eq!(NullString::new("a.jpg").read(), vec!["a.jpg"]);
        assert!(NullString::null().read().is_empty());
        // Blank strings are reported; normalization happens later.
        assert_eq!(String::new().read(), vec![""]);
    }

    #[test]
    fn test_single_shape_write_keeps_value_on_empty() {
        let mut value = Some("temp/a.jpg".to_string());
        value.write(Vec::new());
        assert_eq!(value.as_deref(), Some("temp/a.jpg"));
        value.write(vec!["a.jpg".to_string()]);
        assert_eq!(value.as_deref(), Some("a.jpg"));

        let mut null = NullString::null();
        null.write(vec!["b.jpg".to_string()]);
        assert_eq!(null, NullString::new("b.jpg"));
    }

    #[test]
    fn test_array_shape_skips_nulls_and_rewrites() {
        let mut docs = vec![Some("a.pdf".to_string()), None, Some(String::new())];
        assert_eq!(docs.read(), vec!["a.pdf", ""]);
        docs.write(vec!["x.pdf".to_string()]);
        assert_eq!(docs, vec![Some("x.pdf".to_string())]);
    }

    #[test]
    fn test_shape_kinds() {
        assert_eq!(<String as FieldShape>::kind(), ShapeKind::Single);
        assert_eq!(<Vec<NullString> as FieldShape>::kind(), ShapeKind::Array);
        assert_eq!(<i64 as FieldShape>::kind(), ShapeKind::Unsupported);
        assert_eq!(<bool as FieldShape>::kind(), ShapeKind::Unsupported);
    }
}
