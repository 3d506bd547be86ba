//! Record schemas: which fields of a type carry storage references.
//!
//! A record type lists its fields once through [`RecordSchema::builder`],
//! pairing each field name with an annotation and plain `fn` accessors:
//!
//! ```
//! use attache_promote::{Record, RecordSchema};
//!
//! struct Profile {
//!     avatar: Option<String>,
//!     bio: String,
//! }
//!
//! impl Record for Profile {
//!     fn schema() -> RecordSchema<Self> {
//!         RecordSchema::<Self>::builder("profile")
//!             .field("avatar", "uploaded_file=kind:avatar", |p| &p.avatar, |p| &mut p.avatar)
//!             .field("bio", "richtext", |p| &p.bio, |p| &mut p.bio)
//!             .build()
//!     }
//! }
//!
//! let schema = attache_promote::descriptors::<Profile>();
//! assert_eq!(schema.descriptors().count(), 2);
//! ```
//!
//! Fields whose annotation is not recognized, or whose type cannot hold the
//! declared category, are left out of the schema. Schemas are built once per
//! type and cached for the life of the process.

use crate::descriptor::{parse_annotation, FieldCategory, FieldDescriptor};
use crate::error::PromotionError;
use crate::shape::{FieldShape, ShapeKind};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, LazyLock, RwLock};

/// A type whose fields may reference stored files.
pub trait Record: Send + Sync + 'static {
    fn schema() -> RecordSchema<Self>
    where
        Self: Sized;
}

type Reader<R> = Box<dyn Fn(&R) -> Vec<String> + Send + Sync>;
type Writer<R> = Box<dyn Fn(&mut R, Vec<String>) + Send + Sync>;

/// One annotated field together with its accessors.
pub struct FieldBinding<R> {
    descriptor: FieldDescriptor,
    read: Reader<R>,
    write: Writer<R>,
}

impl<R> FieldBinding<R> {
    pub fn descriptor(&self) -> &FieldDescriptor {
        &self.descriptor
    }

    pub fn read(&self, record: &R) -> Vec<String> {
        (self.read)(record)
    }

    pub fn write(&self, record: &mut R, values: Vec<String>) {
        (self.write)(record, values)
    }
}

/// Ordered field bindings of one record type.
pub struct RecordSchema<R> {
    meta_type: String,
    fields: Vec<FieldBinding<R>>,
}

impl<R: 'static> RecordSchema<R> {
    pub fn builder(meta_type: impl Into<String>) -> RecordSchemaBuilder<R> {
        RecordSchemaBuilder {
            meta_type: meta_type.into(),
            fields: Vec::new(),
        }
    }

    /// A schema without reference-bearing fields.
    pub fn empty(meta_type: impl Into<String>) -> Self {
        Self {
            meta_type: meta_type.into(),
            fields: Vec::new(),
        }
    }

    pub fn meta_type(&self) -> &str {
        &self.meta_type
    }

    pub fn fields(&self) -> &[FieldBinding<R>] {
        &self.fields
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.fields.iter().map(|f| &f.descriptor)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

pub struct RecordSchemaBuilder<R> {
    meta_type: String,
    fields: Vec<FieldBinding<R>>,
}

impl<R: 'static> RecordSchemaBuilder<R> {
    /// Bind a field, skipping it when its annotation or shape is not usable.
    pub fn field<T: FieldShape>(
        mut self,
        name: &str,
        annotation: &str,
        get: fn(&R) -> &T,
        get_mut: fn(&mut R) -> &mut T,
    ) -> Self {
        match bind(name, annotation, get, get_mut) {
            Ok(binding) => self.fields.push(binding),
            Err(reason) => {
                tracing::debug!(
                    meta_type = %self.meta_type,
                    field = %name,
                    reason = %reason,
                    "Skipping field"
                );
            }
        }
        self
    }

    /// Like [`field`](Self::field) but reports an unusable annotation or shape
    /// as [`PromotionError::InvalidAnnotation`].
    pub fn try_field<T: FieldShape>(
        mut self,
        name: &str,
        annotation: &str,
        get: fn(&R) -> &T,
        get_mut: fn(&mut R) -> &mut T,
    ) -> Result<Self, PromotionError> {
        let binding = bind(name, annotation, get, get_mut).map_err(|reason| {
            PromotionError::InvalidAnnotation {
                field: name.to_string(),
                reason,
            }
        })?;
        self.fields.push(binding);
        Ok(self)
    }

    pub fn build(self) -> RecordSchema<R> {
        RecordSchema {
            meta_type: self.meta_type,
            fields: self.fields,
        }
    }
}

fn bind<R: 'static, T: FieldShape>(
    name: &str,
    annotation: &str,
    get: fn(&R) -> &T,
    get_mut: fn(&mut R) -> &mut T,
) -> Result<FieldBinding<R>, String> {
    let parsed = parse_annotation(annotation)?;
    if !parsed.discarded.is_empty() {
        tracing::warn!(
            field = %name,
            honored = %parsed.category,
            discarded = ?parsed.discarded,
            "Field declares several categories; only one is honored"
        );
    }

    let is_array = match (T::kind(), parsed.category) {
        (ShapeKind::Unsupported, category) => {
            return Err(format!("field type cannot hold a {} reference", category));
        }
        (ShapeKind::Array, FieldCategory::RichText | FieldCategory::Markdown) => {
            return Err(format!("{} fields cannot be arrays", parsed.category));
        }
        (ShapeKind::Array, FieldCategory::UploadedFile) => true,
        (ShapeKind::Single, _) => false,
    };

    Ok(FieldBinding {
        descriptor: FieldDescriptor {
            path: name.to_string(),
            category: parsed.category,
            is_array,
            attrs: parsed.attrs,
        },
        read: Box::new(move |record: &R| get(record).read()),
        write: Box::new(move |record: &mut R, values: Vec<String>| {
            get_mut(record).write(values)
        }),
    })
}

type SchemaCache = RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>;

static SCHEMAS: LazyLock<SchemaCache> = LazyLock::new(|| RwLock::new(HashMap::new()));

/// The cached schema of `R`, built on first use.
pub fn descriptors<R: Record>() -> Arc<RecordSchema<R>> {
    let id = TypeId::of::<R>();

    let cached = SCHEMAS
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .get(&id)
        .cloned();
    if let Some(schema) = cached.and_then(|s| s.downcast::<RecordSchema<R>>().ok()) {
        return schema;
    }

    // Built outside the lock; a concurrent builder of the same type loses the race.
    let built = Arc::new(R::schema());
    let mut cache = SCHEMAS
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    let entry = cache
        .entry(id)
        .or_insert_with(|| built.clone() as Arc<dyn Any + Send + Sync>)
        .clone();
    entry.downcast::<RecordSchema<R>>().unwrap_or(built)
}
