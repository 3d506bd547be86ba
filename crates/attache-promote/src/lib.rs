//! Attache Promote Library
//!
//! Keeps stored files in step with the records that reference them. Record
//! types describe their file-bearing fields once (see [`schema`]); the
//! [`Promoter`] then moves pending `temp/` uploads to permanent keys when a
//! record is saved, rewrites the record to point at them, and removes files a
//! record no longer references.
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use attache_promote::{Promoter, Record, RecordSchema, TracingEventPublisher};
//! # struct Post { cover: String }
//! # impl Record for Post {
//! #     fn schema() -> RecordSchema<Self> {
//! #         RecordSchema::<Self>::builder("post")
//! #             .field("cover", "uploaded_file", |p| &p.cover, |p| &mut p.cover)
//! #             .build()
//! #     }
//! # }
//! # async fn run(storage: Arc<dyn attache_storage::Storage>) -> Result<(), attache_promote::PromotionError> {
//! let promoter = Promoter::new(storage).with_publisher(Arc::new(TracingEventPublisher));
//! let mut post = Post { cover: "temp/posts/1/cover.jpg".to_string() };
//! let report = promoter.promote_new(&mut post).await?;
//! assert_eq!(post.cover, "posts/1/cover.jpg");
//! assert_eq!(report.promoted.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod descriptor;
pub mod error;
pub mod events;
pub mod reconciler;
pub mod schema;
pub mod shape;

pub use descriptor::{parse_annotation, FieldCategory, FieldDescriptor};
pub use error::PromotionError;
pub use events::{
    ChannelEventPublisher, CollectingEventPublisher, EventPublisher, TracingEventPublisher,
};
pub use reconciler::{CleanupFailure, PromotionReport, Promoter, Scenario};
pub use schema::{descriptors, FieldBinding, Record, RecordSchema, RecordSchemaBuilder};
pub use shape::{FieldShape, NullString, ShapeKind, TextValue};
