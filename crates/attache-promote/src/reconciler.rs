//! Promotion reconciler.
//!
//! Given the new and the previous version of a record, the [`Promoter`]
//! promotes every temp reference of the new version, rewrites the fields that
//! held them, and deletes references the previous version had and the new one
//! dropped.
//!
//! The two halves fail differently. A promotion failure stops the call and is
//! returned; fields rewritten before it stay rewritten and promotions already
//! done are not undone. Cleanup runs only after every field was promoted, and
//! a failed delete is reported in the [`PromotionReport`] without failing the
//! call.

use crate::descriptor::FieldDescriptor;
use crate::error::PromotionError;
use crate::events::EventPublisher;
use crate::schema::{descriptors, FieldBinding, Record, RecordSchema};
use attache_content::{extract_urls, rewrite_urls};
use attache_core::{FileEvent, FileOperation};
use attache_storage::{keys, Storage};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

/// Which versions of the record were supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    /// Only a new version: promote, nothing to clean up.
    Create,
    /// Both versions: promote the new one, delete what it dropped.
    Update,
    /// Only the old version: delete everything it referenced.
    Delete,
    /// Neither version.
    Noop,
}

impl Scenario {
    fn of(has_new: bool, has_old: bool) -> Self {
        match (has_new, has_old) {
            (true, false) => Scenario::Create,
            (true, true) => Scenario::Update,
            (false, true) => Scenario::Delete,
            (false, false) => Scenario::Noop,
        }
    }
}

/// An obsolete reference that could not be deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupFailure {
    pub field: String,
    pub key: String,
    pub error: String,
}

/// Outcome of one reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromotionReport {
    pub scenario: Scenario,
    /// `(temp key, permanent key)` in promotion order.
    pub promoted: Vec<(String, String)>,
    pub deleted: Vec<String>,
    pub cleanup_failures: Vec<CleanupFailure>,
}

impl PromotionReport {
    fn new(scenario: Scenario) -> Self {
        Self {
            scenario,
            promoted: Vec::new(),
            deleted: Vec::new(),
            cleanup_failures: Vec::new(),
        }
    }

    /// True when every obsolete reference was deleted.
    pub fn is_clean(&self) -> bool {
        self.cleanup_failures.is_empty()
    }

    /// Promoted keys as an old-to-new map.
    pub fn key_mapping(&self) -> HashMap<String, String> {
        self.promoted.iter().cloned().collect()
    }
}

/// Non-blank candidate values of a field.
fn candidates(values: &[String]) -> Vec<String> {
    values
        .iter()
        .filter(|v| !v.trim().is_empty())
        .cloned()
        .collect()
}

/// References held by a field: the values themselves for uploaded files, the
/// URLs embedded in the body for text fields.
fn references<R>(binding: &FieldBinding<R>, record: &R) -> Vec<String> {
    let values = candidates(&binding.read(record));
    match binding.descriptor().category.content_format() {
        None => values,
        Some(format) => values
            .iter()
            .flat_map(|body| extract_urls(format, body))
            .collect(),
    }
}

/// Reconciles records against a storage backend.
#[derive(Clone)]
pub struct Promoter {
    storage: Arc<dyn Storage>,
    publisher: Option<Arc<dyn EventPublisher>>,
}

impl Promoter {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            publisher: None,
        }
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Reconcile `new` against `old`.
    ///
    /// `new` is rewritten in place. Returns the first promotion failure, if
    /// any, after which no further field is processed and nothing is deleted.
    #[tracing::instrument(skip_all, fields(record = std::any::type_name::<R>()))]
    pub async fn promote<R: Record>(
        &self,
        mut new: Option<&mut R>,
        old: Option<&R>,
    ) -> Result<PromotionReport, PromotionError> {
        let scenario = Scenario::of(new.is_some(), old.is_some());
        let mut report = PromotionReport::new(scenario);
        if scenario == Scenario::Noop {
            tracing::debug!("No record versions supplied");
            return Ok(report);
        }

        let schema = descriptors::<R>();
        if schema.is_empty() {
            tracing::debug!(meta_type = %schema.meta_type(), "Record has no file fields");
            return Ok(report);
        }

        let start = Instant::now();
        let mut mapping: HashMap<String, String> = HashMap::new();
        // References that must survive cleanup: everything the new version
        // points to after rewriting, plus the temp keys that were moved.
        let mut keep: HashSet<String> = HashSet::new();

        if let Some(record) = new.as_deref_mut() {
            for binding in schema.fields() {
                self.promote_field(schema.meta_type(), binding, record, &mut mapping, &mut report)
                    .await?;
                keep.extend(references(binding, record));
            }
        }
        keep.extend(mapping.keys().cloned());

        if let Some(old) = old {
            self.cleanup(&schema, old, &keep, &mut report).await;
        }

        tracing::info!(
            meta_type = %schema.meta_type(),
            scenario = ?scenario,
            promoted = report.promoted.len(),
            deleted = report.deleted.len(),
            cleanup_failures = report.cleanup_failures.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Promotion completed"
        );

        Ok(report)
    }

    /// Promote the references of a freshly created record.
    pub async fn promote_new<R: Record>(
        &self,
        record: &mut R,
    ) -> Result<PromotionReport, PromotionError> {
        self.promote(Some(record), None).await
    }

    /// Promote the references of an updated record and drop the ones it lost.
    pub async fn promote_update<R: Record>(
        &self,
        new: &mut R,
        old: &R,
    ) -> Result<PromotionReport, PromotionError> {
        self.promote(Some(new), Some(old)).await
    }

    /// Delete every reference held by a removed record.
    pub async fn cleanup_deleted<R: Record>(
        &self,
        old: &R,
    ) -> Result<PromotionReport, PromotionError> {
        self.promote::<R>(None, Some(old)).await
    }

    async fn promote_field<R>(
        &self,
        meta_type: &str,
        binding: &FieldBinding<R>,
        record: &mut R,
        mapping: &mut HashMap<String, String>,
        report: &mut PromotionReport,
    ) -> Result<(), PromotionError> {
        let descriptor = binding.descriptor();
        let raw = binding.read(record);
        let values = candidates(&raw);
        if values.is_empty() {
            return Ok(());
        }

        let format = descriptor.category.content_format();
        let refs: Vec<String> = match format {
            None => values.clone(),
            Some(format) => values
                .iter()
                .flat_map(|body| extract_urls(format, body))
                .collect(),
        };

        let temp_prefix = self.storage.temp_prefix();
        for key in refs.iter().filter(|k| keys::is_temp_key(k, temp_prefix)) {
            // Already moved by an earlier field or an earlier array entry.
            if mapping.contains_key(key) {
                continue;
            }

            let start = Instant::now();
            let new_key = self.storage.promote(key).await.map_err(|source| {
                tracing::error!(
                    error = %source,
                    meta_type = %meta_type,
                    field = %descriptor.path,
                    key = %key,
                    "Failed to promote file"
                );
                PromotionError::Promote {
                    field: descriptor.path.clone(),
                    key: key.clone(),
                    source,
                }
            })?;

            tracing::info!(
                meta_type = %meta_type,
                field = %descriptor.path,
                key = %key,
                new_key = %new_key,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Promoted file"
            );

            mapping.insert(key.clone(), new_key.clone());
            report.promoted.push((key.clone(), new_key.clone()));
            self.emit(FileOperation::Promote, meta_type, descriptor, &new_key);
        }

        // Fields without a promoted reference are left exactly as they were.
        let rewritten: Vec<String> = match format {
            None => {
                if !values.iter().any(|v| mapping.contains_key(v)) {
                    return Ok(());
                }
                values
                    .iter()
                    .map(|v| mapping.get(v).cloned().unwrap_or_else(|| v.clone()))
                    .collect()
            }
            Some(format) => values
                .iter()
                .map(|body| rewrite_urls(format, body, mapping))
                .collect(),
        };
        if rewritten != raw {
            binding.write(record, rewritten);
        }

        Ok(())
    }

    async fn cleanup<R>(
        &self,
        schema: &RecordSchema<R>,
        old: &R,
        keep: &HashSet<String>,
        report: &mut PromotionReport,
    ) where
        R: 'static,
    {
        let mut seen: HashSet<String> = HashSet::new();
        for binding in schema.fields() {
            let obsolete: Vec<String> = references(binding, old)
                .into_iter()
                .filter(|k| !keep.contains(k) && seen.insert(k.clone()))
                .collect();
            if obsolete.is_empty() {
                continue;
            }
            self.delete_obsolete(schema.meta_type(), binding.descriptor(), obsolete, report)
                .await;
        }
    }

    async fn delete_obsolete(
        &self,
        meta_type: &str,
        descriptor: &FieldDescriptor,
        obsolete: Vec<String>,
        report: &mut PromotionReport,
    ) {
        if obsolete.len() > 1 {
            match self.storage.delete_batch(&obsolete).await {
                Ok(()) => {
                    for key in obsolete {
                        self.record_delete(meta_type, descriptor, key, report);
                    }
                    return;
                }
                Err(e) => {
                    // Retry one by one so each failure is attributed to its key.
                    tracing::warn!(
                        error = %e,
                        meta_type = %meta_type,
                        field = %descriptor.path,
                        count = obsolete.len(),
                        "Batch delete failed, retrying keys individually"
                    );
                }
            }
        }

        for key in obsolete {
            match self.storage.delete(&key).await {
                Ok(()) => self.record_delete(meta_type, descriptor, key, report),
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        meta_type = %meta_type,
                        field = %descriptor.path,
                        key = %key,
                        "Failed to delete obsolete file"
                    );
                    report.cleanup_failures.push(CleanupFailure {
                        field: descriptor.path.clone(),
                        key,
                        error: e.to_string(),
                    });
                }
            }
        }
    }

    fn record_delete(
        &self,
        meta_type: &str,
        descriptor: &FieldDescriptor,
        key: String,
        report: &mut PromotionReport,
    ) {
        tracing::info!(
            meta_type = %meta_type,
            field = %descriptor.path,
            key = %key,
            "Deleted obsolete file"
        );
        self.emit(FileOperation::Delete, meta_type, descriptor, &key);
        report.deleted.push(key);
    }

    fn emit(
        &self,
        operation: FileOperation,
        meta_type: &str,
        descriptor: &FieldDescriptor,
        key: &str,
    ) {
        if let Some(publisher) = &self.publisher {
            publisher.publish(FileEvent::new(
                operation,
                meta_type,
                descriptor.path.as_str(),
                key,
                descriptor.attrs.clone(),
            ));
        }
    }
}
