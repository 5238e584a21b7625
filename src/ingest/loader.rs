//! Chunked bulk loader

use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::report::ImportReport;
use super::resolver::{EntityBinding, TitleCache, resolve_titles};
use super::validator::{RowOutcome, RowValidator};
use super::{IngestError, IngestResult};
use crate::config::{ColumnNames, DEFAULT_CHUNK_SIZE, IngestConfig};
use crate::database::{IngestStore, NewRecord, StoreError};
use crate::dataset::DataFrame;

/// Loader settings
#[derive(Debug, Clone, PartialEq)]
pub struct LoaderOptions {
    /// Rows per write scope
    pub chunk_size: usize,
    /// Bind rows by title; otherwise rows use the store's fallback app
    pub resolve_titles: bool,
    /// Rejections kept verbatim in the report
    pub max_reported_rejections: usize,
    pub columns: ColumnNames,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            resolve_titles: true,
            max_reported_rejections: 100,
            columns: ColumnNames::default(),
        }
    }
}

impl From<&IngestConfig> for LoaderOptions {
    fn from(config: &IngestConfig) -> Self {
        Self {
            chunk_size: config.loader.chunk_size,
            resolve_titles: config.loader.resolve_titles,
            max_reported_rejections: config.loader.max_reported_rejections,
            columns: config.columns.clone(),
        }
    }
}

impl LoaderOptions {
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_resolve_titles(mut self, resolve_titles: bool) -> Self {
        self.resolve_titles = resolve_titles;
        self
    }
}

/// Imports columnar datasets into a store, one write scope per chunk
///
/// New apps are created inside the first chunk's scope. If that chunk fails
/// they are rolled back with it; once it commits they stay even if a later
/// chunk fails.
pub struct BulkLoader<'a, S: IngestStore + ?Sized> {
    store: &'a S,
    options: LoaderOptions,
}

impl<'a, S: IngestStore + ?Sized> BulkLoader<'a, S> {
    pub fn new(store: &'a S, options: LoaderOptions) -> Self {
        Self { store, options }
    }

    /// Create a loader from the `[loader]` and `[columns]` config sections
    pub fn with_config(store: &'a S, config: &IngestConfig) -> Self {
        Self::new(store, LoaderOptions::from(config))
    }

    pub fn options(&self) -> &LoaderOptions {
        &self.options
    }

    /// Import a dataset
    ///
    /// # Arguments
    ///
    /// * `frame` - Input rows
    /// * `entity` - App to bind every row to, skipping title resolution
    ///
    /// # Returns
    ///
    /// Number of rows persisted, never more than the frame's row count
    pub async fn import(&self, frame: &DataFrame, entity: Option<Uuid>) -> IngestResult<usize> {
        self.import_with_report(frame, entity)
            .await
            .map(|report| report.imported)
    }

    /// Import a dataset and return the full report
    pub async fn import_with_report(
        &self,
        frame: &DataFrame,
        entity: Option<Uuid>,
    ) -> IngestResult<ImportReport> {
        let chunk_size = self.options.chunk_size;
        if chunk_size == 0 {
            return Err(IngestError::InvalidOptions(
                "chunk_size must be greater than zero".to_string(),
            ));
        }

        let started = Instant::now();
        let total = frame.row_count();
        let mut report = ImportReport::new(total);
        if total == 0 {
            debug!("Dataset is empty, nothing to import");
            return Ok(report);
        }

        let (binding, mut pending) = self.bind(frame, entity, &mut report).await?;
        let validator = RowValidator::new(frame, &self.options.columns, &binding);
        let limit = self.options.max_reported_rejections;

        for (chunk, start) in (0..total).step_by(chunk_size).enumerate() {
            let end = (start + chunk_size).min(total);
            let failed = |source: StoreError, rows_committed: usize| IngestError::ChunkFailed {
                chunk,
                rows_committed,
                source,
            };

            let mut scope = match pending.take() {
                Some(scope) => scope,
                None => self
                    .store
                    .begin_write()
                    .await
                    .map_err(|e| failed(e, report.imported))?,
            };

            let mut batch = Vec::with_capacity(end - start);
            for row in start..end {
                match validator.validate(row) {
                    RowOutcome::Accepted(draft) => batch.push(NewRecord::from(draft)),
                    RowOutcome::Rejected(rejection) => {
                        warn!(row = rejection.row, reason = %rejection.reason, "Skipping row");
                        report.record_rejection(rejection, limit);
                    }
                }
            }

            let inserted = match self.store.insert_records(&mut scope, &batch).await {
                Ok(inserted) => inserted,
                Err(e) => {
                    if let Err(rollback_err) = self.store.rollback(scope).await {
                        warn!(chunk, error = %rollback_err, "Rollback after failed insert failed");
                    }
                    return Err(failed(e, report.imported));
                }
            };
            self.store
                .commit(scope)
                .await
                .map_err(|e| failed(e, report.imported))?;

            report.imported += inserted;
            report.chunks_committed += 1;
            debug!(chunk, start, end, accepted = inserted, "Committed chunk");
        }

        report.duration = started.elapsed();
        info!(
            total = report.total_rows,
            imported = report.imported,
            rejected = report.rejected_count,
            chunks = report.chunks_committed,
            entities_created = report.entities_created,
            rows_per_sec = report.throughput() as u64,
            "Import complete"
        );
        Ok(report)
    }

    /// Decide how rows bind to apps
    ///
    /// Title resolution opens the first chunk's scope and hands it back so
    /// the loader writes the first chunk into it.
    async fn bind(
        &self,
        frame: &DataFrame,
        entity: Option<Uuid>,
        report: &mut ImportReport,
    ) -> IngestResult<(EntityBinding, Option<S::Scope>)> {
        if let Some(id) = entity {
            return Ok((EntityBinding::Fixed(id), None));
        }

        if !self.options.resolve_titles {
            let fallback = self
                .store
                .fallback_entity()
                .await?
                .ok_or(IngestError::NoFallbackEntity)?;
            debug!(app = %fallback.id, title = %fallback.title, "Binding rows to fallback app");
            return Ok((EntityBinding::Fixed(fallback.id), None));
        }

        let titles = frame.distinct_text(&self.options.columns.title);
        if titles.is_empty() {
            // Every row will be rejected; the chunks still open their scopes.
            return Ok((EntityBinding::PerTitle(TitleCache::new()), None));
        }

        let mut scope = self.store.begin_write().await?;
        match resolve_titles(self.store, &mut scope, titles).await {
            Ok(cache) => {
                report.entities_resolved = cache.len();
                report.entities_created = cache.created();
                Ok((EntityBinding::PerTitle(cache), Some(scope)))
            }
            Err(err) => {
                if let Err(rollback_err) = self.store.rollback(scope).await {
                    warn!(error = %rollback_err, "Rollback after failed resolution failed");
                }
                Err(err)
            }
        }
    }
}
