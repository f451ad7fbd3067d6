//! Batched bulk ingestion.
//!
//! Rows are turned into [`IndexedDocument`]s in order, buffered, and
//! submitted to the backend one batch at a time. A batch is the unit of
//! submission: the backend may refuse individual documents, which are
//! collected in the report, but a failed request aborts the run. Nothing is
//! retried here.

use crate::backend::Backend;
use crate::enrich::EnrichmentRules;
use crate::error::Result;
use crate::models::{Document, FailedDocument, IndexedDocument, IngestReport};

pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Where enrichment runs for a given ingestion.
#[derive(Debug, Clone)]
pub enum Enrichment {
    /// Enrich in this process before submitting.
    Local(EnrichmentRules),
    /// Submit raw documents; the backend runs the named pipeline.
    Pipeline(String),
}

/// Emitted after each batch has been submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchProgress {
    pub batch: usize,
    pub total_batches: usize,
    pub rows_done: usize,
    pub total_rows: usize,
    pub rejected: usize,
}

/// Number of batches needed for `rows` rows.
pub fn batch_count(rows: usize, batch_size: usize) -> usize {
    if batch_size == 0 {
        return 0;
    }
    rows.div_ceil(batch_size)
}

pub struct BatchIngestor<'a> {
    backend: &'a dyn Backend,
    collection: String,
    batch_size: usize,
    enrichment: Enrichment,
}

impl<'a> BatchIngestor<'a> {
    /// `batch_size` of zero is treated as one.
    pub fn new(
        backend: &'a dyn Backend,
        collection: impl Into<String>,
        batch_size: usize,
        enrichment: Enrichment,
    ) -> Self {
        Self {
            backend,
            collection: collection.into(),
            batch_size: batch_size.max(1),
            enrichment,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Ingest `rows` without progress callbacks.
    pub async fn ingest(&self, rows: &[Document]) -> Result<IngestReport> {
        self.ingest_with_progress(rows, |_| {}).await
    }

    pub async fn ingest_with_progress<F>(&self, rows: &[Document], mut on_batch: F) -> Result<IngestReport>
    where
        F: FnMut(&BatchProgress) + Send,
    {
        let total_batches = batch_count(rows.len(), self.batch_size);
        let mut report = IngestReport {
            total_rows: rows.len(),
            ..IngestReport::default()
        };

        let mut buffer: Vec<IndexedDocument> = Vec::with_capacity(self.batch_size.min(rows.len()));
        let mut rows_done = 0usize;

        for row in rows {
            buffer.push(self.prepare(row));
            if buffer.len() >= self.batch_size {
                let rejected = self.submit(&buffer, &mut report).await?;
                rows_done += buffer.len();
                buffer.clear();
                on_batch(&BatchProgress {
                    batch: report.total_batches,
                    total_batches,
                    rows_done,
                    total_rows: rows.len(),
                    rejected,
                });
            }
        }

        if !buffer.is_empty() {
            let rejected = self.submit(&buffer, &mut report).await?;
            rows_done += buffer.len();
            on_batch(&BatchProgress {
                batch: report.total_batches,
                total_batches,
                rows_done,
                total_rows: rows.len(),
                rejected,
            });
        }

        Ok(report)
    }

    fn prepare(&self, row: &Document) -> IndexedDocument {
        match &self.enrichment {
            Enrichment::Local(rules) => {
                IndexedDocument::enriched(row.clone(), rules.enrich(row.text.as_deref()))
            }
            Enrichment::Pipeline(_) => IndexedDocument::raw(row.clone()),
        }
    }

    async fn submit(&self, batch: &[IndexedDocument], report: &mut IngestReport) -> Result<usize> {
        let pipeline = match &self.enrichment {
            Enrichment::Pipeline(id) => Some(id.as_str()),
            Enrichment::Local(_) => None,
        };

        let response = self
            .backend
            .bulk_index(&self.collection, batch, pipeline)
            .await?;

        report.total_batches += 1;

        let mut rejected = 0;
        for item in response.rejected {
            let Some(doc) = batch.get(item.position) else {
                tracing::warn!(
                    position = item.position,
                    "backend rejected an item outside the submitted batch"
                );
                continue;
            };
            tracing::warn!(
                batch = report.total_batches,
                position = item.position,
                reason = %item.reason,
                "document rejected"
            );
            report.failed_documents.push(FailedDocument {
                document: doc.document.clone(),
                reason: item.reason,
            });
            rejected += 1;
        }
        report.succeeded_count += batch.len() - rejected;

        tracing::debug!(
            batch = report.total_batches,
            size = batch.len(),
            rejected,
            "submitted batch"
        );

        Ok(rejected)
    }
}
