//! Records that flow through an ingestion run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enrich::EnrichmentResult;

/// One input row. Columns absent from the source are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub text: Option<String>,
    pub label: Option<String>,
    pub timestamp: Option<String>,
}

impl Document {
    pub fn new(text: impl Into<String>, label: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            label: Some(label.into()),
            timestamp: Some(timestamp.into()),
        }
    }
}

/// The unit submitted to a backend.
///
/// `enrichment` is `None` when the backend is expected to enrich the
/// document through a registered pipeline; the enrichment fields are then
/// omitted from the serialized source entirely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedDocument {
    #[serde(flatten)]
    pub document: Document,
    #[serde(flatten)]
    pub enrichment: Option<EnrichmentResult>,
}

impl IndexedDocument {
    pub fn raw(document: Document) -> Self {
        Self {
            document,
            enrichment: None,
        }
    }

    pub fn enriched(document: Document, enrichment: EnrichmentResult) -> Self {
        Self {
            document,
            enrichment: Some(enrichment),
        }
    }
}

/// Singleton "ingestion complete" record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// A document the backend refused, with its reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedDocument {
    pub document: Document,
    pub reason: String,
}

/// Outcome of a [`BatchIngestor`](crate::ingest::BatchIngestor) run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub total_rows: usize,
    pub total_batches: usize,
    pub succeeded_count: usize,
    pub failed_documents: Vec<FailedDocument>,
}

impl IngestReport {
    /// True when every row was accepted.
    pub fn is_clean(&self) -> bool {
        self.failed_documents.is_empty()
    }
}
