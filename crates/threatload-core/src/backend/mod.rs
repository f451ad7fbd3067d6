//! Storage backend abstraction.
//!
//! The [`Backend`] trait is the one handle that batch ingestion, pipeline
//! registration, and status recording write through. The orchestrator
//! opens it once and passes it by reference to each component.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{IndexedDocument, StatusRecord};
use crate::pipeline::PipelineDefinition;

/// What a collection holds; backends use it to pick a schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionKind {
    Documents,
    Status,
}

/// Per-request result of a bulk write.
///
/// Lists only the rejected items, by their position in the submitted batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BulkResponse {
    pub rejected: Vec<RejectedItem>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedItem {
    pub position: usize,
    pub reason: String,
}

/// Abstract storage backend.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`ensure_collection`](Backend::ensure_collection) | Create a collection if missing |
/// | [`bulk_index`](Backend::bulk_index) | Write one batch as a single request |
/// | [`put_pipeline`](Backend::put_pipeline) | Register or overwrite a write-time pipeline |
/// | [`put_status`](Backend::put_status) | Overwrite a keyed status record |
/// | [`get_status`](Backend::get_status) | Read a keyed status record |
#[async_trait]
pub trait Backend: Send + Sync {
    /// Short name for logs (e.g. `"elasticsearch"`).
    fn name(&self) -> &str;

    async fn ensure_collection(&self, collection: &str, kind: CollectionKind) -> Result<()>;

    /// Index `batch` into `collection` with the `index` operation.
    ///
    /// When `pipeline` is set the backend runs that registered pipeline on
    /// each document before storing it. Errors are reserved for failures of
    /// the whole request; individual refusals go in [`BulkResponse::rejected`].
    async fn bulk_index(
        &self,
        collection: &str,
        batch: &[IndexedDocument],
        pipeline: Option<&str>,
    ) -> Result<BulkResponse>;

    async fn put_pipeline(&self, pipeline: &PipelineDefinition) -> Result<()>;

    async fn put_status(&self, collection: &str, key: &str, status: &StatusRecord) -> Result<()>;

    async fn get_status(&self, collection: &str, key: &str) -> Result<Option<StatusRecord>>;

    /// Release connections. The handle must not be used afterwards.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
