//! In-memory [`Backend`] implementation for tests.
//!
//! Uses `HashMap` and `Vec` behind `std::sync::RwLock`. Registered
//! pipelines are applied at write time with the same
//! [`EnrichmentRules`](crate::enrich::EnrichmentRules) the local path uses,
//! which makes it a stand-in for server-side enrichment.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{IngestError, Result};
use crate::models::{IndexedDocument, StatusRecord};
use crate::pipeline::PipelineDefinition;

use super::{Backend, BulkResponse, CollectionKind, RejectedItem};

type RejectRule = Box<dyn Fn(&IndexedDocument) -> Option<String> + Send + Sync>;

pub struct InMemoryBackend {
    collections: RwLock<HashMap<String, Vec<IndexedDocument>>>,
    batches: RwLock<Vec<usize>>,
    pipelines: RwLock<HashMap<String, PipelineDefinition>>,
    statuses: RwLock<HashMap<(String, String), StatusRecord>>,
    reject: Option<RejectRule>,
    unavailable: AtomicBool,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            batches: RwLock::new(Vec::new()),
            pipelines: RwLock::new(HashMap::new()),
            statuses: RwLock::new(HashMap::new()),
            reject: None,
            unavailable: AtomicBool::new(false),
        }
    }

    /// Refuse every document for which `rule` returns a reason.
    pub fn with_rejection<F>(mut self, rule: F) -> Self
    where
        F: Fn(&IndexedDocument) -> Option<String> + Send + Sync + 'static,
    {
        self.reject = Some(Box::new(rule));
        self
    }

    /// Make every subsequent call fail with `BackendUnavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Accepted documents of `collection`, in write order.
    pub fn documents(&self, collection: &str) -> Vec<IndexedDocument> {
        self.collections
            .read()
            .unwrap()
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    /// Size of every bulk request received, in order.
    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.read().unwrap().clone()
    }

    pub fn pipeline(&self, id: &str) -> Option<PipelineDefinition> {
        self.pipelines.read().unwrap().get(id).cloned()
    }

    pub fn status(&self, collection: &str, key: &str) -> Option<StatusRecord> {
        self.statuses
            .read()
            .unwrap()
            .get(&(collection.to_string(), key.to_string()))
            .cloned()
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(IngestError::BackendUnavailable(
                "in-memory backend switched off".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for InMemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    async fn ensure_collection(&self, collection: &str, _kind: CollectionKind) -> Result<()> {
        self.check_available()?;
        self.collections
            .write()
            .unwrap()
            .entry(collection.to_string())
            .or_default();
        Ok(())
    }

    async fn bulk_index(
        &self,
        collection: &str,
        batch: &[IndexedDocument],
        pipeline: Option<&str>,
    ) -> Result<BulkResponse> {
        self.check_available()?;

        let rules = match pipeline {
            Some(id) => {
                let pipelines = self.pipelines.read().unwrap();
                let def = pipelines.get(id).ok_or_else(|| IngestError::Api {
                    status: 400,
                    message: format!("pipeline with id [{}] does not exist", id),
                })?;
                Some(def.rules.clone())
            }
            None => None,
        };

        self.batches.write().unwrap().push(batch.len());

        let mut response = BulkResponse::default();
        let mut collections = self.collections.write().unwrap();
        let stored = collections.entry(collection.to_string()).or_default();

        for (position, doc) in batch.iter().enumerate() {
            let mut doc = doc.clone();
            if let Some(rules) = &rules {
                doc.enrichment = Some(rules.enrich(doc.document.text.as_deref()));
            }
            if let Some(reason) = self.reject.as_ref().and_then(|rule| rule(&doc)) {
                response.rejected.push(RejectedItem { position, reason });
                continue;
            }
            stored.push(doc);
        }

        Ok(response)
    }

    async fn put_pipeline(&self, pipeline: &PipelineDefinition) -> Result<()> {
        self.check_available()?;
        self.pipelines
            .write()
            .unwrap()
            .insert(pipeline.id.clone(), pipeline.clone());
        Ok(())
    }

    async fn put_status(&self, collection: &str, key: &str, status: &StatusRecord) -> Result<()> {
        self.check_available()?;
        self.statuses
            .write()
            .unwrap()
            .insert((collection.to_string(), key.to_string()), status.clone());
        Ok(())
    }

    async fn get_status(&self, collection: &str, key: &str) -> Result<Option<StatusRecord>> {
        self.check_available()?;
        Ok(self.status(collection, key))
    }
}
