use chrono::Utc;

use crate::backend::Backend;
use crate::error::Result;
use crate::models::StatusRecord;

pub const STATUS_KEY: &str = "status";

/// Writes the singleton completion flag. Last write wins.
pub struct StatusRecorder<'a> {
    backend: &'a dyn Backend,
    collection: String,
    key: String,
}

impl<'a> StatusRecorder<'a> {
    pub fn new(backend: &'a dyn Backend, collection: impl Into<String>) -> Self {
        Self {
            backend,
            collection: collection.into(),
            key: STATUS_KEY.to_string(),
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub async fn record(&self, done: bool) -> Result<()> {
        let record = StatusRecord {
            done,
            updated_at: Some(Utc::now()),
        };
        self.backend
            .put_status(&self.collection, &self.key, &record)
            .await?;
        tracing::info!(collection = %self.collection, key = %self.key, done, "recorded status");
        Ok(())
    }

    pub async fn read(&self) -> Result<Option<StatusRecord>> {
        self.backend.get_status(&self.collection, &self.key).await
    }
}
