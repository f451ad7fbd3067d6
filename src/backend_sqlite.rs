//! Local SQLite backend.
//!
//! Stores documents, status records, and pipeline definitions in a single
//! SQLite file. A bulk write is one transaction. Registered pipelines are
//! kept as JSON and, when a write names one, the backend enriches each
//! document itself before storing it, the same way a search engine runs an
//! ingest pipeline at write time.

use std::path::Path;
use std::str::FromStr;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use uuid::Uuid;

use threatload_core::backend::{Backend, BulkResponse, CollectionKind, RejectedItem};
use threatload_core::enrich::{EnrichmentResult, Sentiment};
use threatload_core::error::{IngestError, Result};
use threatload_core::models::{Document, IndexedDocument, StatusRecord};
use threatload_core::pipeline::PipelineDefinition;

use crate::migrate;

pub struct SqliteBackend {
    pool: SqlitePool,
}

fn storage_error(err: impl std::fmt::Display) -> IngestError {
    IngestError::Storage(err.to_string())
}

impl SqliteBackend {
    /// Open (creating if needed) the database at `path` and apply the schema.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| IngestError::from_io(parent, e))?;
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))
            .map_err(storage_error)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| IngestError::BackendUnavailable(e.to_string()))?;

        migrate::run_migrations(&pool).await.map_err(storage_error)?;
        Ok(Self { pool })
    }

    /// Stored documents of `collection`, in write order.
    pub async fn documents(&self, collection: &str) -> Result<Vec<IndexedDocument>> {
        let rows = sqlx::query(
            "SELECT text, label, timestamp, sentiment, weapons_json FROM documents \
             WHERE collection = ? ORDER BY seq",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_error)?;

        rows.iter()
            .map(|row| -> Result<IndexedDocument> {
                let document = Document {
                    text: row.get("text"),
                    label: row.get("label"),
                    timestamp: row.get("timestamp"),
                };
                let sentiment: Option<String> = row.get("sentiment");
                let weapons_json: Option<String> = row.get("weapons_json");
                let enrichment = match (sentiment, weapons_json) {
                    (Some(s), Some(w)) => Some(EnrichmentResult {
                        sentiment: Sentiment::parse(&s)
                            .ok_or_else(|| storage_error(format!("unknown sentiment '{}'", s)))?,
                        weapons_found: serde_json::from_str(&w).map_err(storage_error)?,
                    }),
                    _ => None,
                };
                Ok(IndexedDocument {
                    document,
                    enrichment,
                })
            })
            .collect()
    }

    async fn load_pipeline(&self, id: &str) -> Result<PipelineDefinition> {
        let json: Option<String> =
            sqlx::query_scalar("SELECT definition_json FROM pipelines WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(storage_error)?;

        let json = json.ok_or_else(|| IngestError::Api {
            status: 400,
            message: format!("pipeline with id [{}] does not exist", id),
        })?;
        serde_json::from_str(&json).map_err(storage_error)
    }
}

#[async_trait]
impl Backend for SqliteBackend {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn ensure_collection(&self, _collection: &str, _kind: CollectionKind) -> Result<()> {
        // Collections are rows in shared tables; the schema is all there is
        migrate::run_migrations(&self.pool)
            .await
            .map_err(storage_error)
    }

    async fn bulk_index(
        &self,
        collection: &str,
        batch: &[IndexedDocument],
        pipeline: Option<&str>,
    ) -> Result<BulkResponse> {
        let rules = match pipeline {
            Some(id) => Some(self.load_pipeline(id).await?.rules),
            None => None,
        };

        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await.map_err(storage_error)?;

        let last_seq: i64 =
            sqlx::query_scalar("SELECT COALESCE(MAX(seq), 0) FROM documents WHERE collection = ?")
                .bind(collection)
                .fetch_one(&mut *tx)
                .await
                .map_err(storage_error)?;

        let mut response = BulkResponse::default();
        let mut seq = last_seq;

        for (position, doc) in batch.iter().enumerate() {
            let enrichment = match &rules {
                Some(rules) => Some(rules.enrich(doc.document.text.as_deref())),
                None => doc.enrichment.clone(),
            };
            let weapons_json = match &enrichment {
                Some(e) => Some(serde_json::to_string(&e.weapons_found).map_err(storage_error)?),
                None => None,
            };

            seq += 1;
            let result = sqlx::query(
                r#"
                INSERT INTO documents (id, collection, seq, text, label, timestamp, sentiment, weapons_json, ingested_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(collection)
            .bind(seq)
            .bind(&doc.document.text)
            .bind(&doc.document.label)
            .bind(&doc.document.timestamp)
            .bind(enrichment.as_ref().map(|e| e.sentiment.as_str()))
            .bind(&weapons_json)
            .bind(now)
            .execute(&mut *tx)
            .await;

            // A failed statement leaves the rest of the transaction intact
            if let Err(e) = result {
                seq -= 1;
                response.rejected.push(RejectedItem {
                    position,
                    reason: e.to_string(),
                });
            }
        }

        tx.commit().await.map_err(storage_error)?;
        Ok(response)
    }

    async fn put_pipeline(&self, pipeline: &PipelineDefinition) -> Result<()> {
        let json = serde_json::to_string(pipeline).map_err(storage_error)?;
        sqlx::query(
            r#"
            INSERT INTO pipelines (id, definition_json, updated_at) VALUES (?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                definition_json = excluded.definition_json,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&pipeline.id)
        .bind(&json)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(())
    }

    async fn put_status(&self, collection: &str, key: &str, status: &StatusRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO status (collection, key, done, updated_at) VALUES (?, ?, ?, ?)
            ON CONFLICT(collection, key) DO UPDATE SET
                done = excluded.done,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(collection)
        .bind(key)
        .bind(status.done)
        .bind(status.updated_at.map(|t| t.timestamp()))
        .execute(&self.pool)
        .await
        .map_err(storage_error)?;
        Ok(())
    }

    async fn get_status(&self, collection: &str, key: &str) -> Result<Option<StatusRecord>> {
        let row = sqlx::query("SELECT done, updated_at FROM status WHERE collection = ? AND key = ?")
            .bind(collection)
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_error)?;

        Ok(row.map(|row| {
            let updated_at: Option<i64> = row.get("updated_at");
            StatusRecord {
                done: row.get("done"),
                updated_at: updated_at.and_then(|ts| chrono::DateTime::from_timestamp(ts, 0)),
            }
        }))
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}
