//! Elasticsearch backend.
//!
//! Talks to the REST API directly with `reqwest`:
//!
//! | Operation | Request |
//! |-----------|---------|
//! | ensure collection | `HEAD /{index}`, then `PUT /{index}` with mappings if missing |
//! | bulk write | `POST /_bulk[?pipeline={id}]` (NDJSON, `index` actions) |
//! | register pipeline | `PUT /_ingest/pipeline/{id}` |
//! | status | `PUT` / `GET /{index}/_doc/{key}` |
//!
//! The ingest pipeline is a single painless `script` processor. The script
//! is generic: vocabulary and weapon list are passed as `params` taken from
//! the [`EnrichmentRules`](threatload_core::enrich::EnrichmentRules), so the
//! classification rules exist in one place only.
//!
//! Every request carries the configured timeout. Transport failures map to
//! `BackendUnavailable`; non-2xx responses map to `Api`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};

use threatload_core::backend::{Backend, BulkResponse, CollectionKind, RejectedItem};
use threatload_core::error::{IngestError, Result};
use threatload_core::models::{IndexedDocument, StatusRecord};
use threatload_core::pipeline::PipelineDefinition;

use crate::config::ElasticsearchConfig;

/// Painless source run once per document at write time.
///
/// Mirrors `EnrichmentRules::enrich`: lowercase once, count distinct
/// vocabulary words by substring, tie is neutral, weapons in list order.
pub const ENRICHMENT_SCRIPT: &str = r#"
String txt = ctx.text != null ? ctx.text.toLowerCase() : "";
int neg = 0; int pos = 0;
for (w in params.negative) { if (txt.contains(w)) { neg++; } }
for (w in params.positive) { if (txt.contains(w)) { pos++; } }
if (neg > pos) { ctx.sentiment = 'negative'; }
else if (pos > neg) { ctx.sentiment = 'positive'; }
else { ctx.sentiment = 'neutral'; }
def found = [];
for (w in params.weapons) { if (txt.contains(w)) { found.add(w); } }
ctx.weapons = found;
"#;

pub struct ElasticsearchBackend {
    client: reqwest::Client,
    base_url: String,
}

impl ElasticsearchBackend {
    pub fn new(config: &ElasticsearchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| IngestError::BackendUnavailable(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        request.send().await.map_err(transport_error)
    }

    async fn expect_success(&self, response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(IngestError::Api {
            status: status.as_u16(),
            message: error_message(&body),
        })
    }
}

fn transport_error(err: reqwest::Error) -> IngestError {
    IngestError::BackendUnavailable(err.to_string())
}

/// Pull `error.reason` out of an Elasticsearch error body, falling back to
/// the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| describe_error(v.get("error")?))
        .unwrap_or_else(|| body.to_string())
}

fn describe_error(error: &Value) -> Option<String> {
    match error {
        Value::String(s) => Some(s.clone()),
        Value::Object(_) => {
            let kind = error.get("type").and_then(Value::as_str);
            let reason = error.get("reason").and_then(Value::as_str);
            match (kind, reason) {
                (Some(k), Some(r)) => Some(format!("{}: {}", k, r)),
                (Some(k), None) => Some(k.to_string()),
                (None, Some(r)) => Some(r.to_string()),
                (None, None) => Some(error.to_string()),
            }
        }
        _ => None,
    }
}

pub fn collection_body(kind: CollectionKind) -> Value {
    match kind {
        CollectionKind::Documents => json!({
            "mappings": {
                "properties": {
                    "text": { "type": "text" },
                    "label": { "type": "keyword" },
                    "timestamp": { "type": "keyword" },
                    "sentiment": { "type": "keyword" },
                    "weapons": { "type": "keyword" }
                }
            }
        }),
        CollectionKind::Status => json!({
            "mappings": {
                "properties": {
                    "done": { "type": "boolean" },
                    "updated_at": { "type": "date" }
                }
            }
        }),
    }
}

pub fn pipeline_body(pipeline: &PipelineDefinition) -> Value {
    json!({
        "description": pipeline.description,
        "processors": [
            {
                "script": {
                    "lang": "painless",
                    "params": {
                        "weapons": pipeline.rules.weapons,
                        "negative": pipeline.rules.negative,
                        "positive": pipeline.rules.positive
                    },
                    "source": ENRICHMENT_SCRIPT
                }
            }
        ]
    })
}

/// Encode a batch as `_bulk` NDJSON: an `index` action line, then the source.
pub fn bulk_body(collection: &str, batch: &[IndexedDocument]) -> Result<String> {
    let action = serde_json::to_string(&json!({ "index": { "_index": collection } }))
        .map_err(|e| IngestError::InvalidResponse(e.to_string()))?;

    let mut body = String::new();
    for doc in batch {
        let source =
            serde_json::to_string(doc).map_err(|e| IngestError::InvalidResponse(e.to_string()))?;
        body.push_str(&action);
        body.push('\n');
        body.push_str(&source);
        body.push('\n');
    }
    Ok(body)
}

/// Map a `_bulk` response to rejected positions.
pub fn parse_bulk_response(json: &Value, expected: usize) -> Result<BulkResponse> {
    let items = json
        .get("items")
        .and_then(Value::as_array)
        .ok_or_else(|| IngestError::InvalidResponse("bulk response missing items array".into()))?;

    if items.len() != expected {
        return Err(IngestError::InvalidResponse(format!(
            "bulk response has {} items for {} documents",
            items.len(),
            expected
        )));
    }

    let mut response = BulkResponse::default();
    for (position, item) in items.iter().enumerate() {
        // Each item is keyed by its action type: {"index": {...}}
        let result = item
            .as_object()
            .and_then(|o| o.values().next())
            .ok_or_else(|| IngestError::InvalidResponse(format!("malformed bulk item {}", position)))?;

        if let Some(reason) = result.get("error").and_then(describe_error) {
            response.rejected.push(RejectedItem { position, reason });
        }
    }
    Ok(response)
}

#[async_trait]
impl Backend for ElasticsearchBackend {
    fn name(&self) -> &str {
        "elasticsearch"
    }

    async fn ensure_collection(&self, collection: &str, kind: CollectionKind) -> Result<()> {
        let response = self.send(self.client.head(self.url(collection))).await?;
        match response.status() {
            StatusCode::OK => return Ok(()),
            StatusCode::NOT_FOUND => {}
            _ => {
                self.expect_success(response).await?;
            }
        }

        let response = self
            .send(self.client.put(self.url(collection)).json(&collection_body(kind)))
            .await?;

        if response.status() == StatusCode::BAD_REQUEST {
            let body = response.text().await.unwrap_or_default();
            // Lost a creation race with another loader
            if body.contains("resource_already_exists_exception") {
                return Ok(());
            }
            return Err(IngestError::Api {
                status: StatusCode::BAD_REQUEST.as_u16(),
                message: error_message(&body),
            });
        }
        self.expect_success(response).await?;

        tracing::info!(index = collection, "created index");
        Ok(())
    }

    async fn bulk_index(
        &self,
        collection: &str,
        batch: &[IndexedDocument],
        pipeline: Option<&str>,
    ) -> Result<BulkResponse> {
        if batch.is_empty() {
            return Ok(BulkResponse::default());
        }

        let url = match pipeline {
            Some(id) => format!("{}?pipeline={}", self.url("_bulk"), id),
            None => self.url("_bulk"),
        };

        let response = self
            .send(
                self.client
                    .post(url)
                    .header("Content-Type", "application/x-ndjson")
                    .body(bulk_body(collection, batch)?),
            )
            .await?;
        let response = self.expect_success(response).await?;

        let json: Value = response.json().await.map_err(|e| {
            IngestError::InvalidResponse(format!("bulk response is not JSON: {}", e))
        })?;
        parse_bulk_response(&json, batch.len())
    }

    async fn put_pipeline(&self, pipeline: &PipelineDefinition) -> Result<()> {
        let url = self.url(&format!("_ingest/pipeline/{}", pipeline.id));
        let response = self
            .send(self.client.put(url).json(&pipeline_body(pipeline)))
            .await?;
        self.expect_success(response).await?;
        Ok(())
    }

    async fn put_status(&self, collection: &str, key: &str, status: &StatusRecord) -> Result<()> {
        let url = self.url(&format!("{}/_doc/{}", collection, key));
        let response = self.send(self.client.put(url).json(status)).await?;
        self.expect_success(response).await?;
        Ok(())
    }

    async fn get_status(&self, collection: &str, key: &str) -> Result<Option<StatusRecord>> {
        let url = self.url(&format!("{}/_doc/{}", collection, key));
        let response = self.send(self.client.get(url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = self.expect_success(response).await?;

        let json: Value = response
            .json()
            .await
            .map_err(|e| IngestError::InvalidResponse(e.to_string()))?;
        let source = json
            .get("_source")
            .cloned()
            .ok_or_else(|| IngestError::InvalidResponse("status document has no _source".into()))?;
        let record = serde_json::from_value(source)
            .map_err(|e| IngestError::InvalidResponse(format!("bad status document: {}", e)))?;
        Ok(Some(record))
    }
}
