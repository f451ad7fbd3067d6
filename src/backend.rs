use anyhow::{Context, Result};

use threatload_core::backend::Backend;

use crate::backend_es::ElasticsearchBackend;
use crate::backend_sqlite::SqliteBackend;
use crate::config::{BackendKind, Config};

/// Open the configured storage backend.
///
/// The caller owns the handle for the whole run and should call
/// [`Backend::close`] when done.
pub async fn open_backend(config: &Config) -> Result<Box<dyn Backend>> {
    match config.backend.kind {
        BackendKind::Elasticsearch => {
            let es = config
                .elasticsearch
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("Elasticsearch backend not configured"))?;
            let backend = ElasticsearchBackend::new(es)
                .with_context(|| format!("Failed to create Elasticsearch client for {}", es.url))?;
            Ok(Box::new(backend))
        }
        BackendKind::Sqlite => {
            let sqlite = config
                .sqlite
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("SQLite backend not configured"))?;
            let backend = SqliteBackend::open(&sqlite.path)
                .await
                .with_context(|| format!("Failed to open database: {}", sqlite.path.display()))?;
            Ok(Box::new(backend))
        }
    }
}
