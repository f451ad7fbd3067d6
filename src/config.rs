use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use threatload_core::ingest::DEFAULT_BATCH_SIZE;
use threatload_core::status::STATUS_KEY;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub backend: BackendConfig,
    #[serde(default)]
    pub elasticsearch: Option<ElasticsearchConfig>,
    #[serde(default)]
    pub sqlite: Option<SqliteConfig>,
    #[serde(default)]
    pub index: IndexConfig,
    pub ingest: IngestConfig,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Elasticsearch,
    Sqlite,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    pub kind: BackendKind,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ElasticsearchConfig {
    pub url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct SqliteConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_documents_index")]
    pub documents: String,
    #[serde(default = "default_status_index")]
    pub status: String,
    #[serde(default = "default_status_key")]
    pub status_key: String,
    #[serde(default = "default_pipeline")]
    pub pipeline: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            documents: default_documents_index(),
            status: default_status_index(),
            status_key: default_status_key(),
            pipeline: default_pipeline(),
        }
    }
}

fn default_documents_index() -> String {
    "texts".to_string()
}
fn default_status_index() -> String {
    "status".to_string()
}
fn default_status_key() -> String {
    STATUS_KEY.to_string()
}
fn default_pipeline() -> String {
    "text_enrichment".to_string()
}

/// Where enrichment runs. `Pipeline` delegates it to the backend.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EnrichmentMode {
    Local,
    Pipeline,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    pub weapons_path: PathBuf,
    #[serde(default)]
    pub csv_path: Option<PathBuf>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_enrichment")]
    pub enrichment: EnrichmentMode,
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}
fn default_enrichment() -> EnrichmentMode {
    EnrichmentMode::Pipeline
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config = parse_config(&content)?;

    // Relative data paths are resolved against the config file's directory
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    Ok(config.resolve_paths(base))
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}

impl Config {
    fn validate(&self) -> Result<()> {
        if self.ingest.batch_size == 0 {
            anyhow::bail!("ingest.batch_size must be > 0");
        }

        match self.backend.kind {
            BackendKind::Elasticsearch => {
                let es = self.elasticsearch.as_ref().ok_or_else(|| {
                    anyhow::anyhow!("[elasticsearch] section required when backend.kind = 'elasticsearch'")
                })?;
                if !(es.url.starts_with("http://") || es.url.starts_with("https://")) {
                    anyhow::bail!("elasticsearch.url must start with http:// or https://");
                }
                if es.timeout_secs == 0 {
                    anyhow::bail!("elasticsearch.timeout_secs must be > 0");
                }
            }
            BackendKind::Sqlite => {
                if self.sqlite.is_none() {
                    anyhow::bail!("[sqlite] section required when backend.kind = 'sqlite'");
                }
            }
        }

        for (field, value) in [
            ("index.documents", &self.index.documents),
            ("index.status", &self.index.status),
            ("index.status_key", &self.index.status_key),
            ("index.pipeline", &self.index.pipeline),
        ] {
            if value.trim().is_empty() {
                anyhow::bail!("{} must not be empty", field);
            }
        }

        Ok(())
    }

    fn resolve_paths(mut self, base: &Path) -> Self {
        let resolve = |p: &Path| {
            if p.is_relative() {
                base.join(p)
            } else {
                p.to_path_buf()
            }
        };
        self.ingest.weapons_path = resolve(&self.ingest.weapons_path);
        self.ingest.csv_path = self.ingest.csv_path.as_deref().map(resolve);
        if let Some(sqlite) = self.sqlite.as_mut() {
            sqlite.path = resolve(&sqlite.path);
        }
        self
    }
}
