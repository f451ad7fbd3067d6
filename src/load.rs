//! Load run orchestration.
//!
//! Coordinates a full run: weapon list → CSV rows → collections →
//! (pipeline registration) → batched bulk writes → status flag.
//!
//! Inputs are read completely before the backend is touched, so a missing
//! or undecodable file aborts the run with nothing submitted. The status
//! flag is written exactly once, after the last batch, and is `true` only
//! when no document was rejected. A fatal backend error or cancellation
//! leaves the flag untouched.

use std::future::Future;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use threatload_core::backend::{Backend, CollectionKind};
use threatload_core::enrich::EnrichmentRules;
use threatload_core::ingest::{batch_count, BatchIngestor, Enrichment};
use threatload_core::models::{Document, IngestReport};
use threatload_core::pipeline::PipelineRegistrar;
use threatload_core::status::StatusRecorder;
use threatload_core::weapons::WeaponList;

use crate::backend::open_backend;
use crate::config::{Config, EnrichmentMode};
use crate::csv_source::read_documents;
use crate::progress::{LoadProgressEvent, LoadProgressReporter};
use crate::weapons::load_weapon_list;

/// Command-line overrides for a load run.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub csv_path: Option<PathBuf>,
    pub batch_size: Option<usize>,
    pub mode: Option<EnrichmentMode>,
    pub dry_run: bool,
}

/// Everything read from disk for a run, before any backend call.
#[derive(Debug, Clone)]
pub struct LoadPlan {
    pub csv_path: PathBuf,
    pub weapons: WeaponList,
    pub rows: Vec<Document>,
    pub batch_size: usize,
    pub mode: EnrichmentMode,
}

impl LoadPlan {
    pub fn batches(&self) -> usize {
        batch_count(self.rows.len(), self.batch_size)
    }
}

/// Resolve options against the config and read both input files.
pub fn plan(
    config: &Config,
    opts: &LoadOptions,
    progress: &dyn LoadProgressReporter,
) -> Result<LoadPlan> {
    let csv_path = opts
        .csv_path
        .clone()
        .or_else(|| config.ingest.csv_path.clone())
        .ok_or_else(|| anyhow::anyhow!("No input file: pass --csv or set ingest.csv_path"))?;

    let batch_size = opts.batch_size.unwrap_or(config.ingest.batch_size);
    if batch_size == 0 {
        bail!("batch size must be > 0");
    }

    let weapons = load_weapon_list(&config.ingest.weapons_path).with_context(|| {
        format!(
            "Failed to load weapon list: {}",
            config.ingest.weapons_path.display()
        )
    })?;

    progress.report(LoadProgressEvent::Reading {
        path: csv_path.display().to_string(),
    });
    let rows = read_documents(&csv_path)
        .with_context(|| format!("Failed to read input: {}", csv_path.display()))?;

    Ok(LoadPlan {
        csv_path,
        weapons,
        rows,
        batch_size,
        mode: opts.mode.unwrap_or(config.ingest.enrichment),
    })
}

/// Create the document and status collections, and register the pipeline
/// when enrichment is delegated to the backend.
pub async fn prepare_backend(
    backend: &dyn Backend,
    config: &Config,
    weapons: &WeaponList,
    mode: EnrichmentMode,
) -> Result<()> {
    backend
        .ensure_collection(&config.index.documents, CollectionKind::Documents)
        .await
        .with_context(|| format!("Failed to create collection '{}'", config.index.documents))?;
    backend
        .ensure_collection(&config.index.status, CollectionKind::Status)
        .await
        .with_context(|| format!("Failed to create collection '{}'", config.index.status))?;

    if mode == EnrichmentMode::Pipeline {
        PipelineRegistrar::new(backend, config.index.pipeline.clone())
            .register(weapons)
            .await
            .with_context(|| format!("Failed to register pipeline '{}'", config.index.pipeline))?;
    }
    Ok(())
}

/// Run the ingestion part of a planned load against `backend`.
///
/// `cancel` resolving before the last batch is submitted aborts the run
/// without recording status. Batches already written stay written.
pub async fn execute<C>(
    backend: &dyn Backend,
    config: &Config,
    plan: &LoadPlan,
    progress: &dyn LoadProgressReporter,
    cancel: C,
) -> Result<IngestReport>
where
    C: Future<Output = ()>,
{
    prepare_backend(backend, config, &plan.weapons, plan.mode).await?;

    let enrichment = match plan.mode {
        EnrichmentMode::Local => Enrichment::Local(EnrichmentRules::new(plan.weapons.clone())),
        EnrichmentMode::Pipeline => Enrichment::Pipeline(config.index.pipeline.clone()),
    };
    let ingestor = BatchIngestor::new(
        backend,
        config.index.documents.clone(),
        plan.batch_size,
        enrichment,
    );

    tracing::info!(
        backend = backend.name(),
        rows = plan.rows.len(),
        batches = plan.batches(),
        mode = ?plan.mode,
        "starting load"
    );

    let ingest = ingestor.ingest_with_progress(&plan.rows, |p| {
        progress.report(LoadProgressEvent::Submitted(*p));
    });
    tokio::pin!(ingest);
    tokio::pin!(cancel);

    let report = tokio::select! {
        biased;
        _ = &mut cancel => {
            tracing::warn!("load cancelled; status not recorded");
            bail!("Load cancelled before all batches were submitted");
        }
        result = &mut ingest => result.context("Bulk ingestion failed")?,
    };

    StatusRecorder::new(backend, config.index.status.clone())
        .with_key(config.index.status_key.clone())
        .record(report.is_clean())
        .await
        .context("Failed to record status")?;

    Ok(report)
}

/// `threatload load`: plan, execute, print a summary.
///
/// Fails (non-zero exit) when any document was rejected, after printing
/// the rejections.
pub async fn run_load(
    config: &Config,
    opts: &LoadOptions,
    progress: &dyn LoadProgressReporter,
) -> Result<()> {
    let plan = plan(config, opts, progress)?;

    if opts.dry_run {
        println!("load {} (dry-run)", plan.csv_path.display());
        println!("  rows found: {}", plan.rows.len());
        println!("  batches: {}", plan.batches());
        println!("  weapon terms: {}", plan.weapons.len());
        println!("  enrichment: {}", mode_name(plan.mode));
        return Ok(());
    }

    let backend = open_backend(config).await?;
    let result = execute(
        backend.as_ref(),
        config,
        &plan,
        progress,
        shutdown_signal(),
    )
    .await;
    backend.close().await?;
    let report = result?;

    println!("load {}", plan.csv_path.display());
    println!("  rows: {}", report.total_rows);
    println!("  batches: {}", report.total_batches);
    println!("  indexed: {}", report.succeeded_count);
    println!("  rejected: {}", report.failed_documents.len());
    println!("  enrichment: {}", mode_name(plan.mode));
    println!("  status done: {}", report.is_clean());

    if !report.is_clean() {
        for failed in &report.failed_documents {
            println!(
                "  rejected {:?}: {}",
                failed.document.text.as_deref().unwrap_or(""),
                failed.reason
            );
        }
        bail!(
            "{} of {} documents were rejected",
            report.failed_documents.len(),
            report.total_rows
        );
    }

    println!("ok");
    Ok(())
}

/// `threatload init`: create collections and register the pipeline.
pub async fn run_init(config: &Config, mode: Option<EnrichmentMode>) -> Result<()> {
    let mode = mode.unwrap_or(config.ingest.enrichment);
    let weapons = load_weapon_list(&config.ingest.weapons_path).with_context(|| {
        format!(
            "Failed to load weapon list: {}",
            config.ingest.weapons_path.display()
        )
    })?;

    let backend = open_backend(config).await?;
    let result = prepare_backend(backend.as_ref(), config, &weapons, mode).await;
    backend.close().await?;
    result?;

    println!("Collections '{}' and '{}' ready.", config.index.documents, config.index.status);
    if mode == EnrichmentMode::Pipeline {
        println!(
            "Pipeline '{}' registered with {} weapon terms.",
            config.index.pipeline,
            weapons.len()
        );
    }
    Ok(())
}

fn mode_name(mode: EnrichmentMode) -> &'static str {
    match mode {
        EnrichmentMode::Local => "local",
        EnrichmentMode::Pipeline => "pipeline",
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // No signal handler available; never cancel
        std::future::pending::<()>().await;
    }
}
