use anyhow::{Context, Result};

use threatload_core::status::StatusRecorder;

use crate::backend::open_backend;
use crate::config::Config;

/// `threatload status`: print the completion flag of the last load.
pub async fn run_status(config: &Config) -> Result<()> {
    let backend = open_backend(config).await?;
    let result = StatusRecorder::new(backend.as_ref(), config.index.status.clone())
        .with_key(config.index.status_key.clone())
        .read()
        .await;
    backend.close().await?;
    let status = result.with_context(|| {
        format!(
            "Failed to read status '{}/{}'",
            config.index.status, config.index.status_key
        )
    })?;

    match status {
        Some(record) => {
            println!("done: {}", record.done);
            if let Some(ts) = record.updated_at {
                println!("updated: {}", ts.format("%Y-%m-%dT%H:%M:%SZ"));
            }
        }
        None => println!("status: not recorded"),
    }
    Ok(())
}
