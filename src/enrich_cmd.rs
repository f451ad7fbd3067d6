use anyhow::{Context, Result};

use threatload_core::enrich::enrich;

use crate::config::Config;
use crate::weapons::load_weapon_list;

/// `threatload enrich`: print the local enrichment of `text` as JSON.
///
/// Uses the configured weapon list; no backend is contacted.
pub fn run_enrich(config: &Config, text: &str) -> Result<()> {
    let weapons = load_weapon_list(&config.ingest.weapons_path).with_context(|| {
        format!(
            "Failed to load weapon list: {}",
            config.ingest.weapons_path.display()
        )
    })?;

    let result = enrich(Some(text), &weapons);
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
