//! Server-side enrichment registration.
//!
//! A [`PipelineDefinition`] carries the canonical [`EnrichmentRules`]; each
//! backend turns it into whatever its write-time execution facility needs.
//! Registering under an existing id overwrites the previous definition.

use serde::{Deserialize, Serialize};

use crate::backend::Backend;
use crate::enrich::EnrichmentRules;
use crate::error::Result;
use crate::weapons::WeaponList;

pub const PIPELINE_DESCRIPTION: &str = "Detect sentiment and weapons";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineDefinition {
    pub id: String,
    pub description: String,
    pub rules: EnrichmentRules,
}

impl PipelineDefinition {
    pub fn new(id: impl Into<String>, weapons: WeaponList) -> Self {
        Self {
            id: id.into(),
            description: PIPELINE_DESCRIPTION.to_string(),
            rules: EnrichmentRules::new(weapons),
        }
    }
}

pub struct PipelineRegistrar<'a> {
    backend: &'a dyn Backend,
    id: String,
}

impl<'a> PipelineRegistrar<'a> {
    pub fn new(backend: &'a dyn Backend, id: impl Into<String>) -> Self {
        Self {
            backend,
            id: id.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Publish the enrichment rules, parameterized by `weapons`.
    pub async fn register(&self, weapons: &WeaponList) -> Result<PipelineDefinition> {
        let definition = PipelineDefinition::new(self.id.clone(), weapons.clone());
        self.backend.put_pipeline(&definition).await?;
        tracing::info!(
            pipeline = %self.id,
            backend = self.backend.name(),
            weapons = weapons.len(),
            "registered enrichment pipeline"
        );
        Ok(definition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::memory::InMemoryBackend;

    #[tokio::test]
    async fn register_overwrites_same_id() {
        let backend = InMemoryBackend::new();
        let registrar = PipelineRegistrar::new(&backend, "enrich");

        registrar.register(&WeaponList::parse("knife")).await.unwrap();
        registrar.register(&WeaponList::parse("bomb\nrifle")).await.unwrap();

        let stored = backend.pipeline("enrich").unwrap();
        assert_eq!(stored.description, PIPELINE_DESCRIPTION);
        assert_eq!(stored.rules.weapons.terms(), &["bomb", "rifle"]);
    }

    #[test]
    fn definition_round_trips_through_json() {
        let def = PipelineDefinition::new("p", WeaponList::parse("Knife\nbomb"));
        let json = serde_json::to_string(&def).unwrap();
        let back: PipelineDefinition = serde_json::from_str(&json).unwrap();
        assert_eq!(back, def);
    }
}
