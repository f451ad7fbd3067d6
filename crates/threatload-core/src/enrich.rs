//! Document enrichment: keyword sentiment and weapon detection.
//!
//! Both passes lowercase the text once and then test plain substring
//! containment. There is no tokenization or word-boundary check, so
//! `"strike"` does not match `"like"` but `"likely"` does. Each vocabulary
//! word counts at most once no matter how often it appears.
//!
//! [`EnrichmentRules`] is the single definition of the rules. Local
//! enrichment calls [`EnrichmentRules::enrich`]; the server-side path
//! serializes the same struct into a backend pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::weapons::WeaponList;

pub const NEGATIVE_WORDS: &[&str] = &["kill", "murder", "hate", "destroy", "attack", "bomb", "shoot"];
pub const POSITIVE_WORDS: &[&str] = &["love", "like", "support", "good", "happy"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "positive" => Some(Sentiment::Positive),
            "negative" => Some(Sentiment::Negative),
            "neutral" => Some(Sentiment::Neutral),
            _ => None,
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fields derived from a document's text.
///
/// Serialized as `{"sentiment": ..., "weapons": [...]}`, the field names
/// written by both execution paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentResult {
    pub sentiment: Sentiment,
    #[serde(rename = "weapons")]
    pub weapons_found: Vec<String>,
}

/// Vocabulary plus weapon list snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentRules {
    pub negative: Vec<String>,
    pub positive: Vec<String>,
    pub weapons: WeaponList,
}

impl EnrichmentRules {
    /// Rules with the built-in sentiment vocabulary.
    pub fn new(weapons: WeaponList) -> Self {
        Self {
            negative: NEGATIVE_WORDS.iter().map(|w| w.to_string()).collect(),
            positive: POSITIVE_WORDS.iter().map(|w| w.to_string()).collect(),
            weapons,
        }
    }

    pub fn enrich(&self, text: Option<&str>) -> EnrichmentResult {
        enrich_with(text, &self.negative, &self.positive, self.weapons.terms())
    }
}

/// Enrich `text` with the built-in vocabulary and the given weapon list.
///
/// A missing text is treated as empty. Pass `&WeaponList::default()` when
/// there is no weapon list; that is not an error.
pub fn enrich(text: Option<&str>, weapons: &WeaponList) -> EnrichmentResult {
    enrich_with(text, NEGATIVE_WORDS, POSITIVE_WORDS, weapons.terms())
}

fn enrich_with<N, P>(
    text: Option<&str>,
    negative: &[N],
    positive: &[P],
    weapons: &[String],
) -> EnrichmentResult
where
    N: AsRef<str>,
    P: AsRef<str>,
{
    let normalized = text.unwrap_or("").to_lowercase();

    let neg = count_present(&normalized, negative);
    let pos = count_present(&normalized, positive);

    let sentiment = if neg > pos {
        Sentiment::Negative
    } else if pos > neg {
        Sentiment::Positive
    } else {
        Sentiment::Neutral
    };

    let weapons_found = weapons
        .iter()
        .filter(|w| normalized.contains(w.as_str()))
        .cloned()
        .collect();

    EnrichmentResult {
        sentiment,
        weapons_found,
    }
}

fn count_present<W: AsRef<str>>(haystack: &str, words: &[W]) -> usize {
    words
        .iter()
        .filter(|w| haystack.contains(w.as_ref()))
        .count()
}
