//! Weapon term lists.
//!
//! A [`WeaponList`] is the normalized form of a newline-delimited term file:
//! every entry is trimmed, lowercased, and non-empty. File order is kept
//! (first occurrence wins on duplicates) so that enrichment output and the
//! parameters sent to a backend pipeline are deterministic.

use serde::{Deserialize, Serialize};

/// Ordered, de-duplicated set of lowercase weapon terms.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct WeaponList {
    terms: Vec<String>,
}

impl WeaponList {
    /// Parse newline-delimited text into a normalized list.
    ///
    /// Blank lines (after trimming) are skipped.
    pub fn parse(content: &str) -> Self {
        content.lines().collect()
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn contains(&self, term: &str) -> bool {
        self.terms.iter().any(|t| t == term)
    }
}

impl<S: AsRef<str>> FromIterator<S> for WeaponList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut terms: Vec<String> = Vec::new();
        for raw in iter {
            let term = raw.as_ref().trim();
            if term.is_empty() {
                continue;
            }
            let term = term.to_lowercase();
            if !terms.contains(&term) {
                terms.push(term);
            }
        }
        Self { terms }
    }
}

impl From<Vec<String>> for WeaponList {
    fn from(raw: Vec<String>) -> Self {
        raw.into_iter().collect()
    }
}

impl From<WeaponList> for Vec<String> {
    fn from(list: WeaponList) -> Self {
        list.terms
    }
}
