//! Extraction output types.

use serde::{Deserialize, Serialize};

use crate::memory::types::Strand;

/// A time-varying assertion pulled out of the input text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporalFact {
    pub entity: String,
    pub attribute: String,
    pub value: String,
}

impl TemporalFact {
    pub fn new(
        entity: impl Into<String>,
        attribute: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            entity: entity.into(),
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// A temporal fact is usable only when every field carries text.
    pub fn is_complete(&self) -> bool {
        !self.entity.trim().is_empty()
            && !self.attribute.trim().is_empty()
            && !self.value.trim().is_empty()
    }
}

/// Result of running the fact extractor over one input.
#[derive(Debug, Clone)]
pub struct Extraction {
    /// Standalone short facts, one engram each
    pub facts: Vec<String>,
    /// Classification for the whole input
    pub strand: Strand,
    /// Assertions routed to the temporal store
    pub temporal_facts: Vec<TemporalFact>,
}

impl Extraction {
    /// Degraded extraction: the raw input as a single general fact.
    /// Used whenever the provider fails or answers something unusable.
    pub fn fallback(text: &str) -> Self {
        Self {
            facts: vec![text.trim().to_string()],
            strand: Strand::General,
            temporal_facts: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty() && self.temporal_facts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_wraps_raw_input() {
        let extraction = Extraction::fallback("  raw input  ");
        assert_eq!(extraction.facts, vec!["raw input".to_string()]);
        assert_eq!(extraction.strand, Strand::General);
        assert!(extraction.temporal_facts.is_empty());
    }

    #[test]
    fn temporal_fact_completeness() {
        assert!(TemporalFact::new("speaker", "phone", "Samsung").is_complete());
        assert!(!TemporalFact::new("", "phone", "Samsung").is_complete());
        assert!(!TemporalFact::new("speaker", "  ", "Samsung").is_complete());
    }
}
