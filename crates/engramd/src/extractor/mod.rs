//! Completion-driven fact extraction.
//!
//! The extractor asks a completion provider to split raw text into
//! standalone facts, a strand classification, and temporal assertions.
//! It degrades instead of failing: any provider error, malformed answer,
//! or unknown strand turns the input into a single `general` fact.

pub mod native;
pub mod prompts;
pub mod provider;
pub mod remote;
pub mod types;

use std::sync::Arc;

use serde::Deserialize;
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::memory::types::Strand;

pub use native::NativeCompletion;
pub use provider::CompletionProvider;
pub use remote::RemoteCompletion;
pub use types::{Extraction, TemporalFact};

/// Wire shape the completion provider answers with.
#[derive(Debug, Deserialize)]
struct ExtractionJson {
    #[serde(default)]
    facts: Vec<String>,
    strand: String,
    #[serde(default, rename = "temporalFacts")]
    temporal_facts: Vec<TemporalFact>,
}

/// Splits raw text into facts, a strand, and temporal assertions.
pub struct FactExtractor {
    provider: Arc<dyn CompletionProvider>,
}

impl FactExtractor {
    pub fn new(provider: Arc<dyn CompletionProvider>) -> Self {
        Self { provider }
    }

    /// Extract facts from raw text. Never fails: unusable provider
    /// output falls back to the raw input as a single general fact.
    pub async fn extract(&self, text: &str) -> Extraction {
        match self.try_extract(text).await {
            Ok(extraction) => extraction,
            Err(e) => {
                debug!(provider = self.provider.name(), error = %e, "extraction fell back to raw input");
                Extraction::fallback(text)
            }
        }
    }

    async fn try_extract(&self, text: &str) -> Result<Extraction> {
        let value = self
            .provider
            .complete_json(prompts::EXTRACTION_SYSTEM_PROMPT, text)
            .await?;

        let parsed: ExtractionJson = serde_json::from_value(value)
            .map_err(|e| EngineError::Provider(format!("malformed extraction output: {e}")))?;

        let strand = Strand::parse(&parsed.strand)
            .ok_or_else(|| EngineError::Provider(format!("unknown strand '{}'", parsed.strand)))?;

        let facts: Vec<String> = parsed
            .facts
            .into_iter()
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty())
            .collect();

        let temporal_facts: Vec<TemporalFact> = parsed
            .temporal_facts
            .into_iter()
            .filter(TemporalFact::is_complete)
            .collect();

        Ok(Extraction {
            facts,
            strand,
            temporal_facts,
        })
    }
}
