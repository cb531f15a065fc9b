//! Memory ingestion pipeline.
//!
//! Orchestrates the path from raw text to stored state: fact extraction,
//! embedding, duplicate detection, engram creation, synapse formation,
//! and chronicle recording. Facts are processed sequentially so two
//! near-identical facts in one input dedup against each other.

use std::sync::Arc;

use tracing::warn;

use crate::embedding::Embedder;
use crate::error::{EngineError, Result};
use crate::extractor::FactExtractor;
use crate::memory::associations::AssociationEngine;
use crate::memory::dedup::{content_hash, Deduplicator};
use crate::memory::signal::DEFAULT_ENGRAM_BOOST;
use crate::memory::types::{Engram, Metadata, Strand};
use crate::storage::MemoryStore;
use crate::temporal::{RecordFact, TemporalService};

/// Caller inputs for `add_memory` beyond the content itself.
#[derive(Debug, Clone, Default)]
pub struct AddMemory {
    pub content: String,
    /// Overrides the extractor's classification when set
    pub strand: Option<Strand>,
    pub tags: Option<Vec<String>>,
    pub metadata: Option<Metadata>,
    pub signal: Option<f32>,
    pub pulse_rate: Option<f32>,
}

/// Pipeline from raw text to stored engrams, synapses, and chronicles.
pub struct IngestionPipeline {
    store: Arc<dyn MemoryStore>,
    embedder: Arc<dyn Embedder>,
    extractor: Arc<FactExtractor>,
    dedup: Deduplicator,
    associations: AssociationEngine,
    temporal: TemporalService,
}

impl IngestionPipeline {
    pub fn new(
        store: Arc<dyn MemoryStore>,
        embedder: Arc<dyn Embedder>,
        extractor: Arc<FactExtractor>,
    ) -> Self {
        Self {
            dedup: Deduplicator::new(store.clone()),
            associations: AssociationEngine::new(store.clone()),
            temporal: TemporalService::new(store.clone()),
            store,
            embedder,
            extractor,
        }
    }

    /// Ingest one input for an owner. Returns the engrams the input
    /// produced: newly created ones and existing ones it reinforced.
    ///
    /// A chronicle-recording failure is logged and swallowed; an
    /// embedder or store failure aborts the request but leaves engrams
    /// already stored from earlier facts in place.
    pub async fn add_memory(&self, owner_id: &str, request: AddMemory) -> Result<Vec<Engram>> {
        if owner_id.trim().is_empty() {
            return Err(EngineError::Validation("owner_id must not be empty".to_string()));
        }
        let content = request.content.trim();
        if content.is_empty() {
            return Err(EngineError::Validation("content must not be empty".to_string()));
        }
        for (name, value) in [("signal", request.signal), ("pulse_rate", request.pulse_rate)] {
            if let Some(v) = value {
                if !(0.0..=1.0).contains(&v) {
                    return Err(EngineError::Validation(format!(
                        "{name} must be within [0, 1], got {v}"
                    )));
                }
            }
        }

        let extraction = self.extractor.extract(content).await;
        if extraction.is_empty() {
            return Ok(Vec::new());
        }
        let strand = request.strand.unwrap_or(extraction.strand);

        let mut engrams: Vec<Engram> = Vec::new();
        for fact in &extraction.facts {
            let embedding = self.embedder.embed(fact).await?;

            if let Some(duplicate) = self.dedup.check(owner_id, fact, &embedding).await? {
                tracing::debug!(
                    owner_id,
                    engram_id = %duplicate.engram.id,
                    similarity = duplicate.similarity,
                    "fact deduplicated onto existing engram"
                );
                let reinforced = self
                    .store
                    .reinforce_engram(owner_id, duplicate.engram.id, DEFAULT_ENGRAM_BOOST)
                    .await?;
                match engrams.iter().position(|e| e.id == reinforced.id) {
                    // Already emitted this request; keep the freshest state.
                    Some(pos) => engrams[pos] = reinforced,
                    None => engrams.push(reinforced),
                }
                continue;
            }

            let mut engram = Engram::new(owner_id, fact, content_hash(fact), strand, embedding);
            if let Some(tags) = &request.tags {
                engram.tags = tags.clone();
            }
            if let Some(metadata) = &request.metadata {
                engram.metadata = metadata.clone();
            }
            if let Some(signal) = request.signal {
                engram.set_signal(signal);
            }
            if let Some(pulse_rate) = request.pulse_rate {
                engram.pulse_rate = pulse_rate;
            }

            let stored = self.store.create_engram(engram).await?;
            engrams.push(stored);
        }

        if engrams.len() >= 2 {
            let ids: Vec<_> = engrams.iter().map(|e| e.id).collect();
            self.associations.form(owner_id, &ids).await?;
        }

        for temporal_fact in extraction.temporal_facts {
            let record = RecordFact {
                entity: temporal_fact.entity,
                attribute: temporal_fact.attribute,
                value: temporal_fact.value,
                ..Default::default()
            };
            if let Err(e) = self.temporal.record_fact(owner_id, record).await {
                warn!(owner_id, error = %e, "chronicle recording failed during ingestion");
            }
        }

        Ok(engrams)
    }
}
