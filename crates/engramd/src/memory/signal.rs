//! Signal dynamics: reinforcement, access stamping, and decay.
//!
//! Signals live in [0, 1]. Reinforcement is a saturating add, decay is a
//! floored multiplicative shrink applied per strand. Decay runs only on
//! an external trigger; nothing in the engine schedules it.

use std::sync::Arc;

use serde::Serialize;

use crate::error::Result;
use crate::memory::types::{Engram, Strand};
use crate::storage::MemoryStore;
use uuid::Uuid;

/// Default boost applied when an engram is reinforced.
pub const DEFAULT_ENGRAM_BOOST: f32 = 0.1;

/// Default boost applied when a synapse is reinforced.
pub const DEFAULT_SYNAPSE_BOOST: f32 = 0.05;

/// Per-strand multiplicative decay rates plus the shared floor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecaySchedule {
    pub factual: f32,
    pub experiential: f32,
    pub procedural: f32,
    pub preferential: f32,
    pub relational: f32,
    pub general: f32,
    /// Signals never decay below this floor.
    pub min_signal: f32,
}

impl Default for DecaySchedule {
    fn default() -> Self {
        Self {
            factual: 0.95,
            experiential: 0.90,
            procedural: 0.97,
            preferential: 0.93,
            relational: 0.92,
            general: 0.88,
            min_signal: 0.01,
        }
    }
}

impl DecaySchedule {
    pub fn rate(&self, strand: Strand) -> f32 {
        match strand {
            Strand::Factual => self.factual,
            Strand::Experiential => self.experiential,
            Strand::Procedural => self.procedural,
            Strand::Preferential => self.preferential,
            Strand::Relational => self.relational,
            Strand::General => self.general,
        }
    }
}

/// Outcome of one decay cycle.
#[derive(Debug, Clone, Serialize)]
pub struct DecayReport {
    pub affected: usize,
    pub strands: Vec<StrandDecay>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StrandDecay {
    pub strand: Strand,
    pub rate: f32,
    pub affected: usize,
}

/// Reinforcement and decay over the shared store.
pub struct SignalService {
    store: Arc<dyn MemoryStore>,
    schedule: DecaySchedule,
}

impl SignalService {
    pub fn new(store: Arc<dyn MemoryStore>, schedule: DecaySchedule) -> Self {
        Self { store, schedule }
    }

    pub fn schedule(&self) -> &DecaySchedule {
        &self.schedule
    }

    /// Saturating reinforcement; `boost` defaults to
    /// [`DEFAULT_ENGRAM_BOOST`].
    pub async fn reinforce(&self, owner_id: &str, id: Uuid, boost: Option<f32>) -> Result<Engram> {
        self.store
            .reinforce_engram(owner_id, id, boost.unwrap_or(DEFAULT_ENGRAM_BOOST))
            .await
    }

    /// Access reinforcement for retrieval hits: stamps the access and
    /// applies the default boost.
    pub async fn reinforce_access(&self, owner_id: &str, id: Uuid) -> Result<()> {
        self.store.record_access(owner_id, id).await?;
        self.store
            .reinforce_engram(owner_id, id, DEFAULT_ENGRAM_BOOST)
            .await?;
        Ok(())
    }

    /// One decay cycle over every strand of the owner.
    ///
    /// Safe to run while ingestion is in flight: each strand pass is an
    /// independent store operation and re-running the cycle only shrinks
    /// signals further toward the floor.
    pub async fn run_decay_cycle(&self, owner_id: &str) -> Result<DecayReport> {
        let mut strands = Vec::with_capacity(Strand::ALL.len());
        let mut affected = 0;

        for strand in Strand::ALL {
            let rate = self.schedule.rate(strand);
            let count = self
                .store
                .decay_engrams(owner_id, strand, rate, self.schedule.min_signal)
                .await?;
            affected += count;
            strands.push(StrandDecay {
                strand,
                rate,
                affected: count,
            });
        }

        tracing::debug!(owner_id, affected, "decay cycle complete");
        Ok(DecayReport { affected, strands })
    }
}
