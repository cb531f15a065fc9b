//! The association engine: synapse formation, path reinforcement, and
//! graph expansion.
//!
//! Synapses form automatically when one ingestion yields several engrams
//! and strengthen whenever the same pairing recurs. Retrieval walks the
//! graph breadth-first from its top vector hits to boost associatively
//! connected engrams.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use uuid::Uuid;

use crate::error::Result;
use crate::memory::signal::DEFAULT_SYNAPSE_BOOST;
use crate::memory::types::Synapse;
use crate::storage::MemoryStore;

/// Initial weight for a newly formed synapse.
pub const FORMATION_WEIGHT: f32 = 0.5;

/// Default breadth-first expansion depth.
pub const DEFAULT_MAX_DEPTH: usize = 2;

/// Per-hop attenuation applied to expansion boosts.
pub const DEFAULT_DECAY_FACTOR: f32 = 0.8;

/// Synapse graph operations over the shared store.
pub struct AssociationEngine {
    store: Arc<dyn MemoryStore>,
}

impl AssociationEngine {
    pub fn new(store: Arc<dyn MemoryStore>) -> Self {
        Self { store }
    }

    /// Form synapses between every unordered pair of the given engrams,
    /// in emission order (earlier engram becomes the source). Upsert
    /// semantics: an existing pair saturates toward weight 1 instead of
    /// duplicating.
    pub async fn form(&self, owner_id: &str, engram_ids: &[Uuid]) -> Result<Vec<Synapse>> {
        let mut formed = Vec::new();
        for (i, source) in engram_ids.iter().enumerate() {
            for target in &engram_ids[i + 1..] {
                if source == target {
                    continue;
                }
                let synapse = self
                    .store
                    .create_synapse(Synapse::new(owner_id, *source, *target, FORMATION_WEIGHT))
                    .await?;
                formed.push(synapse);
            }
        }
        Ok(formed)
    }

    /// Reinforce each directed synapse along an ordered path of engram
    /// ids. Missing synapses are skipped silently.
    pub async fn reinforce_path(&self, owner_id: &str, path: &[Uuid]) -> Result<usize> {
        let mut reinforced = 0;
        for pair in path.windows(2) {
            let (source, target) = (pair[0], pair[1]);
            if self
                .store
                .get_synapses_between(owner_id, source, target)
                .await?
                .is_none()
            {
                continue;
            }
            self.store
                .reinforce_synapse(owner_id, source, target, DEFAULT_SYNAPSE_BOOST)
                .await?;
            reinforced += 1;
        }
        Ok(reinforced)
    }

    /// Breadth-first expansion along outgoing synapses.
    ///
    /// Each discovered engram gets `boost = parent_boost * weight *
    /// decay_factor`. A node is visited at most once and its
    /// first-assigned boost stands; seeds are never emitted.
    pub async fn expand(
        &self,
        owner_id: &str,
        seeds: &[Uuid],
        max_depth: usize,
        decay_factor: f32,
    ) -> Result<HashMap<Uuid, f32>> {
        let mut boosts: HashMap<Uuid, f32> = HashMap::new();
        let mut visited: HashSet<Uuid> = seeds.iter().copied().collect();
        let mut frontier: Vec<(Uuid, f32)> = seeds.iter().map(|id| (*id, 1.0)).collect();

        for _ in 0..max_depth {
            let mut next = Vec::new();
            for (id, parent_boost) in frontier {
                for synapse in self.store.get_synapses_from(owner_id, id).await? {
                    if !visited.insert(synapse.target_id) {
                        continue;
                    }
                    let boost = parent_boost * synapse.weight * decay_factor;
                    boosts.insert(synapse.target_id, boost);
                    next.push((synapse.target_id, boost));
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }
        Ok(boosts)
    }
}
