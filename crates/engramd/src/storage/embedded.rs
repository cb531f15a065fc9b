//! Embedded in-process storage driver.
//!
//! Keeps all four tables in memory behind a single `RwLock` and
//! optionally persists them as a JSON snapshot file: `initialize` loads
//! the snapshot if one exists, `close` writes it back. Vector search is
//! a sequential scan with full cosine against every candidate, which the
//! store contract explicitly permits; swap in a SQL+vector driver behind
//! the same trait when the corpus outgrows a scan.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::math::{cosine_similarity, cosine_to_unit};
use crate::memory::types::{Chronicle, Engram, Nexus, Strand, Synapse};
use crate::storage::{
    ChroniclePatch, ChronicleQuery, EngramPatch, MemoryStore, StoreStats, VectorMatch,
};

#[derive(Default)]
struct Tables {
    engrams: HashMap<Uuid, Engram>,
    synapses: HashMap<(Uuid, Uuid), Synapse>,
    chronicles: HashMap<Uuid, Chronicle>,
    nexuses: Vec<Nexus>,
}

/// On-disk snapshot layout. Maps are flattened to vectors so the file is
/// plain JSON.
#[derive(Serialize, Deserialize, Default)]
struct Snapshot {
    dimension: usize,
    engrams: Vec<Engram>,
    synapses: Vec<Synapse>,
    chronicles: Vec<Chronicle>,
    nexuses: Vec<Nexus>,
}

/// In-process store with optional JSON snapshot persistence.
pub struct EmbeddedStore {
    dimension: usize,
    snapshot_path: Option<PathBuf>,
    tables: RwLock<Tables>,
}

impl EmbeddedStore {
    /// Purely in-memory store; nothing survives the process.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            snapshot_path: None,
            tables: RwLock::new(Tables::default()),
        }
    }

    /// Store backed by a snapshot file under the data directory.
    pub fn with_snapshot(dimension: usize, snapshot_path: PathBuf) -> Self {
        Self {
            dimension,
            snapshot_path: Some(snapshot_path),
            tables: RwLock::new(Tables::default()),
        }
    }

    /// The embedding dimension fixed at store creation.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn check_dimension(&self, embedding: &[f32]) -> Result<()> {
        if embedding.len() != self.dimension {
            return Err(EngineError::Validation(format!(
                "embedding dimension {} does not match store dimension {}",
                embedding.len(),
                self.dimension
            )));
        }
        Ok(())
    }

    /// Engrams of one owner in deterministic order (`created_at`, id as
    /// tie-break). Every scan starts from this so stable re-sorts keep a
    /// reproducible order.
    fn owner_engrams(tables: &Tables, owner_id: &str, strand: Option<Strand>) -> Vec<Engram> {
        let mut engrams: Vec<Engram> = tables
            .engrams
            .values()
            .filter(|e| e.owner_id == owner_id && strand.map_or(true, |s| e.strand == s))
            .cloned()
            .collect();
        engrams.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        engrams
    }

    fn owner_chronicles(tables: &Tables, owner_id: &str) -> Vec<Chronicle> {
        let mut chronicles: Vec<Chronicle> = tables
            .chronicles
            .values()
            .filter(|c| c.owner_id == owner_id)
            .cloned()
            .collect();
        chronicles.sort_by(|a, b| a.recorded_at.cmp(&b.recorded_at).then(a.id.cmp(&b.id)));
        chronicles
    }
}

#[async_trait]
impl MemoryStore for EmbeddedStore {
    async fn initialize(&self) -> Result<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };
        if !path.exists() {
            return Ok(());
        }

        let raw = std::fs::read_to_string(path)?;
        let snapshot: Snapshot = serde_json::from_str(&raw)?;
        if snapshot.dimension != self.dimension {
            return Err(EngineError::Store(format!(
                "snapshot dimension {} does not match configured dimension {}",
                snapshot.dimension, self.dimension
            )));
        }

        let mut tables = self.tables.write().await;
        tables.engrams = snapshot.engrams.into_iter().map(|e| (e.id, e)).collect();
        tables.synapses = snapshot
            .synapses
            .into_iter()
            .map(|s| ((s.source_id, s.target_id), s))
            .collect();
        tables.chronicles = snapshot.chronicles.into_iter().map(|c| (c.id, c)).collect();
        tables.nexuses = snapshot.nexuses;

        // Snapshot hygiene: drop nexuses whose endpoint chronicles are
        // gone (cascade-delete invariant for drivers that hard-delete).
        let chronicle_ids: std::collections::HashSet<Uuid> =
            tables.chronicles.keys().copied().collect();
        tables
            .nexuses
            .retain(|n| chronicle_ids.contains(&n.origin_id) && chronicle_ids.contains(&n.linked_id));

        tracing::info!(
            engrams = tables.engrams.len(),
            chronicles = tables.chronicles.len(),
            "loaded store snapshot"
        );
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let tables = self.tables.read().await;
        let snapshot = Snapshot {
            dimension: self.dimension,
            engrams: tables.engrams.values().cloned().collect(),
            synapses: tables.synapses.values().cloned().collect(),
            chronicles: tables.chronicles.values().cloned().collect(),
            nexuses: tables.nexuses.clone(),
        };
        let raw = serde_json::to_string(&snapshot)?;
        std::fs::write(path, raw)?;
        tracing::info!(path = %path.display(), "wrote store snapshot");
        Ok(())
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    async fn create_engram(&self, mut engram: Engram) -> Result<Engram> {
        self.check_dimension(&engram.embedding)?;
        engram.set_signal(engram.signal);
        engram.pulse_rate = engram.pulse_rate.clamp(0.0, 1.0);

        let mut tables = self.tables.write().await;
        let conflict = tables
            .engrams
            .values()
            .any(|e| e.owner_id == engram.owner_id && e.content_hash == engram.content_hash);
        if conflict {
            return Err(EngineError::Store(format!(
                "engram with content hash {} already exists for owner",
                engram.content_hash
            )));
        }
        tables.engrams.insert(engram.id, engram.clone());
        Ok(engram)
    }

    async fn get_engram(&self, owner_id: &str, id: Uuid) -> Result<Option<Engram>> {
        let tables = self.tables.read().await;
        Ok(tables
            .engrams
            .get(&id)
            .filter(|e| e.owner_id == owner_id)
            .cloned())
    }

    async fn update_engram(&self, owner_id: &str, id: Uuid, patch: EngramPatch) -> Result<Engram> {
        if let Some(embedding) = &patch.embedding {
            self.check_dimension(embedding)?;
        }

        let mut tables = self.tables.write().await;
        let engram = tables
            .engrams
            .get_mut(&id)
            .filter(|e| e.owner_id == owner_id)
            .ok_or_else(|| EngineError::NotFound(format!("engram {id}")))?;

        if let Some(content) = patch.content {
            engram.content = content;
        }
        if let Some(hash) = patch.content_hash {
            engram.content_hash = hash;
        }
        if let Some(embedding) = patch.embedding {
            engram.embedding = embedding;
        }
        if let Some(strand) = patch.strand {
            engram.strand = strand;
        }
        if let Some(tags) = patch.tags {
            engram.tags = tags;
        }
        if let Some(metadata) = patch.metadata {
            engram.metadata = metadata;
        }
        if let Some(signal) = patch.signal {
            engram.set_signal(signal);
        }
        if let Some(pulse_rate) = patch.pulse_rate {
            engram.pulse_rate = pulse_rate.clamp(0.0, 1.0);
        }
        engram.version += 1;
        engram.updated_at = Utc::now();
        Ok(engram.clone())
    }

    async fn delete_engram(&self, owner_id: &str, id: Uuid) -> Result<()> {
        let mut tables = self.tables.write().await;
        let existed = tables
            .engrams
            .get(&id)
            .map_or(false, |e| e.owner_id == owner_id);
        if !existed {
            return Err(EngineError::NotFound(format!("engram {id}")));
        }
        tables.engrams.remove(&id);
        tables
            .synapses
            .retain(|(source, target), _| *source != id && *target != id);
        Ok(())
    }

    async fn list_engrams(
        &self,
        owner_id: &str,
        limit: usize,
        offset: usize,
        strand: Option<Strand>,
    ) -> Result<Vec<Engram>> {
        let tables = self.tables.read().await;
        let mut engrams = Self::owner_engrams(&tables, owner_id, strand);
        engrams.reverse(); // most-recent-first
        Ok(engrams.into_iter().skip(offset).take(limit).collect())
    }

    async fn find_by_content_hash(&self, owner_id: &str, hash: &str) -> Result<Option<Engram>> {
        let tables = self.tables.read().await;
        Ok(Self::owner_engrams(&tables, owner_id, None)
            .into_iter()
            .find(|e| e.content_hash == hash))
    }

    async fn vector_search(
        &self,
        owner_id: &str,
        embedding: &[f32],
        limit: usize,
        strand: Option<Strand>,
    ) -> Result<Vec<VectorMatch>> {
        self.check_dimension(embedding)?;
        let tables = self.tables.read().await;
        let mut matches: Vec<VectorMatch> = Self::owner_engrams(&tables, owner_id, strand)
            .into_iter()
            .map(|engram| {
                let score = cosine_to_unit(cosine_similarity(embedding, &engram.embedding));
                VectorMatch { engram, score }
            })
            .collect();
        matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        matches.truncate(limit);
        Ok(matches)
    }

    async fn reinforce_engram(&self, owner_id: &str, id: Uuid, boost: f32) -> Result<Engram> {
        let mut tables = self.tables.write().await;
        let engram = tables
            .engrams
            .get_mut(&id)
            .filter(|e| e.owner_id == owner_id)
            .ok_or_else(|| EngineError::NotFound(format!("engram {id}")))?;
        engram.set_signal(engram.signal + boost);
        engram.version += 1;
        engram.updated_at = Utc::now();
        Ok(engram.clone())
    }

    async fn decay_engrams(
        &self,
        owner_id: &str,
        strand: Strand,
        rate: f32,
        min_signal: f32,
    ) -> Result<usize> {
        let mut tables = self.tables.write().await;
        let mut affected = 0;
        for engram in tables.engrams.values_mut() {
            if engram.owner_id != owner_id
                || engram.strand != strand
                || engram.signal <= min_signal
            {
                continue;
            }
            let decayed = (engram.signal * rate).max(min_signal);
            if (decayed - engram.signal).abs() > f32::EPSILON {
                engram.set_signal(decayed);
                engram.version += 1;
                engram.updated_at = Utc::now();
                affected += 1;
            }
        }
        Ok(affected)
    }

    async fn record_access(&self, owner_id: &str, id: Uuid) -> Result<()> {
        let mut tables = self.tables.write().await;
        let engram = tables
            .engrams
            .get_mut(&id)
            .filter(|e| e.owner_id == owner_id)
            .ok_or_else(|| EngineError::NotFound(format!("engram {id}")))?;
        engram.mark_accessed();
        Ok(())
    }

    async fn create_synapse(&self, synapse: Synapse) -> Result<Synapse> {
        if synapse.source_id == synapse.target_id {
            return Err(EngineError::Validation(
                "synapse endpoints must differ".to_string(),
            ));
        }

        let mut tables = self.tables.write().await;
        let key = (synapse.source_id, synapse.target_id);
        if let Some(existing) = tables.synapses.get_mut(&key) {
            existing.weight = (existing.weight + synapse.weight).min(1.0);
            existing.reinforced_at = Utc::now();
            return Ok(existing.clone());
        }
        tables.synapses.insert(key, synapse.clone());
        Ok(synapse)
    }

    async fn get_synapses_from(&self, owner_id: &str, source_id: Uuid) -> Result<Vec<Synapse>> {
        let tables = self.tables.read().await;
        let mut synapses: Vec<Synapse> = tables
            .synapses
            .values()
            .filter(|s| s.owner_id == owner_id && s.source_id == source_id)
            .cloned()
            .collect();
        synapses.sort_by(|a, b| a.formed_at.cmp(&b.formed_at).then(a.target_id.cmp(&b.target_id)));
        Ok(synapses)
    }

    async fn get_synapses_between(
        &self,
        owner_id: &str,
        source_id: Uuid,
        target_id: Uuid,
    ) -> Result<Option<Synapse>> {
        let tables = self.tables.read().await;
        Ok(tables
            .synapses
            .get(&(source_id, target_id))
            .filter(|s| s.owner_id == owner_id)
            .cloned())
    }

    async fn reinforce_synapse(
        &self,
        owner_id: &str,
        source_id: Uuid,
        target_id: Uuid,
        boost: f32,
    ) -> Result<()> {
        let mut tables = self.tables.write().await;
        let synapse = tables
            .synapses
            .get_mut(&(source_id, target_id))
            .filter(|s| s.owner_id == owner_id)
            .ok_or_else(|| {
                EngineError::NotFound(format!("synapse {source_id} -> {target_id}"))
            })?;
        synapse.weight = (synapse.weight + boost).min(1.0);
        synapse.reinforced_at = Utc::now();
        Ok(())
    }

    async fn create_chronicle(&self, mut chronicle: Chronicle) -> Result<Chronicle> {
        if let Some(until) = chronicle.effective_until {
            if chronicle.effective_from > until {
                return Err(EngineError::Validation(
                    "effective_from must not be after effective_until".to_string(),
                ));
            }
        }
        chronicle.certainty = chronicle.certainty.clamp(0.0, 1.0);

        let mut tables = self.tables.write().await;
        let conflict = tables.chronicles.values().any(|c| {
            c.owner_id == chronicle.owner_id
                && c.entity == chronicle.entity
                && c.attribute == chronicle.attribute
                && c.value == chronicle.value
                && c.effective_from == chronicle.effective_from
        });
        if conflict {
            return Err(EngineError::Store(
                "chronicle with identical assertion and effective_from already exists".to_string(),
            ));
        }
        tables.chronicles.insert(chronicle.id, chronicle.clone());
        Ok(chronicle)
    }

    async fn get_chronicle(&self, owner_id: &str, id: Uuid) -> Result<Option<Chronicle>> {
        let tables = self.tables.read().await;
        Ok(tables
            .chronicles
            .get(&id)
            .filter(|c| c.owner_id == owner_id)
            .cloned())
    }

    async fn update_chronicle(
        &self,
        owner_id: &str,
        id: Uuid,
        patch: ChroniclePatch,
    ) -> Result<Chronicle> {
        let mut tables = self.tables.write().await;
        let chronicle = tables
            .chronicles
            .get_mut(&id)
            .filter(|c| c.owner_id == owner_id)
            .ok_or_else(|| EngineError::NotFound(format!("chronicle {id}")))?;

        if let Some(value) = patch.value {
            chronicle.value = value;
        }
        if let Some(certainty) = patch.certainty {
            chronicle.certainty = certainty.clamp(0.0, 1.0);
        }
        if let Some(metadata) = patch.metadata {
            chronicle.metadata = metadata;
        }
        if let Some(effective_until) = patch.effective_until {
            if let Some(until) = effective_until {
                if chronicle.effective_from > until {
                    return Err(EngineError::Validation(
                        "effective_from must not be after effective_until".to_string(),
                    ));
                }
            }
            chronicle.effective_until = effective_until;
        }
        Ok(chronicle.clone())
    }

    async fn delete_chronicle(&self, owner_id: &str, id: Uuid) -> Result<Chronicle> {
        let mut tables = self.tables.write().await;
        let chronicle = tables
            .chronicles
            .get_mut(&id)
            .filter(|c| c.owner_id == owner_id)
            .ok_or_else(|| EngineError::NotFound(format!("chronicle {id}")))?;
        if chronicle.is_current() {
            chronicle.effective_until = Some(Utc::now());
        }
        Ok(chronicle.clone())
    }

    async fn query_chronicles(
        &self,
        owner_id: &str,
        query: &ChronicleQuery,
    ) -> Result<Vec<Chronicle>> {
        let tables = self.tables.read().await;
        let mut chronicles: Vec<Chronicle> = Self::owner_chronicles(&tables, owner_id)
            .into_iter()
            .filter(|c| {
                query.entity.as_deref().map_or(true, |e| c.entity == e)
                    && query.attribute.as_deref().map_or(true, |a| c.attribute == a)
                    && query.at.map_or(true, |at| c.valid_at(at))
                    && query.from.map_or(true, |from| c.effective_from >= from)
                    && query.to.map_or(true, |to| c.effective_from < to)
            })
            .collect();
        chronicles.sort_by(|a, b| b.effective_from.cmp(&a.effective_from));
        if let Some(limit) = query.limit {
            chronicles.truncate(limit);
        }
        Ok(chronicles)
    }

    async fn get_current_fact(
        &self,
        owner_id: &str,
        entity: &str,
        attribute: &str,
    ) -> Result<Option<Chronicle>> {
        let tables = self.tables.read().await;
        let mut current: Vec<Chronicle> = Self::owner_chronicles(&tables, owner_id)
            .into_iter()
            .filter(|c| c.entity == entity && c.attribute == attribute && c.is_current())
            .collect();
        current.sort_by(|a, b| b.effective_from.cmp(&a.effective_from));
        Ok(current.into_iter().next())
    }

    async fn get_current_chronicles(&self, owner_id: &str) -> Result<Vec<Chronicle>> {
        let tables = self.tables.read().await;
        let mut current: Vec<Chronicle> = Self::owner_chronicles(&tables, owner_id)
            .into_iter()
            .filter(|c| c.is_current())
            .collect();
        current.sort_by(|a, b| b.effective_from.cmp(&a.effective_from));
        Ok(current)
    }

    async fn get_timeline(&self, owner_id: &str, entity: &str) -> Result<Vec<Chronicle>> {
        let tables = self.tables.read().await;
        let mut timeline: Vec<Chronicle> = Self::owner_chronicles(&tables, owner_id)
            .into_iter()
            .filter(|c| c.entity == entity)
            .collect();
        timeline.sort_by(|a, b| a.effective_from.cmp(&b.effective_from));
        Ok(timeline)
    }

    async fn create_nexus(&self, mut nexus: Nexus) -> Result<Nexus> {
        nexus.strength = nexus.strength.clamp(0.0, 1.0);
        let mut tables = self.tables.write().await;
        for endpoint in [nexus.origin_id, nexus.linked_id] {
            let exists = tables
                .chronicles
                .get(&endpoint)
                .map_or(false, |c| c.owner_id == nexus.owner_id);
            if !exists {
                return Err(EngineError::NotFound(format!("chronicle {endpoint}")));
            }
        }
        tables.nexuses.push(nexus.clone());
        Ok(nexus)
    }

    async fn get_related_chronicles(&self, owner_id: &str, id: Uuid) -> Result<Vec<Chronicle>> {
        let tables = self.tables.read().await;
        let mut related_ids: Vec<Uuid> = Vec::new();
        for nexus in tables.nexuses.iter().filter(|n| n.owner_id == owner_id) {
            let other = if nexus.origin_id == id {
                nexus.linked_id
            } else if nexus.linked_id == id {
                nexus.origin_id
            } else {
                continue;
            };
            if other != id && !related_ids.contains(&other) {
                related_ids.push(other);
            }
        }
        Ok(related_ids
            .into_iter()
            .filter_map(|rid| {
                tables
                    .chronicles
                    .get(&rid)
                    .filter(|c| c.owner_id == owner_id)
                    .cloned()
            })
            .collect())
    }

    async fn get_stats(&self) -> Result<StoreStats> {
        let tables = self.tables.read().await;
        let owners: std::collections::HashSet<&str> = tables
            .engrams
            .values()
            .map(|e| e.owner_id.as_str())
            .chain(tables.chronicles.values().map(|c| c.owner_id.as_str()))
            .collect();
        Ok(StoreStats {
            engrams: tables.engrams.len(),
            synapses: tables.synapses.len(),
            chronicles: tables.chronicles.len(),
            nexuses: tables.nexuses.len(),
            owners: owners.len(),
            dimension: self.dimension,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engram(owner: &str, content: &str, embedding: Vec<f32>) -> Engram {
        Engram::new(owner, content, format!("hash-{content}"), Strand::General, embedding)
    }

    #[tokio::test]
    async fn create_rejects_dimension_mismatch() {
        let store = EmbeddedStore::new(4);
        let result = store.create_engram(engram("u", "content", vec![0.1; 3])).await;
        assert!(matches!(result, Err(EngineError::Validation(_))));
    }

    #[tokio::test]
    async fn content_hash_is_unique_per_owner() {
        let store = EmbeddedStore::new(2);
        store.create_engram(engram("u", "same", vec![0.1, 0.2])).await.unwrap();
        let result = store.create_engram(engram("u", "same", vec![0.3, 0.4])).await;
        assert!(matches!(result, Err(EngineError::Store(_))));

        // A different owner may reuse the hash.
        store.create_engram(engram("v", "same", vec![0.1, 0.2])).await.unwrap();
    }

    #[tokio::test]
    async fn delete_cascades_synapses() {
        let store = EmbeddedStore::new(2);
        let a = store.create_engram(engram("u", "a", vec![1.0, 0.0])).await.unwrap();
        let b = store.create_engram(engram("u", "b", vec![0.0, 1.0])).await.unwrap();
        store
            .create_synapse(Synapse::new("u", a.id, b.id, 0.5))
            .await
            .unwrap();

        store.delete_engram("u", a.id).await.unwrap();
        assert!(store
            .get_synapses_between("u", a.id, b.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn owner_scoping_hides_foreign_rows() {
        let store = EmbeddedStore::new(2);
        let mine = store.create_engram(engram("u", "mine", vec![1.0, 0.0])).await.unwrap();
        assert!(store.get_engram("other", mine.id).await.unwrap().is_none());
        assert!(store.get_engram("u", mine.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn vector_search_orders_by_mapped_score() {
        let store = EmbeddedStore::new(2);
        store.create_engram(engram("u", "east", vec![1.0, 0.0])).await.unwrap();
        store.create_engram(engram("u", "north", vec![0.0, 1.0])).await.unwrap();

        let matches = store.vector_search("u", &[1.0, 0.0], 10, None).await.unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].engram.content, "east");
        assert!((matches[0].score - 1.0).abs() < 1e-6);
        // Orthogonal vector maps to 0.5 under (1 + cos) / 2.
        assert!((matches[1].score - 0.5).abs() < 1e-6);
    }

    #[tokio::test]
    async fn update_bumps_version() {
        let store = EmbeddedStore::new(2);
        let e = store.create_engram(engram("u", "v1", vec![1.0, 0.0])).await.unwrap();
        let patch = EngramPatch {
            tags: Some(vec!["tag".to_string()]),
            ..Default::default()
        };
        let updated = store.update_engram("u", e.id, patch).await.unwrap();
        assert_eq!(updated.version, 2);
        assert_eq!(updated.tags, vec!["tag".to_string()]);
    }
}
