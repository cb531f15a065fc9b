//! Storage contract consumed by the engine.
//!
//! The engine owns no persistent state beyond this trait: the embedded
//! snapshot driver ships in-tree, and remote SQL/vector backends are
//! external implementations injected at construction time.

pub mod embedded;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::memory::types::{Chronicle, Engram, Nexus, Strand, Synapse};

pub use embedded::EmbeddedStore;

/// A vector-search hit: the engram plus its similarity score in [0, 1]
/// (cosine mapped through `(1 + cos) / 2`).
#[derive(Debug, Clone)]
pub struct VectorMatch {
    pub engram: Engram,
    pub score: f32,
}

/// Partial update for an engram. `None` fields are left untouched.
///
/// A content change must carry the re-computed hash and embedding; the
/// store does not re-derive them.
#[derive(Debug, Clone, Default)]
pub struct EngramPatch {
    pub content: Option<String>,
    pub content_hash: Option<String>,
    pub embedding: Option<Vec<f32>>,
    pub strand: Option<Strand>,
    pub tags: Option<Vec<String>>,
    pub metadata: Option<crate::memory::types::Metadata>,
    pub signal: Option<f32>,
    pub pulse_rate: Option<f32>,
}

/// Partial update for a chronicle. The nested option on
/// `effective_until` distinguishes "leave alone" from "set to a value or
/// clear".
#[derive(Debug, Clone, Default)]
pub struct ChroniclePatch {
    pub value: Option<String>,
    pub certainty: Option<f32>,
    pub metadata: Option<crate::memory::types::Metadata>,
    pub effective_until: Option<Option<DateTime<Utc>>>,
}

/// Chronicle query: any subset of the fields narrows the result.
///
/// `at` selects chronicles valid at that instant; `from`/`to` bound
/// `effective_from` with half-open semantics. Results come back ordered
/// by `effective_from` descending.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChronicleQuery {
    pub entity: Option<String>,
    pub attribute: Option<String>,
    pub at: Option<DateTime<Utc>>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

/// Aggregate counts reported by `get_stats`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreStats {
    pub engrams: usize,
    pub synapses: usize,
    pub chronicles: usize,
    pub nexuses: usize,
    pub owners: usize,
    pub dimension: usize,
}

/// Narrow storage contract covering engrams, synapses, chronicles, and
/// nexuses.
///
/// Implementations must be internally thread-safe; the engine shares one
/// instance across all requests. Scores returned by `vector_search` are
/// in [0, 1] descending; `list_engrams` is most-recent-first.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    async fn initialize(&self) -> Result<()>;
    async fn close(&self) -> Result<()>;
    async fn health_check(&self) -> Result<bool>;

    // Engrams

    /// Insert a new engram. Fails if `(owner_id, content_hash)` already
    /// exists; the dedup stage normally prevents that, the constraint
    /// backstops concurrent ingestion races.
    async fn create_engram(&self, engram: Engram) -> Result<Engram>;
    async fn get_engram(&self, owner_id: &str, id: Uuid) -> Result<Option<Engram>>;
    async fn update_engram(&self, owner_id: &str, id: Uuid, patch: EngramPatch) -> Result<Engram>;
    /// Hard delete; synapses touching the engram are cascade-deleted.
    async fn delete_engram(&self, owner_id: &str, id: Uuid) -> Result<()>;
    async fn list_engrams(
        &self,
        owner_id: &str,
        limit: usize,
        offset: usize,
        strand: Option<Strand>,
    ) -> Result<Vec<Engram>>;
    async fn find_by_content_hash(&self, owner_id: &str, hash: &str) -> Result<Option<Engram>>;
    async fn vector_search(
        &self,
        owner_id: &str,
        embedding: &[f32],
        limit: usize,
        strand: Option<Strand>,
    ) -> Result<Vec<VectorMatch>>;
    /// `signal <- min(signal + boost, 1.0)`.
    async fn reinforce_engram(&self, owner_id: &str, id: Uuid, boost: f32) -> Result<Engram>;
    /// Apply `signal <- max(signal * rate, min_signal)` to every engram
    /// of the strand with `signal > min_signal`. Returns the affected
    /// count.
    async fn decay_engrams(
        &self,
        owner_id: &str,
        strand: Strand,
        rate: f32,
        min_signal: f32,
    ) -> Result<usize>;
    /// Bump `access_count` and `last_accessed_at` without touching the
    /// signal.
    async fn record_access(&self, owner_id: &str, id: Uuid) -> Result<()>;

    // Synapses

    /// Upsert: a new pair is inserted as given; an existing pair's weight
    /// saturates at `min(weight + new_weight, 1.0)` and its
    /// `reinforced_at` advances.
    async fn create_synapse(&self, synapse: Synapse) -> Result<Synapse>;
    async fn get_synapses_from(&self, owner_id: &str, source_id: Uuid) -> Result<Vec<Synapse>>;
    /// Directed lookup of the synapse `source -> target`.
    async fn get_synapses_between(
        &self,
        owner_id: &str,
        source_id: Uuid,
        target_id: Uuid,
    ) -> Result<Option<Synapse>>;
    async fn reinforce_synapse(
        &self,
        owner_id: &str,
        source_id: Uuid,
        target_id: Uuid,
        boost: f32,
    ) -> Result<()>;

    // Chronicles

    async fn create_chronicle(&self, chronicle: Chronicle) -> Result<Chronicle>;
    async fn get_chronicle(&self, owner_id: &str, id: Uuid) -> Result<Option<Chronicle>>;
    async fn update_chronicle(
        &self,
        owner_id: &str,
        id: Uuid,
        patch: ChroniclePatch,
    ) -> Result<Chronicle>;
    /// Soft delete: sets `effective_until` to now iff the chronicle is
    /// currently open, and returns the (possibly unchanged) record.
    async fn delete_chronicle(&self, owner_id: &str, id: Uuid) -> Result<Chronicle>;
    async fn query_chronicles(
        &self,
        owner_id: &str,
        query: &ChronicleQuery,
    ) -> Result<Vec<Chronicle>>;
    /// The single open chronicle for `(owner, entity, attribute)`, if any.
    async fn get_current_fact(
        &self,
        owner_id: &str,
        entity: &str,
        attribute: &str,
    ) -> Result<Option<Chronicle>>;
    /// All currently open chronicles for the owner.
    async fn get_current_chronicles(&self, owner_id: &str) -> Result<Vec<Chronicle>>;
    /// All chronicles for `(owner, entity)`, `effective_from` ascending.
    async fn get_timeline(&self, owner_id: &str, entity: &str) -> Result<Vec<Chronicle>>;

    // Nexuses

    async fn create_nexus(&self, nexus: Nexus) -> Result<Nexus>;
    /// Chronicles reachable through either direction of any nexus
    /// touching `id`, excluding `id` itself, deduplicated.
    async fn get_related_chronicles(&self, owner_id: &str, id: Uuid) -> Result<Vec<Chronicle>>;

    async fn get_stats(&self) -> Result<StoreStats>;
}
