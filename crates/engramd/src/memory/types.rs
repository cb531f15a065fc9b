//! Core entity types for the memory engine.
//!
//! Four persisted entities: engrams (atomic memory units), synapses
//! (directed weighted associations between engrams), chronicles
//! (bitemporal entity-attribute-value assertions), and nexuses (typed
//! links between chronicles). Every entity is owned by exactly one
//! tenant and all queries are owner-scoped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Free-form metadata attached to engrams, chronicles, and nexuses.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Coarse classification of an engram; drives its decay rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strand {
    /// Facts and knowledge
    Factual,
    /// What happened (events, episodes)
    Experiential,
    /// How to do things
    Procedural,
    /// Likes, dislikes, settings
    Preferential,
    /// People and relationships
    Relational,
    /// Unclassified
    General,
}

impl Strand {
    /// All strands, in decay-cycle iteration order.
    pub const ALL: [Strand; 6] = [
        Strand::Factual,
        Strand::Experiential,
        Strand::Procedural,
        Strand::Preferential,
        Strand::Relational,
        Strand::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Strand::Factual => "factual",
            Strand::Experiential => "experiential",
            Strand::Procedural => "procedural",
            Strand::Preferential => "preferential",
            Strand::Relational => "relational",
            Strand::General => "general",
        }
    }

    /// Parse a strand name. Unknown names return `None`; callers decide
    /// whether that is an error (API input) or a fallback to `General`
    /// (extractor output).
    pub fn parse(s: &str) -> Option<Strand> {
        match s.trim().to_lowercase().as_str() {
            "factual" => Some(Strand::Factual),
            "experiential" => Some(Strand::Experiential),
            "procedural" => Some(Strand::Procedural),
            "preferential" => Some(Strand::Preferential),
            "relational" => Some(Strand::Relational),
            "general" => Some(Strand::General),
            _ => None,
        }
    }
}

impl std::fmt::Display for Strand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An atomic memory unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Engram {
    /// Stable identifier
    pub id: Uuid,
    /// Tenant key; all access is scoped by it
    pub owner_id: String,
    /// The stored text
    pub content: String,
    /// SHA-256 hex digest of `content`; unique per owner
    pub content_hash: String,
    /// Classification driving decay
    pub strand: Strand,
    /// Ordered list of short labels
    pub tags: Vec<String>,
    /// Free-form caller metadata
    pub metadata: Metadata,
    /// Dense vector of the store's fixed dimension
    pub embedding: Vec<f32>,
    /// Importance in [0, 1]; raised by reinforcement, lowered by decay
    pub signal: f32,
    /// Reserved decay modifier in [0, 1]; stored but not consulted by the
    /// default decay schedule
    pub pulse_rate: f32,
    /// How many times this engram has been returned or touched
    pub access_count: u32,
    /// Strictly increases on every update
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
}

impl Engram {
    /// Create a new engram with ingestion defaults.
    pub fn new(
        owner_id: impl Into<String>,
        content: impl Into<String>,
        content_hash: impl Into<String>,
        strand: Strand,
        embedding: Vec<f32>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner_id: owner_id.into(),
            content: content.into(),
            content_hash: content_hash.into(),
            strand,
            tags: Vec::new(),
            metadata: Metadata::new(),
            embedding,
            signal: 0.5,
            pulse_rate: 0.1,
            access_count: 0,
            version: 1,
            created_at: now,
            updated_at: now,
            last_accessed_at: now,
        }
    }

    /// Clamp the signal into [0, 1]. Applied at every write.
    pub fn set_signal(&mut self, signal: f32) {
        self.signal = signal.clamp(0.0, 1.0);
    }

    /// Stamp an access: bumps the count and timestamp without touching
    /// the signal.
    pub fn mark_accessed(&mut self) {
        self.access_count += 1;
        self.last_accessed_at = Utc::now();
    }
}

/// A directed weighted association between two engrams of the same owner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Synapse {
    pub source_id: Uuid,
    pub target_id: Uuid,
    pub owner_id: String,
    /// Association strength in (0, 1]
    pub weight: f32,
    pub formed_at: DateTime<Utc>,
    pub reinforced_at: DateTime<Utc>,
}

impl Synapse {
    pub fn new(owner_id: impl Into<String>, source_id: Uuid, target_id: Uuid, weight: f32) -> Self {
        let now = Utc::now();
        Self {
            source_id,
            target_id,
            owner_id: owner_id.into(),
            weight: weight.clamp(f32::EPSILON, 1.0),
            formed_at: now,
            reinforced_at: now,
        }
    }
}

/// A bitemporal entity-attribute-value assertion.
///
/// `effective_from`/`effective_until` bound when the fact held in the
/// world; `recorded_at` is when the system learned it. An open
/// `effective_until` (`None`) marks the current value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chronicle {
    pub id: Uuid,
    pub owner_id: String,
    pub entity: String,
    pub attribute: String,
    pub value: String,
    /// Confidence in [0, 1]
    pub certainty: f32,
    pub effective_from: DateTime<Utc>,
    pub effective_until: Option<DateTime<Utc>>,
    pub recorded_at: DateTime<Utc>,
    pub metadata: Metadata,
}

impl Chronicle {
    pub fn new(
        owner_id: impl Into<String>,
        entity: impl Into<String>,
        attribute: impl Into<String>,
        value: impl Into<String>,
        effective_from: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id: owner_id.into(),
            entity: entity.into(),
            attribute: attribute.into(),
            value: value.into(),
            certainty: 1.0,
            effective_from,
            effective_until: None,
            recorded_at: Utc::now(),
            metadata: Metadata::new(),
        }
    }

    /// Whether this chronicle held at instant `at`: effective on or
    /// before it, and not yet expired (strict inequality on expiry).
    pub fn valid_at(&self, at: DateTime<Utc>) -> bool {
        self.effective_from <= at && self.effective_until.map_or(true, |until| until > at)
    }

    /// Whether this chronicle is currently open (no expiry recorded).
    pub fn is_current(&self) -> bool {
        self.effective_until.is_none()
    }
}

/// A typed directional link between two chronicles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Nexus {
    pub id: Uuid,
    pub owner_id: String,
    pub origin_id: Uuid,
    pub linked_id: Uuid,
    /// Free-form short string; conventional values include
    /// `superseded_by`, `caused_by`, `related_to`
    pub bond_type: String,
    /// Link strength in [0, 1]
    pub strength: f32,
    pub effective_from: DateTime<Utc>,
    pub effective_until: Option<DateTime<Utc>>,
    pub metadata: Metadata,
}

impl Nexus {
    pub fn new(
        owner_id: impl Into<String>,
        origin_id: Uuid,
        linked_id: Uuid,
        bond_type: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id: owner_id.into(),
            origin_id,
            linked_id,
            bond_type: bond_type.into(),
            strength: 1.0,
            effective_from: Utc::now(),
            effective_until: None,
            metadata: Metadata::new(),
        }
    }
}
