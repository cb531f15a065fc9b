//! Bitemporal chronicle service.
//!
//! Chronicles assert that an entity's attribute held a value over an
//! effective interval. Recording a new value for a tuple that already
//! has a current chronicle expires the old one first, so each
//! `(owner, entity, attribute)` has at most one open value at any
//! instant. Nexuses link chronicles to each other (supersession,
//! causation, plain relatedness).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{EngineError, Result};
use crate::memory::types::{Chronicle, Metadata, Nexus};
use crate::storage::{ChroniclePatch, ChronicleQuery, MemoryStore};

/// Inputs for recording a fact.
#[derive(Debug, Clone, Default)]
pub struct RecordFact {
    pub entity: String,
    pub attribute: String,
    pub value: String,
    pub certainty: Option<f32>,
    /// When omitted, the service supersedes the current chronicle for
    /// the tuple and starts the new one now.
    pub effective_from: Option<DateTime<Utc>>,
    pub effective_until: Option<DateTime<Utc>>,
    pub metadata: Option<Metadata>,
}

/// Inputs for linking two chronicles.
#[derive(Debug, Clone)]
pub struct LinkChronicles {
    pub origin_id: Uuid,
    pub linked_id: Uuid,
    pub bond_type: String,
    pub strength: Option<f32>,
    pub metadata: Option<Metadata>,
}

/// Chronicle recording and querying over the shared store.
pub struct TemporalService {
    store: Arc<dyn MemoryStore>,
}

impl TemporalService {
    pub fn new(store: Arc<dyn MemoryStore>) -> Self {
        Self { store }
    }

    /// Record a fact, superseding the tuple's current chronicle when no
    /// explicit `effective_from` is given.
    pub async fn record_fact(&self, owner_id: &str, fact: RecordFact) -> Result<Chronicle> {
        if fact.entity.trim().is_empty() || fact.attribute.trim().is_empty() {
            return Err(EngineError::Validation(
                "entity and attribute must not be empty".to_string(),
            ));
        }

        let effective_from = match fact.effective_from {
            Some(from) => from,
            None => {
                let now = Utc::now();
                if let Some(current) = self
                    .store
                    .get_current_fact(owner_id, &fact.entity, &fact.attribute)
                    .await?
                {
                    self.store
                        .update_chronicle(
                            owner_id,
                            current.id,
                            ChroniclePatch {
                                effective_until: Some(Some(now)),
                                ..Default::default()
                            },
                        )
                        .await?;
                    tracing::debug!(
                        owner_id,
                        entity = %fact.entity,
                        attribute = %fact.attribute,
                        "superseded current chronicle"
                    );
                }
                now
            }
        };

        let mut chronicle = Chronicle::new(
            owner_id,
            fact.entity,
            fact.attribute,
            fact.value,
            effective_from,
        );
        if let Some(certainty) = fact.certainty {
            chronicle.certainty = certainty.clamp(0.0, 1.0);
        }
        chronicle.effective_until = fact.effective_until;
        if let Some(metadata) = fact.metadata {
            chronicle.metadata = metadata;
        }

        self.store.create_chronicle(chronicle).await
    }

    /// General query; see [`ChronicleQuery`] for the matching rules.
    pub async fn query(&self, owner_id: &str, query: &ChronicleQuery) -> Result<Vec<Chronicle>> {
        self.store.query_chronicles(owner_id, query).await
    }

    /// The single current value for a tuple, if any.
    pub async fn current_fact(
        &self,
        owner_id: &str,
        entity: &str,
        attribute: &str,
    ) -> Result<Option<Chronicle>> {
        self.store.get_current_fact(owner_id, entity, attribute).await
    }

    /// All currently open chronicles for the owner.
    pub async fn current_chronicles(&self, owner_id: &str) -> Result<Vec<Chronicle>> {
        self.store.get_current_chronicles(owner_id).await
    }

    /// Full history of an entity, oldest first.
    pub async fn timeline(&self, owner_id: &str, entity: &str) -> Result<Vec<Chronicle>> {
        self.store.get_timeline(owner_id, entity).await
    }

    /// Soft expiry: closes the chronicle's interval iff still open.
    pub async fn expire(&self, owner_id: &str, id: Uuid) -> Result<Chronicle> {
        self.store.delete_chronicle(owner_id, id).await
    }

    /// Create a typed directed link between two chronicles.
    pub async fn link(&self, owner_id: &str, link: LinkChronicles) -> Result<Nexus> {
        if link.bond_type.trim().is_empty() {
            return Err(EngineError::Validation(
                "bond_type must not be empty".to_string(),
            ));
        }
        let mut nexus = Nexus::new(owner_id, link.origin_id, link.linked_id, link.bond_type);
        if let Some(strength) = link.strength {
            nexus.strength = strength.clamp(0.0, 1.0);
        }
        if let Some(metadata) = link.metadata {
            nexus.metadata = metadata;
        }
        self.store.create_nexus(nexus).await
    }

    /// Chronicles reachable through any nexus touching the id, in either
    /// direction, excluding the id itself.
    pub async fn related(&self, owner_id: &str, id: Uuid) -> Result<Vec<Chronicle>> {
        self.store.get_related_chronicles(owner_id, id).await
    }
}
