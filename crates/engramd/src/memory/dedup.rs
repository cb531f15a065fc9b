//! Content-addressed deduplication.
//!
//! Two stages against the owner's existing engrams: an exact SHA-256
//! content-hash lookup, then a near-duplicate check over the top vector
//! neighbors with full cosine similarity. Ingestion reinforces a matched
//! engram instead of inserting a twin.

use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::math::cosine_similarity;
use crate::memory::types::Engram;
use crate::storage::MemoryStore;

/// Cosine similarity at or above which a neighbor counts as a duplicate.
pub const SEMANTIC_DUPLICATE_THRESHOLD: f32 = 0.92;

/// How many vector neighbors the semantic stage inspects.
const NEIGHBOR_LIMIT: usize = 5;

/// SHA-256 hex digest of engram content; stable per owner.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// An existing engram the new content collapsed onto.
#[derive(Debug, Clone)]
pub struct DuplicateMatch {
    pub engram: Engram,
    /// 1.0 for exact hash hits, cosine similarity otherwise
    pub similarity: f32,
}

/// Two-stage duplicate detector.
pub struct Deduplicator {
    store: Arc<dyn MemoryStore>,
    threshold: f32,
}

impl Deduplicator {
    pub fn new(store: Arc<dyn MemoryStore>) -> Self {
        Self {
            store,
            threshold: SEMANTIC_DUPLICATE_THRESHOLD,
        }
    }

    pub fn with_threshold(store: Arc<dyn MemoryStore>, threshold: f32) -> Self {
        Self { store, threshold }
    }

    /// Check new content against the owner's engrams. The first match
    /// wins; exact hash hits short-circuit the vector stage.
    pub async fn check(
        &self,
        owner_id: &str,
        content: &str,
        embedding: &[f32],
    ) -> Result<Option<DuplicateMatch>> {
        let hash = content_hash(content);
        if let Some(engram) = self.store.find_by_content_hash(owner_id, &hash).await? {
            return Ok(Some(DuplicateMatch {
                engram,
                similarity: 1.0,
            }));
        }

        let neighbors = self
            .store
            .vector_search(owner_id, embedding, NEIGHBOR_LIMIT, None)
            .await?;
        for neighbor in neighbors {
            let similarity = cosine_similarity(embedding, &neighbor.engram.embedding);
            if similarity >= self.threshold {
                return Ok(Some(DuplicateMatch {
                    engram: neighbor.engram,
                    similarity,
                }));
            }
        }
        Ok(None)
    }
}
