//! Embedding providers.
//!
//! The engine only sees the `Embedder` trait; which backend fills it is a
//! configuration choice. The hash embedder is a first-class local
//! variant, not a mock: it is deterministic and dependency-free, which is
//! exactly what development and test environments want.

pub mod remote;

use async_trait::async_trait;

use crate::error::Result;

pub use remote::RemoteEmbedder;

/// Contract for embedding backends.
///
/// Vectors returned by one backend must always have the same length,
/// equal to `dimension()`, and the same text must embed to the same
/// vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch; the output is aligned with the input.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }

    /// The fixed output dimension.
    fn dimension(&self) -> usize;

    /// Backend name for logging.
    fn name(&self) -> &'static str;
}

/// Deterministic local embedder.
///
/// Seeds a splitmix-style generator from a hash of each token and
/// accumulates per-token pseudo-random unit-range vectors, so texts
/// sharing words land near each other while remaining fully
/// reproducible without any model weights.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn token_seed(token: &str) -> u64 {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        token.hash(&mut hasher);
        hasher.finish()
    }

    fn token_vector(&self, seed: u64) -> Vec<f32> {
        (0..self.dimension)
            .map(|i| {
                let x = seed
                    .wrapping_mul(i as u64 + 1)
                    .wrapping_add(0x9e37_79b9_7f4a_7c15);
                let normalized = (x as f32) / (u64::MAX as f32);
                normalized * 2.0 - 1.0
            })
            .collect()
    }

    fn embed_sync(&self, text: &str) -> Vec<f32> {
        let tokens = crate::text::tokenize(text);
        let mut vector = vec![0.0f32; self.dimension];

        if tokens.is_empty() {
            // Fall back to hashing the raw text so even stopword-only
            // inputs embed consistently.
            let fallback = self.token_vector(Self::token_seed(text));
            vector.copy_from_slice(&fallback);
        } else {
            for token in &tokens {
                let token_vec = self.token_vector(Self::token_seed(token));
                for (acc, v) in vector.iter_mut().zip(token_vec.iter()) {
                    *acc += v;
                }
            }
        }

        // L2-normalize so cosine similarity behaves.
        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &'static str {
        "hash"
    }
}
