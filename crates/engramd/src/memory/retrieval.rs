//! Hybrid retrieval pipeline.
//!
//! Vector candidates are fetched and the chronicle matcher runs
//! concurrently; the candidates are then BM25-rescored, both score
//! vectors are min-max normalized, and the final ranking fuses them with
//! recency, signal, and synapse-graph boosts. When vector search comes
//! back empty the pipeline falls back to keyword-only scoring over the
//! owner's most recent engrams. Returned engrams are access-reinforced
//! after the response is built, fire-and-forget.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::embedding::Embedder;
use crate::error::{EngineError, Result};
use crate::math::min_max_normalize;
use crate::memory::associations::{AssociationEngine, DEFAULT_DECAY_FACTOR, DEFAULT_MAX_DEPTH};
use crate::memory::signal::DEFAULT_ENGRAM_BOOST;
use crate::memory::types::{Chronicle, Engram, Strand};
use crate::storage::{MemoryStore, VectorMatch};
use crate::text::{bm25, tokenize};

/// Fusion weights; they sum to 1.00.
pub const VECTOR_WEIGHT: f32 = 0.30;
pub const KEYWORD_WEIGHT: f32 = 0.30;
pub const RECENCY_WEIGHT: f32 = 0.10;
pub const SIGNAL_WEIGHT: f32 = 0.15;
pub const SYNAPSE_WEIGHT: f32 = 0.15;

/// How many top vector candidates seed the synapse expansion.
const EXPANSION_SEEDS: usize = 5;

/// How many chronicle matches a search returns at most.
const CHRONICLE_MATCH_LIMIT: usize = 5;

/// Retrieval tunables; the constants above are not configurable.
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    /// Default result count when the request omits `limit`
    pub default_limit: usize,
    /// Candidate pool multiplier over the requested limit
    pub candidate_multiplier: usize,
    /// Default floor on the fused score
    pub default_min_final_score: f32,
    /// Synapse expansion depth
    pub max_depth: usize,
    /// Per-hop expansion attenuation
    pub decay_factor: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_limit: 10,
            candidate_multiplier: 3,
            default_min_final_score: 0.35,
            max_depth: DEFAULT_MAX_DEPTH,
            decay_factor: DEFAULT_DECAY_FACTOR,
        }
    }
}

/// A search request. `None` fields take pipeline defaults.
#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    pub query: String,
    pub limit: Option<usize>,
    pub strand: Option<Strand>,
    /// Floor on the raw vector score, applied before fusion
    pub min_score: Option<f32>,
    /// Floor on the fused score; not applied on the keyword fallback
    pub min_final_score: Option<f32>,
    pub expand_synapses: Option<bool>,
}

/// Per-hit component scores. `vector_score` and `keyword_score` are the
/// normalized inputs; the three boosts are already weighted, so
/// `final_score = 0.30 * vector + 0.30 * keyword + recency + signal +
/// synapse`.
#[derive(Debug, Clone, Serialize)]
pub struct ScoreTrace {
    pub vector_score: f32,
    pub keyword_score: f32,
    pub recency_boost: f32,
    pub signal_boost: f32,
    pub synapse_boost: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub engram: Engram,
    pub final_score: f32,
    pub trace: ScoreTrace,
}

/// A chronicle whose assertion text overlaps the query tokens.
#[derive(Debug, Clone, Serialize)]
pub struct ChronicleMatch {
    pub chronicle: Chronicle,
    /// Fraction of distinct query tokens present in the assertion
    pub relevance: f32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub hits: Vec<SearchHit>,
    pub chronicle_matches: Vec<ChronicleMatch>,
    pub total: usize,
    pub query: String,
    pub elapsed_ms: u64,
}

/// The hybrid search pipeline. Stateless beyond the store and its
/// constants; shared across requests.
pub struct RetrievalPipeline {
    store: Arc<dyn MemoryStore>,
    embedder: Arc<dyn Embedder>,
    associations: AssociationEngine,
    config: RetrievalConfig,
}

impl RetrievalPipeline {
    pub fn new(
        store: Arc<dyn MemoryStore>,
        embedder: Arc<dyn Embedder>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            associations: AssociationEngine::new(store.clone()),
            store,
            embedder,
            config,
        }
    }

    pub fn with_defaults(store: Arc<dyn MemoryStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self::new(store, embedder, RetrievalConfig::default())
    }

    /// Run a hybrid search for an owner.
    pub async fn search(&self, owner_id: &str, request: SearchRequest) -> Result<SearchResponse> {
        if owner_id.trim().is_empty() {
            return Err(EngineError::Validation("owner_id must not be empty".to_string()));
        }

        let started = Instant::now();
        let limit = request.limit.unwrap_or(self.config.default_limit).max(1);
        let candidate_limit = limit * self.config.candidate_multiplier;
        let min_score = request.min_score.unwrap_or(0.0);
        let min_final_score = request
            .min_final_score
            .unwrap_or(self.config.default_min_final_score);
        let expand = request.expand_synapses.unwrap_or(true);

        // The vector phase and the chronicle matcher run concurrently;
        // BM25 needs the candidates, so it waits for both.
        let vector_phase = async {
            let query_embedding = self.embedder.embed(&request.query).await?;
            self.store
                .vector_search(owner_id, &query_embedding, candidate_limit, request.strand)
                .await
        };
        let (vector_result, chronicle_matches) =
            tokio::join!(vector_phase, self.match_chronicles(owner_id, &request.query));

        let mut candidates = normalize_store_scores(vector_result?);
        candidates.retain(|m| m.score >= min_score);

        if candidates.is_empty() {
            let mut response = self
                .keyword_fallback(owner_id, &request, limit, candidate_limit)
                .await?;
            response.chronicle_matches = chronicle_matches;
            response.elapsed_ms = started.elapsed().as_millis() as u64;
            return Ok(response);
        }

        let doc_tokens: Vec<Vec<String>> = candidates
            .iter()
            .map(|m| tokenize(&m.engram.content))
            .collect();
        let query_tokens = tokenize(&request.query);
        let keyword_scores =
            bm25::score_tokenized(&query_tokens, &doc_tokens, bm25::Bm25Params::default());

        let vector_norm = min_max_normalize(
            &candidates.iter().map(|m| m.score).collect::<Vec<_>>(),
        );
        let keyword_norm = min_max_normalize(&keyword_scores);

        let synapse_boosts: HashMap<Uuid, f32> = if expand {
            let seeds: Vec<Uuid> = candidates
                .iter()
                .take(EXPANSION_SEEDS)
                .map(|m| m.engram.id)
                .collect();
            self.associations
                .expand(owner_id, &seeds, self.config.max_depth, self.config.decay_factor)
                .await?
        } else {
            HashMap::new()
        };

        let mut hits: Vec<SearchHit> = candidates
            .into_iter()
            .enumerate()
            .map(|(i, m)| {
                let expansion = synapse_boosts
                    .get(&m.engram.id)
                    .copied()
                    .unwrap_or(0.0)
                    .min(1.0);
                build_hit(m.engram, vector_norm[i], keyword_norm[i], expansion)
            })
            .collect();

        hits.sort_by(|a, b| {
            b.final_score
                .partial_cmp(&a.final_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.retain(|h| h.final_score >= min_final_score);
        hits.truncate(limit);

        self.spawn_access_reinforcement(owner_id, &hits);

        Ok(SearchResponse {
            total: hits.len(),
            hits,
            chronicle_matches,
            query: request.query,
            elapsed_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// Keyword-only fallback over the owner's most recent engrams. No
    /// synapse boosts and no final-score floor on this path.
    async fn keyword_fallback(
        &self,
        owner_id: &str,
        request: &SearchRequest,
        limit: usize,
        candidate_limit: usize,
    ) -> Result<SearchResponse> {
        let engrams = self
            .store
            .list_engrams(owner_id, candidate_limit, 0, request.strand)
            .await?;

        let contents: Vec<&str> = engrams.iter().map(|e| e.content.as_str()).collect();
        let scores = bm25::score_documents(&request.query, &contents, bm25::Bm25Params::default());

        let scored: Vec<(Engram, f32)> = engrams
            .into_iter()
            .zip(scores)
            .filter(|(_, score)| *score > 0.0)
            .collect();
        let keyword_norm =
            min_max_normalize(&scored.iter().map(|(_, s)| *s).collect::<Vec<_>>());

        let mut hits: Vec<SearchHit> = scored
            .into_iter()
            .enumerate()
            .map(|(i, (engram, _))| build_hit(engram, 0.0, keyword_norm[i], 0.0))
            .collect();

        hits.sort_by(|a, b| {
            b.final_score
                .partial_cmp(&a.final_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(limit);

        self.spawn_access_reinforcement(owner_id, &hits);

        Ok(SearchResponse {
            total: hits.len(),
            hits,
            chronicle_matches: Vec::new(),
            query: request.query.clone(),
            elapsed_ms: 0,
        })
    }

    /// Token-overlap match of the query against currently valid
    /// chronicles. Any failure yields an empty list; search never fails
    /// on this leg.
    async fn match_chronicles(&self, owner_id: &str, query: &str) -> Vec<ChronicleMatch> {
        let query_tokens: Vec<String> = {
            let mut tokens = tokenize(query);
            tokens.sort_unstable();
            tokens.dedup();
            tokens
        };
        if query_tokens.is_empty() {
            return Vec::new();
        }

        let chronicles = match self.store.get_current_chronicles(owner_id).await {
            Ok(chronicles) => chronicles,
            Err(e) => {
                warn!(owner_id, error = %e, "chronicle match failed");
                return Vec::new();
            }
        };

        let mut matches: Vec<ChronicleMatch> = chronicles
            .into_iter()
            .filter_map(|chronicle| {
                let text = format!(
                    "{} {} {}",
                    chronicle.entity, chronicle.attribute, chronicle.value
                );
                let chronicle_tokens: std::collections::HashSet<String> =
                    tokenize(&text).into_iter().collect();
                let matched = query_tokens
                    .iter()
                    .filter(|t| chronicle_tokens.contains(*t))
                    .count();
                if matched == 0 {
                    return None;
                }
                Some(ChronicleMatch {
                    chronicle,
                    relevance: matched as f32 / query_tokens.len() as f32,
                })
            })
            .collect();

        matches.sort_by(|a, b| {
            b.relevance
                .partial_cmp(&a.relevance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(CHRONICLE_MATCH_LIMIT);
        matches
    }

    /// Access-reinforce every returned engram on a detached task, after
    /// the response is already built. Failures are logged, never
    /// surfaced.
    fn spawn_access_reinforcement(&self, owner_id: &str, hits: &[SearchHit]) {
        if hits.is_empty() {
            return;
        }
        let store = self.store.clone();
        let owner = owner_id.to_string();
        let ids: Vec<Uuid> = hits.iter().map(|h| h.engram.id).collect();

        tokio::spawn(async move {
            for id in ids {
                if let Err(e) = store.record_access(&owner, id).await {
                    warn!(owner_id = %owner, engram_id = %id, error = %e, "access stamp failed");
                    continue;
                }
                if let Err(e) = store
                    .reinforce_engram(&owner, id, DEFAULT_ENGRAM_BOOST)
                    .await
                {
                    warn!(owner_id = %owner, engram_id = %id, error = %e, "access reinforcement failed");
                }
            }
        });
    }
}

/// Map store scores into [0, 1]. Drivers are expected to return mapped
/// cosine already; a negative score means raw cosine leaked through, so
/// the whole batch is re-mapped, then everything is clamped.
fn normalize_store_scores(mut matches: Vec<VectorMatch>) -> Vec<VectorMatch> {
    let raw_cosine = matches.iter().any(|m| m.score < 0.0);
    for m in &mut matches {
        if raw_cosine {
            m.score = (1.0 + m.score) / 2.0;
        }
        m.score = m.score.clamp(0.0, 1.0);
    }
    matches
}

/// Days elapsed since the engram was last accessed, never negative.
fn days_since_access(engram: &Engram) -> f32 {
    let elapsed = chrono::Utc::now() - engram.last_accessed_at;
    (elapsed.num_milliseconds() as f32 / 86_400_000.0).max(0.0)
}

/// Weighted recency boost: an exponential freshness curve cut off
/// linearly toward 90 days.
fn recency_boost(engram: &Engram) -> f32 {
    let days = days_since_access(engram);
    RECENCY_WEIGHT * (-days / 7.0).exp() * (1.0 - days / 90.0).clamp(0.0, 1.0)
}

fn build_hit(engram: Engram, vector_score: f32, keyword_score: f32, expansion: f32) -> SearchHit {
    let trace = ScoreTrace {
        vector_score,
        keyword_score,
        recency_boost: recency_boost(&engram),
        signal_boost: SIGNAL_WEIGHT * engram.signal,
        synapse_boost: SYNAPSE_WEIGHT * expansion,
    };
    let final_score = VECTOR_WEIGHT * trace.vector_score
        + KEYWORD_WEIGHT * trace.keyword_score
        + trace.recency_boost
        + trace.signal_boost
        + trace.synapse_boost;
    SearchHit {
        engram,
        final_score,
        trace,
    }
}
