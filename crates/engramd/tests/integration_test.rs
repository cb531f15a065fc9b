//! End-to-end flow over the engine: ingest, associate, retrieve, match
//! chronicles, decay, and verify the cross-cutting invariants.

use std::sync::Arc;

use serde_json::json;

use engramd::embedding::{Embedder, HashEmbedder};
use engramd::extractor::FactExtractor;
use engramd::memory::ingestion::{AddMemory, IngestionPipeline};
use engramd::memory::retrieval::{RetrievalPipeline, SearchRequest};
use engramd::memory::signal::{DecaySchedule, SignalService};
use engramd::storage::{EmbeddedStore, MemoryStore};
use engramd::testing::ScriptedCompletion;

const DIMENSION: usize = 128;
const OWNER: &str = "agent-7";

struct Harness {
    store: Arc<EmbeddedStore>,
    ingestion: IngestionPipeline,
    retrieval: RetrievalPipeline,
    signal: SignalService,
}

fn harness(provider: ScriptedCompletion) -> Harness {
    let store = Arc::new(EmbeddedStore::new(DIMENSION));
    let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder::new(DIMENSION));
    let extractor = Arc::new(FactExtractor::new(Arc::new(provider)));
    Harness {
        ingestion: IngestionPipeline::new(store.clone(), embedder.clone(), extractor),
        retrieval: RetrievalPipeline::with_defaults(store.clone(), embedder),
        signal: SignalService::new(store.clone(), DecaySchedule::default()),
        store,
    }
}

#[tokio::test]
async fn full_memory_lifecycle() {
    let harness = harness(ScriptedCompletion::new(vec![
        json!({
            "facts": ["The user loves hiking in the mountains", "The user enjoys cooking Italian food"],
            "strand": "preferential",
            "temporalFacts": [],
        }),
        json!({
            "facts": ["The user got a Samsung Galaxy S24"],
            "strand": "preferential",
            "temporalFacts": [{"entity": "speaker", "attribute": "phone", "value": "Samsung"}],
        }),
        json!({
            "facts": ["Quarterly report is due on Friday"],
            "strand": "factual",
            "temporalFacts": [],
        }),
    ]));

    // ── Ingest ──
    let hobbies = harness
        .ingestion
        .add_memory(
            OWNER,
            AddMemory {
                content: "I love hiking and I enjoy cooking Italian food".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(hobbies.len(), 2);

    harness
        .ingestion
        .add_memory(
            OWNER,
            AddMemory {
                content: "I just got a Samsung Galaxy S24".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    harness
        .ingestion
        .add_memory(
            OWNER,
            AddMemory {
                content: "Quarterly report is due on Friday".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let stats = harness.store.get_stats().await.unwrap();
    assert_eq!(stats.engrams, 4);
    assert_eq!(stats.synapses, 1);
    assert_eq!(stats.chronicles, 1);

    // ── Retrieve ──
    let response = harness
        .retrieval
        .search(
            OWNER,
            SearchRequest {
                query: "hiking mountains".to_string(),
                min_final_score: Some(0.0),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert!(!response.hits.is_empty());
    assert!(
        response.hits[0].engram.content.contains("hiking"),
        "lexical+semantic overlap should rank the hiking engram first, got '{}'",
        response.hits[0].engram.content
    );
    assert_eq!(response.total, response.hits.len());

    // ── Chronicle match rides along ──
    let phone_search = harness
        .retrieval
        .search(
            OWNER,
            SearchRequest {
                query: "samsung phone".to_string(),
                min_final_score: Some(0.0),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(phone_search.chronicle_matches.len(), 1);
    assert_eq!(phone_search.chronicle_matches[0].chronicle.value, "Samsung");

    // Let the detached access-reinforcement tasks land before sampling
    // signals, so the decay comparison below is race-free.
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    // ── Decay ──
    let before: Vec<f32> = harness
        .store
        .list_engrams(OWNER, 100, 0, None)
        .await
        .unwrap()
        .iter()
        .map(|e| e.signal)
        .collect();
    let report = harness.signal.run_decay_cycle(OWNER).await.unwrap();
    assert_eq!(report.affected, 4);
    let after: Vec<f32> = harness
        .store
        .list_engrams(OWNER, 100, 0, None)
        .await
        .unwrap()
        .iter()
        .map(|e| e.signal)
        .collect();
    for (b, a) in before.iter().zip(after.iter()) {
        assert!(a < b, "decay must strictly decrease signals above the floor");
    }

    // ── Invariants ──
    for engram in harness.store.list_engrams(OWNER, 100, 0, None).await.unwrap() {
        assert!(engram.signal >= 0.0 && engram.signal <= 1.0);
        assert_eq!(engram.embedding.len(), DIMENSION);
        assert!(engram.version >= 1);
    }
}

#[tokio::test]
async fn reingesting_known_content_converges_to_one_engram() {
    let harness = harness(ScriptedCompletion::failing());

    for _ in 0..4 {
        harness
            .ingestion
            .add_memory(
                OWNER,
                AddMemory {
                    content: "a recurring observation".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
    }

    let engrams = harness.store.list_engrams(OWNER, 100, 0, None).await.unwrap();
    assert_eq!(engrams.len(), 1);
    // 0.5 + 3 reinforcements of 0.1.
    assert!((engrams[0].signal - 0.8).abs() < 1e-6);
}
