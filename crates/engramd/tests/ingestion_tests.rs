//! Ingestion pipeline behavior: extraction wiring, dedup reinforcement,
//! synapse formation, and chronicle recording.

use std::sync::Arc;

use serde_json::json;

use engramd::embedding::HashEmbedder;
use engramd::error::EngineError;
use engramd::extractor::{FactExtractor, NativeCompletion};
use engramd::memory::ingestion::{AddMemory, IngestionPipeline};
use engramd::memory::types::Strand;
use engramd::storage::{EmbeddedStore, MemoryStore};
use engramd::temporal::TemporalService;
use engramd::testing::ScriptedCompletion;

const DIMENSION: usize = 64;
const OWNER: &str = "u";

fn pipeline_with(provider: ScriptedCompletion) -> (Arc<EmbeddedStore>, IngestionPipeline) {
    let store = Arc::new(EmbeddedStore::new(DIMENSION));
    let embedder = Arc::new(HashEmbedder::new(DIMENSION));
    let extractor = Arc::new(FactExtractor::new(Arc::new(provider)));
    let pipeline = IngestionPipeline::new(store.clone(), embedder, extractor);
    (store, pipeline)
}

fn native_pipeline() -> (Arc<EmbeddedStore>, IngestionPipeline) {
    let store = Arc::new(EmbeddedStore::new(DIMENSION));
    let embedder = Arc::new(HashEmbedder::new(DIMENSION));
    let extractor = Arc::new(FactExtractor::new(Arc::new(NativeCompletion::new())));
    let pipeline = IngestionPipeline::new(store.clone(), embedder, extractor);
    (store, pipeline)
}

fn request(content: &str) -> AddMemory {
    AddMemory {
        content: content.to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn phone_purchase_creates_engram_and_chronicle() {
    let (store, pipeline) = pipeline_with(ScriptedCompletion::new(vec![json!({
        "facts": ["The speaker got a Samsung Galaxy S24"],
        "strand": "preferential",
        "temporalFacts": [{"entity": "speaker", "attribute": "phone", "value": "Samsung"}],
    })]));

    let engrams = pipeline
        .add_memory(OWNER, request("I just got a Samsung Galaxy S24"))
        .await
        .unwrap();

    assert_eq!(engrams.len(), 1);
    assert_eq!(engrams[0].strand, Strand::Preferential);
    assert_eq!(engrams[0].signal, 0.5);
    assert_eq!(engrams[0].version, 1);

    let current = store
        .get_current_fact(OWNER, "speaker", "phone")
        .await
        .unwrap()
        .expect("chronicle should be current");
    assert_eq!(current.value, "Samsung");
    assert!(current.effective_until.is_none());
}

#[tokio::test]
async fn switching_phones_supersedes_the_chronicle() {
    let (store, pipeline) = pipeline_with(ScriptedCompletion::new(vec![
        json!({
            "facts": ["The speaker got a Samsung Galaxy S24"],
            "strand": "preferential",
            "temporalFacts": [{"entity": "speaker", "attribute": "phone", "value": "Samsung"}],
        }),
        json!({
            "facts": ["The speaker switched to an iPhone 16 Pro"],
            "strand": "preferential",
            "temporalFacts": [{"entity": "speaker", "attribute": "phone", "value": "iPhone"}],
        }),
    ]));

    let first = pipeline
        .add_memory(OWNER, request("I just got a Samsung Galaxy S24"))
        .await
        .unwrap();
    let second = pipeline
        .add_memory(OWNER, request("I switched to iPhone 16 Pro"))
        .await
        .unwrap();

    assert_eq!(second.len(), 1);
    assert_ne!(first[0].id, second[0].id);

    let current = store
        .get_current_fact(OWNER, "speaker", "phone")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(current.value, "iPhone");

    let timeline = store.get_timeline(OWNER, "speaker").await.unwrap();
    assert_eq!(timeline.len(), 2);
    assert_eq!(timeline[0].value, "Samsung");
    assert!(timeline[0].effective_until.is_some(), "old value must be expired");
    assert_eq!(timeline[1].value, "iPhone");
    assert!(timeline[1].effective_until.is_none());
    assert!(timeline[0].effective_from <= timeline[1].effective_from);
}

#[tokio::test]
async fn compound_preference_forms_a_synapse() {
    let (store, pipeline) = native_pipeline();

    let engrams = pipeline
        .add_memory(OWNER, request("I love hiking and I enjoy cooking Italian food"))
        .await
        .unwrap();

    assert_eq!(engrams.len(), 2);
    assert_eq!(engrams[0].strand, Strand::Preferential);

    let synapse = store
        .get_synapses_between(OWNER, engrams[0].id, engrams[1].id)
        .await
        .unwrap()
        .expect("a synapse should link the pair");
    assert_eq!(synapse.weight, 0.5);

    // Exactly one synapse, directed in emission order.
    assert!(store
        .get_synapses_between(OWNER, engrams[1].id, engrams[0].id)
        .await
        .unwrap()
        .is_none());
    let stats = store.get_stats().await.unwrap();
    assert_eq!(stats.synapses, 1);
}

#[tokio::test]
async fn ingesting_same_content_twice_reinforces_once() {
    // A failing provider makes every input a single raw-text fact, so
    // the two calls carry identical content.
    let (store, pipeline) = pipeline_with(ScriptedCompletion::failing());

    let first = pipeline.add_memory(OWNER, request("the same content")).await.unwrap();
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].signal, 0.5);

    let second = pipeline.add_memory(OWNER, request("the same content")).await.unwrap();
    assert_eq!(second.len(), 1);
    assert_eq!(second[0].id, first[0].id);
    assert!(
        second[0].signal > first[0].signal,
        "reinforcement must strictly increase the signal"
    );

    let listed = store.list_engrams(OWNER, 100, 0, None).await.unwrap();
    assert_eq!(listed.len(), 1, "exactly one engram for duplicate content");
}

#[tokio::test]
async fn duplicate_facts_in_one_input_emit_once() {
    let (store, pipeline) = pipeline_with(ScriptedCompletion::new(vec![json!({
        "facts": ["repeated fact", "repeated fact"],
        "strand": "general",
        "temporalFacts": [],
    })]));

    let engrams = pipeline.add_memory(OWNER, request("repeated fact, twice")).await.unwrap();
    assert_eq!(engrams.len(), 1);
    // The second occurrence deduplicated and reinforced.
    assert!((engrams[0].signal - 0.6).abs() < 1e-6);

    let stats = store.get_stats().await.unwrap();
    assert_eq!(stats.engrams, 1);
    assert_eq!(stats.synapses, 0);
}

#[tokio::test]
async fn caller_strand_overrides_extraction() {
    let (_, pipeline) = pipeline_with(ScriptedCompletion::fixed(json!({
        "facts": ["a classified fact"],
        "strand": "preferential",
        "temporalFacts": [],
    })));

    let engrams = pipeline
        .add_memory(
            OWNER,
            AddMemory {
                content: "a classified fact".to_string(),
                strand: Some(Strand::Factual),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(engrams[0].strand, Strand::Factual);
}

#[tokio::test]
async fn caller_options_land_on_new_engrams() {
    let (_, pipeline) = pipeline_with(ScriptedCompletion::failing());

    let mut metadata = engramd::memory::types::Metadata::new();
    metadata.insert("source".to_string(), serde_json::json!("unit-test"));

    let engrams = pipeline
        .add_memory(
            OWNER,
            AddMemory {
                content: "content with options".to_string(),
                strand: None,
                tags: Some(vec!["tag-a".to_string(), "tag-b".to_string()]),
                metadata: Some(metadata),
                signal: Some(0.9),
                pulse_rate: Some(0.3),
            },
        )
        .await
        .unwrap();

    let engram = &engrams[0];
    assert_eq!(engram.tags, vec!["tag-a".to_string(), "tag-b".to_string()]);
    assert_eq!(engram.metadata["source"], serde_json::json!("unit-test"));
    assert_eq!(engram.signal, 0.9);
    assert_eq!(engram.pulse_rate, 0.3);
}

#[tokio::test]
async fn empty_extraction_returns_no_engrams() {
    let (store, pipeline) = pipeline_with(ScriptedCompletion::fixed(json!({
        "facts": [],
        "strand": "general",
        "temporalFacts": [],
    })));

    let engrams = pipeline.add_memory(OWNER, request("nothing worth keeping")).await.unwrap();
    assert!(engrams.is_empty());
    assert_eq!(store.get_stats().await.unwrap().engrams, 0);
}

#[tokio::test]
async fn temporal_only_extraction_still_records_chronicles() {
    let (store, pipeline) = pipeline_with(ScriptedCompletion::fixed(json!({
        "facts": [],
        "strand": "factual",
        "temporalFacts": [{"entity": "speaker", "attribute": "city", "value": "Lisbon"}],
    })));

    let engrams = pipeline.add_memory(OWNER, request("I moved to Lisbon")).await.unwrap();
    assert!(engrams.is_empty());

    let current = store
        .get_current_fact(OWNER, "speaker", "city")
        .await
        .unwrap();
    assert_eq!(current.unwrap().value, "Lisbon");
}

#[tokio::test]
async fn rejects_blank_owner_and_content() {
    let (_, pipeline) = pipeline_with(ScriptedCompletion::failing());

    let result = pipeline.add_memory("", request("content")).await;
    assert!(matches!(result, Err(EngineError::Validation(_))));

    let result = pipeline.add_memory(OWNER, request("   ")).await;
    assert!(matches!(result, Err(EngineError::Validation(_))));
}

#[tokio::test]
async fn rejects_out_of_range_signal() {
    let (_, pipeline) = pipeline_with(ScriptedCompletion::failing());

    let result = pipeline
        .add_memory(
            OWNER,
            AddMemory {
                content: "valid content".to_string(),
                signal: Some(1.5),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(result, Err(EngineError::Validation(_))));
}

#[tokio::test]
async fn owners_are_isolated() {
    let (store, pipeline) = pipeline_with(ScriptedCompletion::failing());

    pipeline.add_memory("alpha", request("shared wording")).await.unwrap();
    let engrams = pipeline.add_memory("beta", request("shared wording")).await.unwrap();

    // No cross-owner dedup: beta gets its own engram.
    assert_eq!(engrams.len(), 1);
    assert_eq!(store.list_engrams("alpha", 10, 0, None).await.unwrap().len(), 1);
    assert_eq!(store.list_engrams("beta", 10, 0, None).await.unwrap().len(), 1);

    let temporal = TemporalService::new(store.clone());
    assert!(temporal
        .current_chronicles("alpha")
        .await
        .unwrap()
        .is_empty());
}
