//! Embedded store contract checks: ordering, filters, snapshot
//! persistence, and signal arithmetic at the driver level.

use std::sync::Arc;

use engramd::memory::types::{Engram, Strand, Synapse};
use engramd::storage::{EmbeddedStore, EngramPatch, MemoryStore};
use engramd::testing::axis_embedding;

const DIMENSION: usize = 4;
const OWNER: &str = "u";

fn engram(content: &str, strand: Strand, axis: usize) -> Engram {
    Engram::new(
        OWNER,
        content,
        engramd::memory::dedup::content_hash(content),
        strand,
        axis_embedding(DIMENSION, axis),
    )
}

#[tokio::test]
async fn list_is_most_recent_first_with_offset() {
    let store = EmbeddedStore::new(DIMENSION);
    for i in 0..5 {
        store
            .create_engram(engram(&format!("note {i}"), Strand::General, i % DIMENSION))
            .await
            .unwrap();
        // Distinct creation instants keep the listing order total.
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    }

    let listed = store.list_engrams(OWNER, 10, 0, None).await.unwrap();
    assert_eq!(listed.len(), 5);
    assert_eq!(listed[0].content, "note 4");
    assert_eq!(listed[4].content, "note 0");

    let page = store.list_engrams(OWNER, 2, 1, None).await.unwrap();
    assert_eq!(page.len(), 2);
    assert_eq!(page[0].content, "note 3");
    assert_eq!(page[1].content, "note 2");
}

#[tokio::test]
async fn list_filters_by_strand() {
    let store = EmbeddedStore::new(DIMENSION);
    store
        .create_engram(engram("fact", Strand::Factual, 0))
        .await
        .unwrap();
    store
        .create_engram(engram("preference", Strand::Preferential, 1))
        .await
        .unwrap();

    let factual = store
        .list_engrams(OWNER, 10, 0, Some(Strand::Factual))
        .await
        .unwrap();
    assert_eq!(factual.len(), 1);
    assert_eq!(factual[0].content, "fact");
}

#[tokio::test]
async fn vector_search_respects_strand_and_limit() {
    let store = EmbeddedStore::new(DIMENSION);
    for i in 0..3 {
        store
            .create_engram(engram(&format!("factual {i}"), Strand::Factual, 0))
            .await
            .unwrap();
    }
    store
        .create_engram(engram("general", Strand::General, 0))
        .await
        .unwrap();

    let matches = store
        .vector_search(OWNER, &axis_embedding(DIMENSION, 0), 2, Some(Strand::Factual))
        .await
        .unwrap();
    assert_eq!(matches.len(), 2);
    for m in &matches {
        assert_eq!(m.engram.strand, Strand::Factual);
        assert!(m.score >= 0.0 && m.score <= 1.0);
    }
}

#[tokio::test]
async fn reinforce_saturates_and_bumps_version() {
    let store = EmbeddedStore::new(DIMENSION);
    let stored = store
        .create_engram(engram("saturating", Strand::General, 0))
        .await
        .unwrap();

    let once = store.reinforce_engram(OWNER, stored.id, 0.3).await.unwrap();
    assert!((once.signal - 0.8).abs() < 1e-6);
    assert_eq!(once.version, 2);

    let twice = store.reinforce_engram(OWNER, stored.id, 0.6).await.unwrap();
    assert_eq!(twice.signal, 1.0);
    assert_eq!(twice.version, 3);
}

#[tokio::test]
async fn decay_counts_only_engrams_above_floor() {
    let store = EmbeddedStore::new(DIMENSION);
    let hot = store
        .create_engram(engram("hot", Strand::General, 0))
        .await
        .unwrap();
    let mut floored = engram("floored", Strand::General, 1);
    floored.set_signal(0.01);
    store.create_engram(floored).await.unwrap();

    let affected = store
        .decay_engrams(OWNER, Strand::General, 0.9, 0.01)
        .await
        .unwrap();
    assert_eq!(affected, 1);

    let hot = store.get_engram(OWNER, hot.id).await.unwrap().unwrap();
    assert!((hot.signal - 0.45).abs() < 1e-6);
}

#[tokio::test]
async fn synapse_upsert_saturates_weight() {
    let store = EmbeddedStore::new(DIMENSION);
    let a = store.create_engram(engram("a", Strand::General, 0)).await.unwrap();
    let b = store.create_engram(engram("b", Strand::General, 1)).await.unwrap();

    store
        .create_synapse(Synapse::new(OWNER, a.id, b.id, 0.5))
        .await
        .unwrap();
    let second = store
        .create_synapse(Synapse::new(OWNER, a.id, b.id, 0.7))
        .await
        .unwrap();
    assert_eq!(second.weight, 1.0);

    let fetched = store
        .get_synapses_between(OWNER, a.id, b.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fetched.weight, 1.0);
    assert!(fetched.reinforced_at >= fetched.formed_at);
}

#[tokio::test]
async fn self_synapse_is_rejected() {
    let store = EmbeddedStore::new(DIMENSION);
    let a = store.create_engram(engram("a", Strand::General, 0)).await.unwrap();

    let result = store
        .create_synapse(Synapse::new(OWNER, a.id, a.id, 0.5))
        .await;
    assert!(matches!(result, Err(engramd::EngineError::Validation(_))));
}

#[tokio::test]
async fn updating_missing_engram_is_not_found() {
    let store = EmbeddedStore::new(DIMENSION);
    let result = store
        .update_engram(OWNER, uuid::Uuid::new_v4(), EngramPatch::default())
        .await;
    assert!(matches!(result, Err(engramd::EngineError::NotFound(_))));
}

#[tokio::test]
async fn snapshot_round_trips_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("snapshot.json");

    let store = EmbeddedStore::with_snapshot(DIMENSION, path.clone());
    store.initialize().await.unwrap();

    let a = store.create_engram(engram("persisted a", Strand::Factual, 0)).await.unwrap();
    let b = store.create_engram(engram("persisted b", Strand::General, 1)).await.unwrap();
    store
        .create_synapse(Synapse::new(OWNER, a.id, b.id, 0.5))
        .await
        .unwrap();
    store.close().await.unwrap();
    assert!(path.exists());

    let reopened = EmbeddedStore::with_snapshot(DIMENSION, path);
    reopened.initialize().await.unwrap();

    let restored = reopened.get_engram(OWNER, a.id).await.unwrap().unwrap();
    assert_eq!(restored.content, "persisted a");
    assert_eq!(restored.embedding, axis_embedding(DIMENSION, 0));
    assert!(reopened
        .get_synapses_between(OWNER, a.id, b.id)
        .await
        .unwrap()
        .is_some());

    let stats = reopened.get_stats().await.unwrap();
    assert_eq!(stats.engrams, 2);
    assert_eq!(stats.synapses, 1);
}

#[tokio::test]
async fn snapshot_dimension_mismatch_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("snapshot.json");

    let store = EmbeddedStore::with_snapshot(DIMENSION, path.clone());
    store.create_engram(engram("row", Strand::General, 0)).await.unwrap();
    store.close().await.unwrap();

    let wrong = EmbeddedStore::with_snapshot(DIMENSION + 1, path);
    let result = wrong.initialize().await;
    assert!(matches!(result, Err(engramd::EngineError::Store(_))));
}

#[tokio::test]
async fn stats_count_all_tables() {
    let store = Arc::new(EmbeddedStore::new(DIMENSION));
    store.create_engram(engram("one", Strand::General, 0)).await.unwrap();

    let temporal = engramd::temporal::TemporalService::new(store.clone());
    temporal
        .record_fact(
            OWNER,
            engramd::temporal::RecordFact {
                entity: "e".to_string(),
                attribute: "a".to_string(),
                value: "v".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let stats = store.get_stats().await.unwrap();
    assert_eq!(stats.engrams, 1);
    assert_eq!(stats.chronicles, 1);
    assert_eq!(stats.owners, 1);
    assert_eq!(stats.dimension, DIMENSION);
}
