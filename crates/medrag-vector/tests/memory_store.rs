use std::sync::Arc;

use medrag_core::error::Error;
use medrag_core::traits::{Embedder, VectorStore};
use medrag_core::types::{Category, ChunkKind, ChunkMetadata};
use medrag_embed::FakeEmbedder;
use medrag_vector::MemoryStore;

fn fake(dim: usize) -> Arc<dyn Embedder> {
    Arc::new(FakeEmbedder::new(dim))
}

fn seed(store: &MemoryStore) {
    let col = store.get_or_create_collection("knowledge", fake(256)).unwrap();
    let docs = vec![
        "Migraine - Symptoms: aura photophobia".to_string(),
        "Asthma - Risk Factors: smoking".to_string(),
        "Stroke - Symptoms: facial droop".to_string(),
    ];
    let metas = vec![
        ChunkMetadata::knowledge(Category::Symptoms, "Migraine"),
        ChunkMetadata::knowledge(Category::RiskFactors, "Asthma"),
        ChunkMetadata::knowledge(Category::Symptoms, "Stroke"),
    ];
    let ids = vec!["kg_0".to_string(), "kg_1".to_string(), "kg_2".to_string()];
    col.add(&docs, &metas, &ids, &mut |_, _| {}).unwrap();
}

#[test]
fn query_returns_nearest_first_with_metadata() {
    let store = MemoryStore::new(2);
    seed(&store);
    let col = store.get_collection("knowledge", fake(256)).unwrap().unwrap();
    let res = col.query(&["aura photophobia".to_string()], 2).unwrap();

    assert_eq!(res.ids.len(), 1);
    assert_eq!(res.ids[0].len(), 2);
    assert_eq!(res.ids[0][0], "kg_0");
    assert_eq!(res.metadatas[0][0].condition.as_deref(), Some("Migraine"));
    assert!(res.distances[0][0] <= res.distances[0][1]);
}

#[test]
fn n_results_larger_than_collection_returns_everything() {
    let store = MemoryStore::new(8);
    seed(&store);
    let col = store.get_collection("knowledge", fake(256)).unwrap().unwrap();
    assert_eq!(col.query(&["smoking".to_string()], 10).unwrap().first_documents().len(), 3);
}

#[test]
fn creating_twice_is_a_no_op() {
    let store = MemoryStore::new(8);
    seed(&store);
    let again = store.get_or_create_collection("knowledge", fake(256)).unwrap();
    assert_eq!(again.count().unwrap(), 3);
    assert!(store.get_collection("case", fake(256)).unwrap().is_none());
}

#[test]
fn different_embedder_is_rejected() {
    let store = MemoryStore::new(8);
    seed(&store);
    let err = store.get_or_create_collection("knowledge", fake(128)).err().unwrap();
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::EmbedderMismatch { .. })));
}

#[test]
fn snapshot_round_trip_preserves_query_results() {
    let tmp = tempfile::tempdir().unwrap();
    let path = MemoryStore::snapshot_path(tmp.path());
    let store = MemoryStore::new(8);
    seed(&store);
    let case = store.get_or_create_collection("case", fake(256)).unwrap();
    case.add(
        &["Case s1 - Stroke\nNarrative:\ninput1: left weakness".to_string()],
        &[ChunkMetadata::case(ChunkKind::Narrative, "s1", "Stroke")],
        &["case_3".to_string()],
        &mut |_, _| {},
    )
    .unwrap();
    store.save(&path).unwrap();

    let loaded = MemoryStore::load_or_new(&path, 8).unwrap();
    assert_eq!(loaded.names().unwrap(), vec!["case".to_string(), "knowledge".to_string()]);
    let q = vec!["facial droop".to_string()];
    let before = store.get_collection("knowledge", fake(256)).unwrap().unwrap().query(&q, 3).unwrap();
    let after = loaded.get_collection("knowledge", fake(256)).unwrap().unwrap().query(&q, 3).unwrap();
    assert_eq!(before, after);
    assert_eq!(loaded.get_collection("case", fake(256)).unwrap().unwrap().count().unwrap(), 1);
}

#[test]
fn missing_snapshot_starts_empty() {
    let tmp = tempfile::tempdir().unwrap();
    let store = MemoryStore::load_or_new(&tmp.path().join("nothing.json"), 8).unwrap();
    assert!(store.names().unwrap().is_empty());
}

#[test]
fn store_handle_persists_memory_snapshot() {
    use medrag_core::config::{StoreBackend, StoreSettings};

    let tmp = tempfile::tempdir().unwrap();
    let settings = StoreSettings { backend: StoreBackend::Memory, path: tmp.path().to_string_lossy().into_owned() };
    let handle = medrag_vector::open_store(&settings, 8).unwrap();
    let col = handle.store().get_or_create_collection("knowledge", fake(256)).unwrap();
    col.add(
        &["Asthma - Symptoms: wheezing".to_string()],
        &[ChunkMetadata::knowledge(Category::Symptoms, "Asthma")],
        &["kg_0".to_string()],
        &mut |_, _| {},
    )
    .unwrap();
    handle.persist().unwrap();

    let reopened = medrag_vector::open_store(&settings, 8).unwrap();
    let col = reopened.store().get_collection("knowledge", fake(256)).unwrap().unwrap();
    assert_eq!(col.count().unwrap(), 1);
}

#[test]
fn fresh_store_ignores_the_previous_snapshot() {
    use medrag_core::config::{StoreBackend, StoreSettings};

    let tmp = tempfile::tempdir().unwrap();
    let settings = StoreSettings { backend: StoreBackend::Memory, path: tmp.path().to_string_lossy().into_owned() };
    let old = medrag_vector::open_store(&settings, 8).unwrap();
    seed_handle(&old);
    old.persist().unwrap();

    let fresh = medrag_vector::open_store_fresh(&settings, 8).unwrap();
    assert!(fresh.store().get_collection("knowledge", fake(256)).unwrap().is_none());
    // A different embedder is fine once the old collections are gone.
    let col = fresh.store().get_or_create_collection("knowledge", fake(64)).unwrap();
    assert_eq!(col.count().unwrap(), 0);
    fresh.persist().unwrap();

    let reopened = medrag_vector::open_store(&settings, 8).unwrap();
    let col = reopened.store().get_collection("knowledge", fake(64)).unwrap().unwrap();
    assert_eq!(col.count().unwrap(), 0);
}

fn seed_handle(handle: &medrag_vector::StoreHandle) {
    let col = handle.store().get_or_create_collection("knowledge", fake(256)).unwrap();
    col.add(
        &["Asthma - Symptoms: wheezing".to_string()],
        &[ChunkMetadata::knowledge(Category::Symptoms, "Asthma")],
        &["kg_0".to_string()],
        &mut |_, _| {},
    )
    .unwrap();
}

#[cfg(not(feature = "lance"))]
#[test]
fn lance_backend_needs_the_feature() {
    use medrag_core::config::{StoreBackend, StoreSettings};

    let settings = StoreSettings { backend: StoreBackend::Lance, ..StoreSettings::default() };
    let err = medrag_vector::open_store(&settings, 8).err().unwrap();
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::InvalidConfig(_))));
}
