#![cfg(feature = "lance")]

use std::sync::Arc;

use medrag_core::error::Error;
use medrag_core::traits::{Embedder, VectorStore};
use medrag_core::types::{Category, ChunkMetadata};
use medrag_embed::FakeEmbedder;
use medrag_vector::LanceStore;

fn fake(dim: usize) -> Arc<dyn Embedder> {
    Arc::new(FakeEmbedder::new(dim))
}

#[test]
fn add_query_and_reopen() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    {
        let store = LanceStore::open(tmp.path(), 16)?;
        let col = store.get_or_create_collection("knowledge", fake(256))?;
        col.add(
            &["Migraine - Symptoms: aura".to_string(), "Asthma - Risk Factors: smoking".to_string()],
            &[
                ChunkMetadata::knowledge(Category::Symptoms, "Migraine"),
                ChunkMetadata::knowledge(Category::RiskFactors, "Asthma"),
            ],
            &["kg_0".to_string(), "kg_1".to_string()],
            &mut |_, _| {},
        )?;
        assert_eq!(col.count()?, 2);
    }

    let store = LanceStore::open(tmp.path(), 16)?;
    let col = store.get_collection("knowledge", fake(256))?.expect("collection persisted");
    let res = col.query(&["smoking".to_string()], 1)?;
    assert_eq!(res.ids[0], vec!["kg_1".to_string()]);
    assert_eq!(res.metadatas[0][0].category, Some(Category::RiskFactors));

    let err = store.get_or_create_collection("knowledge", fake(128)).err().expect("mismatch");
    assert!(matches!(err.downcast_ref::<Error>(), Some(Error::EmbedderMismatch { .. })));
    Ok(())
}

#[test]
fn fresh_open_drops_existing_tables() -> anyhow::Result<()> {
    use medrag_core::config::{StoreBackend, StoreSettings};

    let tmp = tempfile::tempdir()?;
    let settings = StoreSettings { backend: StoreBackend::Lance, path: tmp.path().join("db").to_string_lossy().into_owned() };
    {
        let handle = medrag_vector::open_store(&settings, 16)?;
        let col = handle.store().get_or_create_collection("knowledge", fake(256))?;
        col.add(
            &["Asthma - Symptoms: wheezing".to_string()],
            &[ChunkMetadata::knowledge(Category::Symptoms, "Asthma")],
            &["kg_0".to_string()],
            &mut |_, _| {},
        )?;
    }

    let fresh = medrag_vector::open_store_fresh(&settings, 16)?;
    assert!(fresh.store().get_collection("knowledge", fake(256))?.is_none());
    let col = fresh.store().get_or_create_collection("knowledge", fake(128))?;
    assert_eq!(col.count()?, 0);
    Ok(())
}
