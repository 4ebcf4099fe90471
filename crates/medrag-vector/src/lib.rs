//! medrag-vector
//!
//! Implementations of `medrag_core::traits::VectorStore`:
//! - `MemoryStore`: brute-force cosine search, persisted as a JSON snapshot
//! - `LanceStore` (feature `lance`): one lancedb table per collection

pub mod memory;

#[cfg(feature = "lance")]
pub mod lance;
#[cfg(feature = "lance")]
pub mod schema;

use anyhow::{ensure, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

use medrag_core::config::{expand_path, StoreBackend, StoreSettings};
use medrag_core::error::Error;
use medrag_core::traits::{Embedder, VectorStore};

pub use memory::{MemoryCollection, MemoryStore};

#[cfg(feature = "lance")]
pub use lance::LanceStore;

/// An opened store plus what it takes to persist it.
pub struct StoreHandle {
    store: Arc<dyn VectorStore>,
    snapshot: Option<(Arc<MemoryStore>, PathBuf)>,
}

impl StoreHandle {
    pub fn store(&self) -> Arc<dyn VectorStore> {
        Arc::clone(&self.store)
    }

    /// Writes the memory snapshot; lance tables are already on disk.
    pub fn persist(&self) -> Result<()> {
        match &self.snapshot {
            Some((memory, path)) => memory.save(path),
            None => Ok(()),
        }
    }
}

/// Opens the configured backend. A memory store is seeded from its snapshot
/// under `settings.path` when one exists.
pub fn open_store(settings: &StoreSettings, batch_size: usize) -> Result<StoreHandle> {
    let dir = expand_path(&settings.path);
    match settings.backend {
        StoreBackend::Memory => {
            let path = MemoryStore::snapshot_path(&dir);
            let memory = Arc::new(MemoryStore::load_or_new(&path, batch_size)?);
            Ok(StoreHandle { store: memory.clone(), snapshot: Some((memory, path)) })
        }
        #[cfg(feature = "lance")]
        StoreBackend::Lance => {
            Ok(StoreHandle { store: Arc::new(LanceStore::open(&dir, batch_size)?), snapshot: None })
        }
        #[cfg(not(feature = "lance"))]
        StoreBackend::Lance => Err(lance_disabled()),
    }
}

/// Opens the configured backend with nothing in it, discarding whatever an
/// earlier run stored under `settings.path`. Used for a full rebuild.
pub fn open_store_fresh(settings: &StoreSettings, batch_size: usize) -> Result<StoreHandle> {
    let dir = expand_path(&settings.path);
    match settings.backend {
        StoreBackend::Memory => {
            let path = MemoryStore::snapshot_path(&dir);
            if path.exists() {
                info!(path = %path.display(), "discarding previous memory snapshot");
            }
            let memory = Arc::new(MemoryStore::new(batch_size));
            Ok(StoreHandle { store: memory.clone(), snapshot: Some((memory, path)) })
        }
        #[cfg(feature = "lance")]
        StoreBackend::Lance => {
            use anyhow::Context as _;
            if dir.exists() {
                info!(path = %dir.display(), "clearing existing lance database");
                std::fs::remove_dir_all(&dir).with_context(|| format!("removing {}", dir.display()))?;
            }
            Ok(StoreHandle { store: Arc::new(LanceStore::open(&dir, batch_size)?), snapshot: None })
        }
        #[cfg(not(feature = "lance"))]
        StoreBackend::Lance => Err(lance_disabled()),
    }
}

/// Embeds `documents` in slices of `batch_size`, calling `progress(done, total)`
/// after each slice. Every vector must have the embedder's dimension.
pub fn embed_in_batches(
    embedder: &dyn Embedder,
    documents: &[String],
    batch_size: usize,
    progress: &mut dyn FnMut(usize, usize),
) -> Result<Vec<Vec<f32>>> {
    let total = documents.len();
    let mut vectors = Vec::with_capacity(total);
    for batch in documents.chunks(batch_size.max(1)) {
        let embedded = embedder.embed_batch(batch)?;
        ensure!(
            embedded.len() == batch.len(),
            "embedder returned {} vectors for {} texts",
            embedded.len(),
            batch.len()
        );
        for v in &embedded {
            ensure!(
                v.len() == embedder.dim(),
                "embedding dimension {} does not match embedder dimension {}",
                v.len(),
                embedder.dim()
            );
        }
        vectors.extend(embedded);
        debug!(done = vectors.len(), total, "embedded batch");
        progress(vectors.len(), total);
    }
    Ok(vectors)
}

#[cfg(not(feature = "lance"))]
fn lance_disabled() -> anyhow::Error {
    Error::InvalidConfig("store.backend = \"lance\" needs the `lance` feature".into()).into()
}

/// Rejects mismatched parallel slices before any embedding work is done.
pub(crate) fn check_parallel(documents: usize, metadatas: usize, ids: usize) -> Result<()> {
    ensure!(
        documents == metadatas && documents == ids,
        "documents ({documents}), metadatas ({metadatas}) and ids ({ids}) must have the same length"
    );
    Ok(())
}

pub(crate) fn check_embedder(collection: &str, expected: &str, embedder: &dyn Embedder) -> Result<()> {
    if expected != embedder.embedder_id() {
        return Err(Error::EmbedderMismatch {
            collection: collection.to_string(),
            expected: expected.to_string(),
            actual: embedder.embedder_id().to_string(),
        }
        .into());
    }
    Ok(())
}
