use std::sync::Arc;

use crate::types::{ChunkMetadata, QueryResult};

/// An embedding function. Index time and query time must share one instance
/// (or at least one `embedder_id`).
pub trait Embedder: Send + Sync {
    /// Stable identifier for the provider/model (e.g. `fake:xxh64:d1024`).
    fn embedder_id(&self) -> &str;
    fn dim(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Abstract vector store holding named collections.
pub trait VectorStore: Send + Sync {
    /// Returns the named collection, creating it bound to `embedder` when absent.
    /// Opening an existing collection with a different embedder is an error.
    fn get_or_create_collection(&self, name: &str, embedder: Arc<dyn Embedder>) -> anyhow::Result<Arc<dyn Collection>>;

    /// Returns the named collection if it exists.
    fn get_collection(&self, name: &str, embedder: Arc<dyn Embedder>) -> anyhow::Result<Option<Arc<dyn Collection>>>;
}

pub trait Collection: Send + Sync {
    fn name(&self) -> &str;
    fn count(&self) -> anyhow::Result<usize>;

    /// Embeds and stores `documents`; the three slices are parallel.
    /// `progress` receives `(embedded_so_far, total)` after each embedding batch.
    fn add(
        &self,
        documents: &[String],
        metadatas: &[ChunkMetadata],
        ids: &[String],
        progress: &mut dyn FnMut(usize, usize),
    ) -> anyhow::Result<()>;

    fn query(&self, query_texts: &[String], n_results: usize) -> anyhow::Result<QueryResult>;
}
