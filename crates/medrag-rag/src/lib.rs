//! medrag-rag
//!
//! Indexing, dual-collection retrieval and answer composition on top of the
//! `medrag-core` store and embedder seams.

pub mod answer;
pub mod gemini;
pub mod indexer;
pub mod pipeline;
pub mod retriever;

use anyhow::Result;

use medrag_core::config::Settings;
use medrag_vector::StoreHandle;

pub use answer::{build_prompt, compose_answer, AnswerComposer};
pub use gemini::GeminiComposer;
pub use indexer::{partition, CollectionOutcome, IndexReport, Indexer, Partition};
pub use pipeline::{Answer, Pipeline, PipelineState};
pub use retriever::{Retrieval, Retriever};

/// Builds an unindexed pipeline from settings: the configured embedder and
/// the configured store backend, seeded with what an earlier run stored.
pub fn pipeline_from_settings(settings: &Settings) -> Result<(Pipeline, StoreHandle)> {
    let embedder = medrag_embed::get_default_embedder(&settings.embedding)?;
    let handle = medrag_vector::open_store(&settings.store, settings.embedding.batch_size)?;
    Ok((Pipeline::new(handle.store(), embedder), handle))
}

/// Like [`pipeline_from_settings`] but over an emptied store, so a rebuild
/// keeps nothing from earlier runs. The handle persists the new index.
pub fn rebuild_pipeline_from_settings(settings: &Settings) -> Result<(Pipeline, StoreHandle)> {
    let embedder = medrag_embed::get_default_embedder(&settings.embedding)?;
    let handle = medrag_vector::open_store_fresh(&settings.store, settings.embedding.batch_size)?;
    Ok((Pipeline::new(handle.store(), embedder), handle))
}
