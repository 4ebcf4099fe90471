//! medrag-embed
//!
//! Embedding functions behind `medrag_core::traits::Embedder`: the local
//! BGE-M3 model on candle and a hashing `FakeEmbedder`.
//!
//! `APP_USE_FAKE_EMBEDDINGS=1` switches to the FakeEmbedder for fast and
//! deterministic outputs in tests and development.

pub mod device;
pub mod fake;
pub mod model;
pub mod pool;
pub mod tokenize;

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use medrag_core::config::{expand_path, EmbeddingProvider, EmbeddingSettings};
use medrag_core::traits::Embedder;

pub use fake::FakeEmbedder;
pub use model::{resolve_model_dir, BgeM3Embedder};
pub use pool::masked_mean_l2;

pub fn fake_embeddings_forced() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS").ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false)
}

/// Builds the single embedding function shared by indexing and retrieval.
pub fn get_default_embedder(settings: &EmbeddingSettings) -> Result<Arc<dyn Embedder>> {
    if fake_embeddings_forced() || settings.provider == EmbeddingProvider::Fake {
        info!(dim = settings.fake_dim, "using FakeEmbedder");
        return Ok(Arc::new(FakeEmbedder::new(settings.fake_dim)));
    }
    let configured: Option<PathBuf> = settings.model_dir.as_deref().map(expand_path);
    let model_dir = resolve_model_dir(configured.as_deref())?;
    Ok(Arc::new(BgeM3Embedder::new(&model_dir, settings.max_len)?))
}
