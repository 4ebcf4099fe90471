//! medrag-core
//!
//! Chunk model, error taxonomy, configuration and the extraction half of the
//! pipeline: path resolution, knowledge-graph and case extraction, and the
//! recursive reasoning miner. Vector stores and embedders plug in through the
//! traits in [`traits`].

pub mod cases;
pub mod config;
pub mod data_processor;
pub mod error;
mod json;
pub mod knowledge;
pub mod paths;
pub mod traits;
pub mod types;

pub use data_processor::{DataProcessor, ExtractionPlan, ExtractionReport, SourceFile, TreeOutcome};
pub use error::{Error, Result};
pub use types::{Category, Chunk, ChunkKind, ChunkMetadata, CollectionKind, Progress, QueryResult, Stage};
