//! Domain types shared by the extractors, the vector stores and retrieval.

use serde::{Deserialize, Serialize};
use std::fmt;

pub type ChunkId = String;

/// Where a chunk's text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
    Knowledge,
    Narrative,
    Reasoning,
}

impl ChunkKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Knowledge => "knowledge",
            Self::Narrative => "narrative",
            Self::Reasoning => "reasoning",
        }
    }

    /// The collection a chunk of this kind lives in for its whole lifetime.
    pub fn collection(self) -> CollectionKind {
        match self {
            Self::Knowledge => CollectionKind::Knowledge,
            Self::Narrative | Self::Reasoning => CollectionKind::Case,
        }
    }
}

impl fmt::Display for ChunkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Knowledge-graph field a `knowledge` chunk was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    RiskFactors,
    Symptoms,
}

impl Category {
    /// Fixed emission order within a stage.
    pub const ALL: [Category; 2] = [Category::RiskFactors, Category::Symptoms];

    /// Key of the field in a knowledge-graph stage object.
    pub fn field_name(self) -> &'static str {
        match self {
            Self::RiskFactors => "Risk Factors",
            Self::Symptoms => "Symptoms",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::RiskFactors => "risk_factors",
            Self::Symptoms => "symptoms",
        }
    }
}

/// The two partitions of the vector store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
    Knowledge,
    Case,
}

impl CollectionKind {
    /// Query order used when merging retrieval results.
    pub const ALL: [CollectionKind; 2] = [CollectionKind::Knowledge, CollectionKind::Case];

    pub fn name(self) -> &'static str {
        match self {
            Self::Knowledge => "knowledge",
            Self::Case => "case",
        }
    }

    /// Prefix of the chunk identifiers stored in this collection.
    pub fn id_prefix(self) -> &'static str {
        match self {
            Self::Knowledge => "kg",
            Self::Case => "case",
        }
    }
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Provenance attached to every chunk.
///
/// - `kind`: serialized as `type`
/// - `category`: only on `knowledge` chunks
/// - `condition`: condition name from the file name (knowledge) or the
///   enclosing case folder (`General` for loose case files)
/// - `case_id`: only on `narrative`/`reasoning` chunks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    #[serde(rename = "type")]
    pub kind: ChunkKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case_id: Option<String>,
}

impl ChunkMetadata {
    pub fn knowledge(category: Category, condition: impl Into<String>) -> Self {
        Self { kind: ChunkKind::Knowledge, category: Some(category), condition: Some(condition.into()), case_id: None }
    }

    pub fn case(kind: ChunkKind, case_id: impl Into<String>, condition: impl Into<String>) -> Self {
        Self { kind, category: None, condition: Some(condition.into()), case_id: Some(case_id.into()) }
    }
}

/// The atomic retrievable unit. `text` is never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub metadata: ChunkMetadata,
}

impl Chunk {
    pub fn kind(&self) -> ChunkKind {
        self.metadata.kind
    }
}

/// Which phase a [`Progress`] update belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Extracting,
    Embedding(CollectionKind),
}

/// Incremental progress of a long phase: `done` of `total` units processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub stage: Stage,
    pub done: usize,
    pub total: usize,
}

/// Chroma-shaped similarity query result: one inner list per query text,
/// nearest first. `distances` are cosine distances.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub ids: Vec<Vec<ChunkId>>,
    pub documents: Vec<Vec<String>>,
    pub metadatas: Vec<Vec<ChunkMetadata>>,
    pub distances: Vec<Vec<f32>>,
}

impl QueryResult {
    /// Documents for the first (and usually only) query text.
    pub fn first_documents(&self) -> &[String] {
        self.documents.first().map_or(&[], Vec::as_slice)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_kind_maps_to_collection() {
        assert_eq!(ChunkKind::Knowledge.collection(), CollectionKind::Knowledge);
        assert_eq!(ChunkKind::Narrative.collection(), CollectionKind::Case);
        assert_eq!(ChunkKind::Reasoning.collection(), CollectionKind::Case);
    }

    #[test]
    fn metadata_serializes_only_present_fields() {
        let meta = ChunkMetadata::knowledge(Category::RiskFactors, "Asthma");
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json, serde_json::json!({"type": "knowledge", "category": "risk_factors", "condition": "Asthma"}));

        let meta = ChunkMetadata::case(ChunkKind::Reasoning, "c1", "General");
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json, serde_json::json!({"type": "reasoning", "condition": "General", "case_id": "c1"}));
    }
}
