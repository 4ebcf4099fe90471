use std::sync::Arc;
use tracing::{info, warn};

use medrag_core::error::Error;
use medrag_core::traits::{Embedder, VectorStore};
use medrag_core::types::{Chunk, ChunkMetadata, CollectionKind, Progress, Stage};

/// Documents, metadata and ids bound for one collection, as parallel lists.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Partition {
    pub documents: Vec<String>,
    pub metadatas: Vec<ChunkMetadata>,
    pub ids: Vec<String>,
}

impl Partition {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Splits the unified chunk list by collection. Ids are `<prefix>_<i>` with
/// `i` the position in the unified list, so they are never renumbered.
pub fn partition(chunks: &[Chunk]) -> (Partition, Partition) {
    let mut knowledge = Partition::default();
    let mut case = Partition::default();
    for (i, chunk) in chunks.iter().enumerate() {
        let kind = chunk.kind().collection();
        let target = match kind {
            CollectionKind::Knowledge => &mut knowledge,
            CollectionKind::Case => &mut case,
        };
        target.ids.push(format!("{}_{i}", kind.id_prefix()));
        target.documents.push(chunk.text.clone());
        target.metadatas.push(chunk.metadata.clone());
    }
    (knowledge, case)
}

#[derive(Debug)]
pub enum CollectionOutcome {
    Added { count: usize },
    /// Nothing to add: the collection exists but holds no rows.
    Skipped,
    Failed(Error),
}

impl CollectionOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Per-collection result of one indexing pass.
#[derive(Debug)]
pub struct IndexReport {
    pub knowledge: CollectionOutcome,
    pub case: CollectionOutcome,
}

impl IndexReport {
    pub fn outcome(&self, kind: CollectionKind) -> &CollectionOutcome {
        match kind {
            CollectionKind::Knowledge => &self.knowledge,
            CollectionKind::Case => &self.case,
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &Error> {
        [&self.knowledge, &self.case].into_iter().filter_map(|o| match o {
            CollectionOutcome::Failed(e) => Some(e),
            _ => None,
        })
    }

    pub fn added(&self) -> usize {
        [&self.knowledge, &self.case]
            .into_iter()
            .map(|o| match o {
                CollectionOutcome::Added { count } => *count,
                _ => 0,
            })
            .sum()
    }
}

#[derive(Clone)]
pub struct Indexer {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
}

impl Indexer {
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self { store, embedder }
    }

    /// Indexes both partitions. A failure aborts only the affected
    /// collection's add and is returned in the report.
    pub fn index(&self, chunks: &[Chunk], progress: &mut dyn FnMut(Progress)) -> IndexReport {
        let (knowledge, case) = partition(chunks);
        info!(
            knowledge = knowledge.len(),
            case = case.len(),
            embedder = self.embedder.embedder_id(),
            "indexing chunks"
        );
        IndexReport {
            knowledge: self.index_partition(CollectionKind::Knowledge, &knowledge, progress),
            case: self.index_partition(CollectionKind::Case, &case, progress),
        }
    }

    /// Both collections are created even when a partition is empty; only the
    /// add is skipped then.
    fn index_partition(
        &self,
        kind: CollectionKind,
        part: &Partition,
        progress: &mut dyn FnMut(Progress),
    ) -> CollectionOutcome {
        let result = self
            .store
            .get_or_create_collection(kind.name(), Arc::clone(&self.embedder))
            .and_then(|collection| {
                if part.is_empty() {
                    return Ok(());
                }
                collection.add(&part.documents, &part.metadatas, &part.ids, &mut |done, total| {
                    progress(Progress { stage: Stage::Embedding(kind), done, total });
                })
            });
        match result {
            Ok(()) if part.is_empty() => {
                info!(collection = kind.name(), "nothing to index");
                CollectionOutcome::Skipped
            }
            Ok(()) => {
                info!(collection = kind.name(), count = part.len(), "collection indexed");
                CollectionOutcome::Added { count: part.len() }
            }
            Err(e) => {
                let err = index_error(kind, e);
                warn!(collection = kind.name(), error = %err, "indexing failed");
                CollectionOutcome::Failed(err)
            }
        }
    }
}

/// Keeps a typed embedder mismatch; everything else becomes [`Error::Index`].
fn index_error(kind: CollectionKind, e: anyhow::Error) -> Error {
    match e.downcast::<Error>() {
        Ok(err @ Error::EmbedderMismatch { .. }) => err,
        Ok(other) => Error::Index { collection: kind.name().to_string(), reason: other.to_string() },
        Err(e) => Error::Index { collection: kind.name().to_string(), reason: format!("{e:#}") },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medrag_core::types::{Category, ChunkKind};

    fn chunk(text: &str, metadata: ChunkMetadata) -> Chunk {
        Chunk { text: text.to_string(), metadata }
    }

    #[test]
    fn ids_use_unified_positions() {
        let chunks = vec![
            chunk("k0", ChunkMetadata::knowledge(Category::Symptoms, "A")),
            chunk("n1", ChunkMetadata::case(ChunkKind::Narrative, "c", "General")),
            chunk("k2", ChunkMetadata::knowledge(Category::RiskFactors, "B")),
            chunk("r3", ChunkMetadata::case(ChunkKind::Reasoning, "c", "General")),
        ];
        let (knowledge, case) = partition(&chunks);
        assert_eq!(knowledge.ids, vec!["kg_0", "kg_2"]);
        assert_eq!(knowledge.documents, vec!["k0", "k2"]);
        assert_eq!(case.ids, vec!["case_1", "case_3"]);
        assert_eq!(case.metadatas[1].kind, ChunkKind::Reasoning);
    }

    #[test]
    fn empty_input_gives_empty_partitions() {
        let (knowledge, case) = partition(&[]);
        assert!(knowledge.is_empty() && case.is_empty());
    }
}
