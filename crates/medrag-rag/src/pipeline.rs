use std::sync::Arc;
use tracing::info;

use medrag_core::error::Error;
use medrag_core::traits::{Embedder, VectorStore};
use medrag_core::types::{Chunk, CollectionKind, Progress};

use crate::answer::{build_prompt, compose_answer, AnswerComposer};
use crate::indexer::{CollectionOutcome, IndexReport, Indexer};
use crate::retriever::{Retrieval, Retriever};

#[derive(Debug, Clone, Copy)]
pub enum PipelineState<'a> {
    Unindexed,
    Indexed(&'a IndexReport),
}

#[derive(Debug)]
pub struct Answer {
    pub text: String,
    pub retrieval: Retrieval,
}

/// Owns the store and the one embedding function shared by indexing and
/// retrieval. Retrieval is only valid once a full indexing pass completed.
pub struct Pipeline {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
    report: Option<IndexReport>,
}

impl Pipeline {
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self { store, embedder, report: None }
    }

    pub fn state(&self) -> PipelineState<'_> {
        match &self.report {
            Some(report) => PipelineState::Indexed(report),
            None => PipelineState::Unindexed,
        }
    }

    pub fn is_indexed(&self) -> bool {
        self.report.is_some()
    }

    pub fn indexer(&self) -> Indexer {
        Indexer::new(Arc::clone(&self.store), Arc::clone(&self.embedder))
    }

    pub fn retriever(&self) -> Retriever {
        Retriever::new(Arc::clone(&self.store), Arc::clone(&self.embedder))
    }

    /// Runs one full indexing pass and marks the pipeline indexed.
    pub fn index(&mut self, chunks: &[Chunk], progress: &mut dyn FnMut(Progress)) -> &IndexReport {
        let report = self.indexer().index(chunks, progress);
        self.report.insert(report)
    }

    /// Marks a store populated by an earlier run as indexed, reporting what
    /// each collection holds. Fails if neither collection has any rows.
    pub fn attach(&mut self) -> Result<&IndexReport, Error> {
        let knowledge = self.existing(CollectionKind::Knowledge)?;
        let case = self.existing(CollectionKind::Case)?;
        if matches!((&knowledge, &case), (CollectionOutcome::Skipped, CollectionOutcome::Skipped)) {
            return Err(Error::NotIndexed);
        }
        info!(?knowledge, ?case, "attached to existing index");
        Ok(&*self.report.insert(IndexReport { knowledge, case }))
    }

    /// What a stored collection holds; absent and empty collections are skipped.
    /// An embedder mismatch or other typed store error aborts the attach.
    fn existing(&self, kind: CollectionKind) -> Result<CollectionOutcome, Error> {
        let failed = |e: anyhow::Error| {
            CollectionOutcome::Failed(Error::Query {
                collection: kind.name().to_string(),
                reason: format!("{e:#}"),
            })
        };
        let collection = match self.store.get_collection(kind.name(), Arc::clone(&self.embedder)) {
            Ok(Some(collection)) => collection,
            Ok(None) => return Ok(CollectionOutcome::Skipped),
            Err(e) => {
                return match e.downcast::<Error>() {
                    Ok(err) => Err(err),
                    Err(e) => Ok(failed(e)),
                }
            }
        };
        Ok(match collection.count() {
            Ok(0) => CollectionOutcome::Skipped,
            Ok(count) => CollectionOutcome::Added { count },
            Err(e) => failed(e),
        })
    }

    pub fn retrieve(&self, question: &str, top_k: usize) -> Result<Retrieval, Error> {
        if !self.is_indexed() {
            return Err(Error::NotIndexed);
        }
        Ok(self.retriever().query(question, top_k))
    }

    /// Retrieve, build the prompt and hand it to `composer`. Composer failures
    /// come back as text in [`Answer::text`].
    pub fn ask(&self, composer: &dyn AnswerComposer, question: &str, top_k: usize) -> Result<Answer, Error> {
        let retrieval = self.retrieve(question, top_k)?;
        let prompt = build_prompt(&retrieval.contexts, question);
        let text = compose_answer(composer, &prompt);
        Ok(Answer { text, retrieval })
    }
}
