use std::sync::Arc;
use tracing::{debug, warn};

use medrag_core::error::Error;
use medrag_core::traits::{Embedder, VectorStore};
use medrag_core::types::CollectionKind;

/// Merged context list plus whatever went wrong along the way.
#[derive(Debug, Default)]
pub struct Retrieval {
    /// Knowledge results first, then case results, each in the store's rank order.
    pub contexts: Vec<String>,
    /// How many leading entries of `contexts` came from the knowledge collection.
    pub knowledge_hits: usize,
    /// [`Error::Query`] per collection that contributed nothing because of a failure.
    pub errors: Vec<Error>,
}

impl Retrieval {
    pub fn knowledge(&self) -> &[String] {
        &self.contexts[..self.knowledge_hits]
    }

    pub fn cases(&self) -> &[String] {
        &self.contexts[self.knowledge_hits..]
    }
}

#[derive(Clone)]
pub struct Retriever {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn Embedder>,
}

impl Retriever {
    pub fn new(store: Arc<dyn VectorStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self { store, embedder }
    }

    /// Queries `knowledge` then `case` for `top_k` neighbours each and
    /// concatenates the results. Never fails: a collection that is absent,
    /// empty or errors contributes nothing and is reported in `errors`.
    pub fn query(&self, question: &str, top_k: usize) -> Retrieval {
        let mut out = Retrieval::default();
        for kind in CollectionKind::ALL {
            match self.query_collection(kind, question, top_k) {
                Ok(docs) => {
                    debug!(collection = kind.name(), hits = docs.len(), "collection queried");
                    if kind == CollectionKind::Knowledge {
                        out.knowledge_hits = docs.len();
                    }
                    out.contexts.extend(docs);
                }
                Err(e) => {
                    warn!(collection = kind.name(), error = %e, "query failed, continuing without it");
                    out.errors.push(e);
                }
            }
        }
        out
    }

    fn query_collection(
        &self,
        kind: CollectionKind,
        question: &str,
        top_k: usize,
    ) -> Result<Vec<String>, Error> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        let collection = self
            .store
            .get_collection(kind.name(), Arc::clone(&self.embedder))
            .map_err(|e| query_error(kind, e))?
            .ok_or_else(|| query_error(kind, "collection does not exist"))?;
        if collection.count().map_err(|e| query_error(kind, e))? == 0 {
            return Err(query_error(kind, "collection is empty"));
        }
        let result = collection.query(&[question.to_string()], top_k).map_err(|e| query_error(kind, e))?;
        let mut docs = result.first_documents().to_vec();
        docs.truncate(top_k);
        Ok(docs)
    }
}

fn query_error(kind: CollectionKind, reason: impl std::fmt::Display) -> Error {
    Error::Query { collection: kind.name().to_string(), reason: format!("{reason:#}") }
}
