//! In-process vector store.
//!
//! Brute-force cosine search over every stored vector; fine for corpora of a
//! few hundred thousand chunks. The whole store can be written to a JSON
//! snapshot so that indexing and querying may run in separate processes.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

use medrag_core::traits::{Collection, Embedder, VectorStore};
use medrag_core::types::{ChunkMetadata, QueryResult};

use crate::{check_embedder, check_parallel, embed_in_batches};

const SNAPSHOT_FILE: &str = "memory_store.json";

/// Stored rows of one collection, kept as parallel columns.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Records {
    embedder_id: String,
    ids: Vec<String>,
    documents: Vec<String>,
    metadatas: Vec<ChunkMetadata>,
    vectors: Vec<Vec<f32>>,
}

impl Records {
    fn new(embedder_id: &str) -> Self {
        Self { embedder_id: embedder_id.to_string(), ..Self::default() }
    }

    fn upsert(&mut self, id: String, document: String, metadata: ChunkMetadata, vector: Vec<f32>, positions: &mut HashMap<String, usize>) {
        if let Some(&pos) = positions.get(&id) {
            self.documents[pos] = document;
            self.metadatas[pos] = metadata;
            self.vectors[pos] = vector;
        } else {
            positions.insert(id.clone(), self.ids.len());
            self.ids.push(id);
            self.documents.push(document);
            self.metadatas.push(metadata);
            self.vectors.push(vector);
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    collections: BTreeMap<String, Records>,
}

type Shared = Arc<RwLock<Records>>;

pub struct MemoryStore {
    collections: RwLock<BTreeMap<String, Shared>>,
    batch_size: usize,
}

impl MemoryStore {
    pub fn new(batch_size: usize) -> Self {
        Self { collections: RwLock::new(BTreeMap::new()), batch_size }
    }

    pub fn snapshot_path(dir: &Path) -> PathBuf {
        dir.join(SNAPSHOT_FILE)
    }

    /// Reads a snapshot written by [`MemoryStore::save`]; starts empty when the
    /// file does not exist.
    pub fn load_or_new(path: &Path, batch_size: usize) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no snapshot, starting with an empty store");
            return Ok(Self::new(batch_size));
        }
        let raw = std::fs::read_to_string(path).with_context(|| format!("reading snapshot {}", path.display()))?;
        let snapshot: Snapshot = serde_json::from_str(&raw).with_context(|| format!("decoding snapshot {}", path.display()))?;
        let collections = snapshot
            .collections
            .into_iter()
            .map(|(name, records)| (name, Arc::new(RwLock::new(records))))
            .collect();
        let store = Self { collections: RwLock::new(collections), batch_size };
        info!(path = %path.display(), collections = store.names()?.len(), "loaded memory store snapshot");
        Ok(store)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let mut snapshot = Snapshot::default();
        for (name, records) in self.read_map()?.iter() {
            let records = records.read().map_err(|_| poisoned(name))?;
            snapshot.collections.insert(name.clone(), records.clone());
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
        let body = serde_json::to_string(&snapshot)?;
        std::fs::write(path, body).with_context(|| format!("writing snapshot {}", path.display()))?;
        info!(path = %path.display(), collections = snapshot.collections.len(), "saved memory store snapshot");
        Ok(())
    }

    pub fn names(&self) -> Result<Vec<String>> {
        Ok(self.read_map()?.keys().cloned().collect())
    }

    fn read_map(&self) -> Result<RwLockReadGuard<'_, BTreeMap<String, Shared>>> {
        self.collections.read().map_err(|_| anyhow!("memory store lock poisoned"))
    }

    fn write_map(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<String, Shared>>> {
        self.collections.write().map_err(|_| anyhow!("memory store lock poisoned"))
    }

    fn bind(&self, name: &str, records: Shared, embedder: Arc<dyn Embedder>) -> Result<Arc<dyn Collection>> {
        {
            let guard = records.read().map_err(|_| poisoned(name))?;
            check_embedder(name, &guard.embedder_id, embedder.as_ref())?;
        }
        Ok(Arc::new(MemoryCollection { name: name.to_string(), records, embedder, batch_size: self.batch_size }))
    }
}

impl VectorStore for MemoryStore {
    fn get_or_create_collection(&self, name: &str, embedder: Arc<dyn Embedder>) -> Result<Arc<dyn Collection>> {
        let records = {
            let mut map = self.write_map()?;
            map.entry(name.to_string())
                .or_insert_with(|| {
                    debug!(collection = name, embedder = embedder.embedder_id(), "creating collection");
                    Arc::new(RwLock::new(Records::new(embedder.embedder_id())))
                })
                .clone()
        };
        self.bind(name, records, embedder)
    }

    fn get_collection(&self, name: &str, embedder: Arc<dyn Embedder>) -> Result<Option<Arc<dyn Collection>>> {
        let records = self.read_map()?.get(name).cloned();
        records.map(|r| self.bind(name, r, embedder)).transpose()
    }
}

/// A named view over shared records, bound to one embedder.
pub struct MemoryCollection {
    name: String,
    records: Shared,
    embedder: Arc<dyn Embedder>,
    batch_size: usize,
}

impl Collection for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn count(&self) -> Result<usize> {
        Ok(self.records.read().map_err(|_| poisoned(&self.name))?.ids.len())
    }

    fn add(
        &self,
        documents: &[String],
        metadatas: &[ChunkMetadata],
        ids: &[String],
        progress: &mut dyn FnMut(usize, usize),
    ) -> Result<()> {
        check_parallel(documents.len(), metadatas.len(), ids.len())?;
        // Embed before taking the write lock; a failed batch leaves the collection untouched.
        let vectors = embed_in_batches(self.embedder.as_ref(), documents, self.batch_size, progress)?;

        let mut records = self.records.write().map_err(|_| poisoned(&self.name))?;
        let mut positions: HashMap<String, usize> = records.ids.iter().cloned().enumerate().map(|(i, id)| (id, i)).collect();
        for (((id, doc), meta), vector) in ids.iter().zip(documents).zip(metadatas).zip(vectors) {
            records.upsert(id.clone(), doc.clone(), meta.clone(), vector, &mut positions);
        }
        debug!(collection = %self.name, added = ids.len(), total = records.ids.len(), "added documents");
        Ok(())
    }

    fn query(&self, query_texts: &[String], n_results: usize) -> Result<QueryResult> {
        let queries = self.embedder.embed_batch(query_texts)?;
        let records = self.records.read().map_err(|_| poisoned(&self.name))?;

        let mut result = QueryResult::default();
        for q in &queries {
            let mut scored: Vec<(usize, f32)> =
                records.vectors.iter().enumerate().map(|(i, v)| (i, cosine_distance(q, v))).collect();
            // Stable sort: equal distances keep insertion order.
            scored.sort_by(|a, b| a.1.total_cmp(&b.1));
            scored.truncate(n_results);

            result.ids.push(scored.iter().map(|&(i, _)| records.ids[i].clone()).collect());
            result.documents.push(scored.iter().map(|&(i, _)| records.documents[i].clone()).collect());
            result.metadatas.push(scored.iter().map(|&(i, _)| records.metadatas[i].clone()).collect());
            result.distances.push(scored.iter().map(|&(_, d)| d).collect());
        }
        Ok(result)
    }
}

/// `1 - cos(a, b)`; a zero vector is treated as orthogonal to everything.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        return 1.0;
    }
    1.0 - dot / (na * nb)
}

fn poisoned(collection: &str) -> anyhow::Error {
    anyhow!("collection '{collection}' lock poisoned")
}
