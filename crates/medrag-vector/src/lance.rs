//! LanceDB-backed store.
//!
//! Each collection is a table (`id`, `content`, `type`, `category`,
//! `condition`, `case_id`, `vector`); the `meta` key/value table records the
//! embedder id of every collection. lancedb is async, so the store owns a tokio
//! runtime and blocks on it behind the synchronous store traits.

use anyhow::{anyhow, Result};
use arrow_array::types::Float32Type;
use arrow_array::{Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Connection, DistanceType};
use std::path::Path;
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing::{debug, info};

use medrag_core::traits::{Collection, Embedder, VectorStore};
use medrag_core::types::{Category, ChunkKind, ChunkMetadata, QueryResult};

use crate::schema::{build_collection_schema, build_meta_schema, META_TABLE};
use crate::{check_embedder, check_parallel, embed_in_batches};

pub async fn open_db(uri: &str) -> Result<Connection> {
	Ok(connect(uri).execute().await?)
}

async fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
	Ok(conn.table_names().execute().await?.iter().any(|t| t == name))
}

pub async fn ensure_table(conn: &Connection, name: &str, schema: Arc<arrow_schema::Schema>) -> Result<()> {
	if table_exists(conn, name).await? {
		return Ok(());
	}
	// create empty table with 0 rows
	let iter = RecordBatchIterator::new(vec![].into_iter(), schema.clone());
	conn.create_table(name, Box::new(iter)).execute().await?;
	Ok(())
}

pub async fn set_meta(conn: &Connection, key: &str, value: &str) -> Result<()> {
	ensure_table(conn, META_TABLE, build_meta_schema()).await?;
	let t = conn.open_table(META_TABLE).execute().await?;
	let rb = RecordBatch::try_new(
		build_meta_schema(),
		vec![Arc::new(StringArray::from(vec![key.to_string()])), Arc::new(StringArray::from(vec![value.to_string()]))],
	)?;
	let reader = Box::new(RecordBatchIterator::new(vec![Ok(rb)].into_iter(), build_meta_schema()));
	// key is unique
	let mut mi = t.merge_insert(&["key"]);
	mi.when_matched_update_all(None).when_not_matched_insert_all();
	mi.execute(reader).await?;
	Ok(())
}

pub async fn get_meta(conn: &Connection, key: &str) -> Result<Option<String>> {
	if !table_exists(conn, META_TABLE).await? {
		return Ok(None);
	}
	let t = conn.open_table(META_TABLE).execute().await?;
	let mut stream = t.query().only_if(format!("key = '{}'", key.replace('\'', "''"))).execute().await?;
	while let Some(batch) = stream.try_next().await? {
		if batch.num_rows() == 0 {
			continue;
		}
		return Ok(Some(string_column(&batch, "value")?.value(0).to_string()));
	}
	Ok(None)
}

fn embedder_key(collection: &str) -> String {
	format!("embedder:{collection}")
}

pub struct LanceStore {
	conn: Connection,
	rt: Arc<Runtime>,
	batch_size: usize,
}

impl LanceStore {
	pub fn open(dir: &Path, batch_size: usize) -> Result<Self> {
		std::fs::create_dir_all(dir)?;
		let rt = Runtime::new()?;
		let conn = rt.block_on(open_db(&dir.to_string_lossy()))?;
		info!(path = %dir.display(), "opened lance store");
		Ok(Self { conn, rt: Arc::new(rt), batch_size })
	}

	fn bind(&self, name: &str, embedder: Arc<dyn Embedder>) -> Arc<dyn Collection> {
		Arc::new(LanceCollection {
			name: name.to_string(),
			conn: self.conn.clone(),
			rt: Arc::clone(&self.rt),
			embedder,
			batch_size: self.batch_size,
		})
	}
}

impl VectorStore for LanceStore {
	fn get_or_create_collection(&self, name: &str, embedder: Arc<dyn Embedder>) -> Result<Arc<dyn Collection>> {
		let dim = i32::try_from(embedder.dim())?;
		self.rt.block_on(async {
			match get_meta(&self.conn, &embedder_key(name)).await? {
				Some(expected) => check_embedder(name, &expected, embedder.as_ref())?,
				None => set_meta(&self.conn, &embedder_key(name), embedder.embedder_id()).await?,
			}
			ensure_table(&self.conn, name, build_collection_schema(dim)).await
		})?;
		debug!(collection = name, "lance collection ready");
		Ok(self.bind(name, embedder))
	}

	fn get_collection(&self, name: &str, embedder: Arc<dyn Embedder>) -> Result<Option<Arc<dyn Collection>>> {
		let found = self.rt.block_on(async {
			if !table_exists(&self.conn, name).await? {
				return Ok::<_, anyhow::Error>(false);
			}
			if let Some(expected) = get_meta(&self.conn, &embedder_key(name)).await? {
				check_embedder(name, &expected, embedder.as_ref())?;
			}
			Ok(true)
		})?;
		Ok(found.then(|| self.bind(name, embedder)))
	}
}

pub struct LanceCollection {
	name: String,
	conn: Connection,
	rt: Arc<Runtime>,
	embedder: Arc<dyn Embedder>,
	batch_size: usize,
}

impl LanceCollection {
	fn to_record_batch(&self, documents: &[String], metadatas: &[ChunkMetadata], ids: &[String], vectors: Vec<Vec<f32>>) -> Result<RecordBatch> {
		let dim = i32::try_from(self.embedder.dim())?;
		let vectors = vectors.into_iter().map(|v| Some(v.into_iter().map(Some).collect::<Vec<_>>()));
		let batch = RecordBatch::try_new(
			build_collection_schema(dim),
			vec![
				Arc::new(StringArray::from(ids.to_vec())),
				Arc::new(StringArray::from(documents.to_vec())),
				Arc::new(StringArray::from(metadatas.iter().map(|m| m.kind.as_str()).collect::<Vec<_>>())),
				Arc::new(StringArray::from(metadatas.iter().map(|m| m.category.map(Category::as_str)).collect::<Vec<_>>())),
				Arc::new(StringArray::from(metadatas.iter().map(|m| m.condition.clone()).collect::<Vec<_>>())),
				Arc::new(StringArray::from(metadatas.iter().map(|m| m.case_id.clone()).collect::<Vec<_>>())),
				Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors, dim)),
			],
		)?;
		Ok(batch)
	}
}

impl Collection for LanceCollection {
	fn name(&self) -> &str {
		&self.name
	}

	fn count(&self) -> Result<usize> {
		self.rt.block_on(async {
			let table = self.conn.open_table(&self.name).execute().await?;
			Ok(table.count_rows(None).await?)
		})
	}

	fn add(&self, documents: &[String], metadatas: &[ChunkMetadata], ids: &[String], progress: &mut dyn FnMut(usize, usize)) -> Result<()> {
		check_parallel(documents.len(), metadatas.len(), ids.len())?;
		if documents.is_empty() {
			return Ok(());
		}
		let vectors = embed_in_batches(self.embedder.as_ref(), documents, self.batch_size, progress)?;
		let batch = self.to_record_batch(documents, metadatas, ids, vectors)?;
		let schema = batch.schema();
		self.rt.block_on(async {
			let table = self.conn.open_table(&self.name).execute().await?;
			let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
			// Upsert on id: re-adding an id replaces the row.
			let mut mi = table.merge_insert(&["id"]);
			mi.when_matched_update_all(None).when_not_matched_insert_all();
			mi.execute(reader).await?;
			Ok::<_, anyhow::Error>(())
		})?;
		debug!(collection = %self.name, added = ids.len(), "added documents");
		Ok(())
	}

	fn query(&self, query_texts: &[String], n_results: usize) -> Result<QueryResult> {
		let queries = self.embedder.embed_batch(query_texts)?;
		let mut result = QueryResult::default();
		for q in queries {
			let mut rows: Vec<(String, String, ChunkMetadata, f32)> = Vec::new();
			if n_results > 0 {
				rows = self.rt.block_on(async {
					let table = self.conn.open_table(&self.name).execute().await?;
					let mut stream = table.vector_search(q)?.distance_type(DistanceType::Cosine).limit(n_results).execute().await?;
					let mut rows = Vec::new();
					while let Some(batch) = stream.try_next().await? {
						rows.extend(rows_from_batch(&batch)?);
					}
					Ok::<_, anyhow::Error>(rows)
				})?;
			}
			rows.sort_by(|a, b| a.3.total_cmp(&b.3));
			rows.truncate(n_results);
			result.ids.push(rows.iter().map(|r| r.0.clone()).collect());
			result.documents.push(rows.iter().map(|r| r.1.clone()).collect());
			result.metadatas.push(rows.iter().map(|r| r.2.clone()).collect());
			result.distances.push(rows.iter().map(|r| r.3).collect());
		}
		Ok(result)
	}
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
	batch
		.column_by_name(name)
		.and_then(|c| c.as_any().downcast_ref::<StringArray>())
		.ok_or_else(|| anyhow!("column '{name}' missing or not utf8"))
}

fn optional(col: &StringArray, i: usize) -> Option<String> {
	col.is_valid(i).then(|| col.value(i).to_string())
}

fn rows_from_batch(batch: &RecordBatch) -> Result<Vec<(String, String, ChunkMetadata, f32)>> {
	let ids = string_column(batch, "id")?;
	let contents = string_column(batch, "content")?;
	let kinds = string_column(batch, "type")?;
	let categories = string_column(batch, "category")?;
	let conditions = string_column(batch, "condition")?;
	let case_ids = string_column(batch, "case_id")?;
	let distances = batch
		.column_by_name("_distance")
		.and_then(|c| c.as_any().downcast_ref::<Float32Array>())
		.ok_or_else(|| anyhow!("_distance column missing"))?;

	let mut rows = Vec::with_capacity(batch.num_rows());
	for i in 0..batch.num_rows() {
		let kind: ChunkKind = serde_json::from_value(serde_json::Value::String(kinds.value(i).to_string()))?;
		let category = optional(categories, i).map(|c| serde_json::from_value::<Category>(serde_json::Value::String(c))).transpose()?;
		let metadata = ChunkMetadata { kind, category, condition: optional(conditions, i), case_id: optional(case_ids, i) };
		rows.push((ids.value(i).to_string(), contents.value(i).to_string(), metadata, distances.value(i)));
	}
	Ok(rows)
}
