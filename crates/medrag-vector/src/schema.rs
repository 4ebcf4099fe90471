use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

/// Key/value table recording which embedder built each collection.
pub const META_TABLE: &str = "meta";

pub fn build_collection_schema(dim: i32) -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new("id", DataType::Utf8, false),
		Field::new("content", DataType::Utf8, false),
		Field::new("type", DataType::Utf8, false),
		Field::new("category", DataType::Utf8, true),
		Field::new("condition", DataType::Utf8, true),
		Field::new("case_id", DataType::Utf8, true),
		Field::new("vector", DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim), true),
	]))
}

pub fn build_meta_schema() -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new("key", DataType::Utf8, false),
		Field::new("value", DataType::Utf8, false),
	]))
}
