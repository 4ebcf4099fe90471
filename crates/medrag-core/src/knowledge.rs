//! Knowledge-graph files: `<condition>.json` with
//! `{"knowledge": {<stage>: {"Risk Factors"?: .., "Symptoms"?: ..}}}`.

use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::Error;
use crate::json::{field_text, file_stem, has_json_extension, read_object, type_name};
use crate::types::{Category, Chunk, ChunkMetadata};

#[derive(Debug, Default, Clone, Copy)]
pub struct KnowledgeExtractor;

impl KnowledgeExtractor {
    pub fn new() -> Self {
        Self
    }

    /// `.json` files directly inside `dir`, sorted by file name, plus the
    /// entries that could not be read.
    pub fn list_files(&self, dir: &Path) -> (Vec<PathBuf>, Vec<Error>) {
        let mut files = Vec::new();
        let mut errors = Vec::new();
        let walker = walkdir::WalkDir::new(dir)
            .follow_links(true)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name();
        for entry in walker {
            match entry {
                Ok(e) if e.file_type().is_file() && has_json_extension(e.path()) => files.push(e.into_path()),
                Ok(_) => {}
                Err(err) => errors.push(Error::walk(dir, err)),
            }
        }
        (files, errors)
    }

    pub fn extract_file(&self, path: &Path) -> Result<Vec<Chunk>, Error> {
        let doc = read_object(path)?;
        let condition = file_stem(path);
        let chunks = self.extract_document(&condition, &doc).map_err(|reason| Error::parse(path, reason))?;
        debug!(path = %path.display(), chunks = chunks.len(), "knowledge file extracted");
        Ok(chunks)
    }

    /// Stage-map order, then `Risk Factors` before `Symptoms` within a stage.
    /// A missing `knowledge` key yields no chunks; a non-object one is malformed.
    pub fn extract_document(&self, condition: &str, doc: &Map<String, Value>) -> Result<Vec<Chunk>, String> {
        let stages = match doc.get("knowledge") {
            None => return Ok(Vec::new()),
            Some(Value::Object(stages)) => stages,
            Some(other) => return Err(format!("'knowledge' must be an object, found {}", type_name(other))),
        };

        let mut chunks = Vec::new();
        for fields in stages.values() {
            let Value::Object(fields) = fields else { continue };
            for category in Category::ALL {
                let Some(value) = fields.get(category.field_name()).and_then(field_text) else { continue };
                chunks.push(Chunk {
                    text: format!("{condition} - {}: {value}", category.field_name()),
                    metadata: ChunkMetadata::knowledge(category, condition),
                });
            }
        }
        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn two_chunks_per_full_stage_in_order() {
        let d = doc(json!({"knowledge": {
            "Stage 1": {"Symptoms": "wheeze", "Risk Factors": "smoking"},
            "Stage 2": {"Risk Factors": "allergens", "Symptoms": "dyspnea"}
        }}));
        let chunks = KnowledgeExtractor::new().extract_document("Asthma", &d).unwrap();
        let texts: Vec<_> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(
            texts,
            [
                "Asthma - Risk Factors: smoking",
                "Asthma - Symptoms: wheeze",
                "Asthma - Risk Factors: allergens",
                "Asthma - Symptoms: dyspnea",
            ]
        );
        assert_eq!(chunks[1].metadata, ChunkMetadata::knowledge(Category::Symptoms, "Asthma"));
    }

    #[test]
    fn stages_without_fields_or_non_objects_contribute_nothing() {
        let d = doc(json!({"knowledge": {
            "Stage 1": {"Notes": "none"},
            "Stage 2": "free text",
            "Stage 3": {"Symptoms": "", "Risk Factors": null},
            "Stage 4": {"Symptoms": "fever"}
        }}));
        let chunks = KnowledgeExtractor::new().extract_document("Flu", &d).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Flu - Symptoms: fever");
    }

    #[test]
    fn missing_knowledge_is_empty_but_wrong_shape_is_an_error() {
        let ex = KnowledgeExtractor::new();
        assert!(ex.extract_document("X", &doc(json!({"other": 1}))).unwrap().is_empty());
        assert!(ex.extract_document("X", &doc(json!({"knowledge": [1, 2]}))).is_err());
    }
}
