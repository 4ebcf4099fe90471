//! Case files: `<cases>/[<condition>/...]<case_id>.json` holding narrative
//! fields `input1`..`input6` and arbitrarily nested reasoning annotations.

use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::Error;
use crate::json::{field_text, file_stem, has_json_extension, read_object};
use crate::types::{Chunk, ChunkKind, ChunkMetadata};

/// Condition assigned to case files lying directly under the cases root.
pub const GENERAL_CONDITION: &str = "General";

/// Delimiter marking a reasoning key; the text before it is the finding.
pub const CAUSE_MARKER: &str = "$Cause_";

const NARRATIVE_FIELDS: [&str; 6] = ["input1", "input2", "input3", "input4", "input5", "input6"];
const INPUT_PREFIX: &str = "input";

/// A case file paired with the condition it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseFile {
    pub path: PathBuf,
    pub condition: String,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CaseExtractor;

impl CaseExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Every `.json` file under `dir` exactly once, depth-first with entries
    /// sorted by file name. Files inside a folder take the top-level folder
    /// name as condition; loose files get [`GENERAL_CONDITION`]. Entries
    /// that could not be read come back alongside.
    pub fn list_files(&self, dir: &Path) -> (Vec<CaseFile>, Vec<Error>) {
        let mut files = Vec::new();
        let mut errors = Vec::new();
        for entry in walkdir::WalkDir::new(dir).follow_links(true).min_depth(1).sort_by_file_name() {
            let e = match entry {
                Ok(e) if e.file_type().is_file() && has_json_extension(e.path()) => e,
                Ok(_) => continue,
                Err(err) => {
                    errors.push(Error::walk(dir, err));
                    continue;
                }
            };
            let condition = if e.depth() > 1 {
                e.path()
                    .strip_prefix(dir)
                    .ok()
                    .and_then(|rel| rel.components().next())
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .unwrap_or_else(|| GENERAL_CONDITION.to_string())
            } else {
                GENERAL_CONDITION.to_string()
            };
            files.push(CaseFile { path: e.into_path(), condition });
        }
        (files, errors)
    }

    pub fn extract_file(&self, file: &CaseFile) -> Result<Vec<Chunk>, Error> {
        let doc = read_object(&file.path)?;
        let case_id = file_stem(&file.path);
        let chunks = self.extract_document(&case_id, &file.condition, &doc);
        debug!(path = %file.path.display(), chunks = chunks.len(), "case file extracted");
        Ok(chunks)
    }

    /// Narrative chunk first (if any input field is populated), then one
    /// reasoning chunk per non-`input*` top-level field with findings.
    pub fn extract_document(&self, case_id: &str, condition: &str, doc: &Map<String, Value>) -> Vec<Chunk> {
        let header = |section: &str| format!("Case {case_id} - {condition}\n{section}:\n");
        let mut chunks = Vec::new();

        let lines: Vec<String> = NARRATIVE_FIELDS
            .iter()
            .filter_map(|key| doc.get(*key).and_then(field_text).map(|value| format!("{key}: {value}")))
            .collect();
        if !lines.is_empty() {
            chunks.push(Chunk {
                text: header("Narrative") + &lines.join("\n"),
                metadata: ChunkMetadata::case(ChunkKind::Narrative, case_id, condition),
            });
        }

        for (key, value) in doc {
            if key.starts_with(INPUT_PREFIX) {
                continue;
            }
            let findings = mine_reasoning(value);
            if findings.is_empty() {
                continue;
            }
            chunks.push(Chunk {
                text: header("Reasoning") + &findings.join("\n"),
                metadata: ChunkMetadata::case(ChunkKind::Reasoning, case_id, condition),
            });
        }
        chunks
    }
}

/// Collects the trimmed text before [`CAUSE_MARKER`] from every object key in
/// `value`, at any depth, in document order. A key contributes its own prefix
/// first and then whatever its (object or array) value contains. Scalars
/// contribute nothing.
pub fn mine_reasoning(value: &Value) -> Vec<String> {
    let mut lines = Vec::new();
    collect_reasoning(value, &mut lines);
    lines
}

fn collect_reasoning(value: &Value, lines: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for (key, nested) in map {
                if let Some((finding, _)) = key.split_once(CAUSE_MARKER) {
                    let finding = finding.trim();
                    if !finding.is_empty() {
                        lines.push(finding.to_string());
                    }
                }
                if nested.is_object() || nested.is_array() {
                    collect_reasoning(nested, lines);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_reasoning(item, lines);
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) | Value::String(_) => {}
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
    fn miner_takes_outer_key_before_nested() {
        let v = json!({"x$Cause_foo": 1, "nested": {"y$Cause_bar": 2}});
        assert_eq!(mine_reasoning(&v).join("\n"), "x\ny");
    }

    #[test]
    fn miner_walks_arrays_and_key_values_together() {
        let v = json!([
            {" chest pain $Cause_1": {"  troponin high$Cause_2": null}},
            "scalar$Cause_ignored",
            [[{"deep$Cause_3": [{"deeper$Cause_4": true}]}]],
            {"$Cause_blank": {}}
        ]);
        assert_eq!(mine_reasoning(&v), ["chest pain", "troponin high", "deep", "deeper"]);
    }

    #[test]
    fn miner_finds_nothing_without_markers() {
        let v = json!({"a": {"b": [1, 2, {"c": "Cause_ no dollar"}]}});
        assert!(mine_reasoning(&v).is_empty());
        assert!(mine_reasoning(&json!("x$Cause_y")).is_empty());
    }

    #[test]
    fn narrative_keeps_numeric_order_and_skips_blank_inputs() {
        let d = doc(json!({
            "input5": "five",
            "input1": "one",
            "input2": "",
            "input3": "three",
            "input4": null
        }));
        let chunks = CaseExtractor::new().extract_document("c7", "Stroke", &d);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Case c7 - Stroke\nNarrative:\ninput1: one\ninput3: three\ninput5: five");
        assert_eq!(chunks[0].metadata, ChunkMetadata::case(ChunkKind::Narrative, "c7", "Stroke"));
    }

    #[test]
    fn one_reasoning_chunk_per_top_level_field() {
        let d = doc(json!({
            "input1": "history",
            "Hypertension$Cause_1": {"a$Cause_x": {"b$Cause_y": "leaf"}},
            "notes": {"plain": "nothing here"},
            "input7": {"skipped$Cause_z": 1},
            "dx": [{"c$Cause_q": 0}]
        }));
        let chunks = CaseExtractor::new().extract_document("c1", "General", &d);
        let texts: Vec<_> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(
            texts,
            [
                "Case c1 - General\nNarrative:\ninput1: history",
                "Case c1 - General\nReasoning:\na\nb",
                "Case c1 - General\nReasoning:\nc",
            ]
        );
        assert!(chunks[1..].iter().all(|c| c.kind() == ChunkKind::Reasoning));
    }

    #[test]
    fn no_inputs_and_no_markers_produce_no_chunks() {
        let d = doc(json!({"meta": {"k": "v"}, "input2": "  "}));
        assert!(CaseExtractor::new().extract_document("c0", "General", &d).is_empty());
    }
}
