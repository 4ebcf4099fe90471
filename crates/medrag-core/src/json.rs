//! Small helpers over `serde_json::Value` shared by the extractors.

use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

use crate::error::Error;

/// Reads `path` and requires a JSON object at the top level.
pub(crate) fn read_object(path: &Path) -> Result<Map<String, Value>, Error> {
    let raw = fs::read(path).map_err(|source| Error::Io { path: path.to_path_buf(), source })?;
    match serde_json::from_slice::<Value>(&raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(Error::parse(path, format!("expected a JSON object at top level, found {}", type_name(&other)))),
        Err(e) => Err(Error::parse(path, e)),
    }
}

/// Display text of a field, or `None` when there is nothing to store:
/// null, blank strings, empty arrays and empty objects. Other non-string
/// values are rendered as compact JSON.
pub(crate) fn field_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Array(items) if items.is_empty() => None,
        Value::Object(map) if map.is_empty() => None,
        other => Some(other.to_string()),
    }
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

pub(crate) fn has_json_extension(path: &Path) -> bool {
    path.extension().and_then(|s| s.to_str()) == Some("json")
}

/// File name without extension.
pub(crate) fn file_stem(path: &Path) -> String {
    path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default()
}
