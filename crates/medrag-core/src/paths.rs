//! Locates the knowledge-graph and case trees inside an extracted corpus root.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::{resolve_with_base, CorpusSettings};
use crate::error::Error;

pub const DEFAULT_KNOWLEDGE_CANDIDATES: &[&str] = &[
    "mimic-iv-ext-direct-1.0/mimic-iv-ext-direct-1.0/diagnostic_kg/Diagnosis_flowchart",
    "mimic-iv-ext-direct-1.0/diagnostic_kg/Diagnosis_flowchart",
    "diagnostic_kg/Diagnosis_flowchart",
    "Diagnosis_flowchart",
];

pub const DEFAULT_CASE_CANDIDATES: &[&str] = &[
    "mimic-iv-ext-direct-1.0/mimic-iv-ext-direct-1.0/Finished",
    "mimic-iv-ext-direct-1.0/Finished",
    "Finished",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorpusTree {
    KnowledgeGraph,
    Cases,
}

impl fmt::Display for CorpusTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::KnowledgeGraph => "knowledge-graph",
            Self::Cases => "cases",
        })
    }
}

#[derive(Debug, Clone)]
pub struct PathResolver {
    knowledge_candidates: Vec<String>,
    case_candidates: Vec<String>,
}

impl Default for PathResolver {
    fn default() -> Self {
        Self::from_settings(&CorpusSettings::default())
    }
}

impl PathResolver {
    pub fn new(knowledge_candidates: Vec<String>, case_candidates: Vec<String>) -> Self {
        Self { knowledge_candidates, case_candidates }
    }

    pub fn from_settings(settings: &CorpusSettings) -> Self {
        Self::new(settings.knowledge_candidates.clone(), settings.case_candidates.clone())
    }

    pub fn candidates(&self, tree: CorpusTree) -> &[String] {
        match tree {
            CorpusTree::KnowledgeGraph => &self.knowledge_candidates,
            CorpusTree::Cases => &self.case_candidates,
        }
    }

    /// First candidate under `root` that is an existing directory, in list order.
    /// Read-only; "not found" is a recoverable [`Error::PathNotFound`].
    pub fn resolve(&self, root: &Path, tree: CorpusTree) -> Result<PathBuf, Error> {
        for candidate in self.candidates(tree) {
            let path = resolve_with_base(root, candidate);
            if path.is_dir() {
                debug!(%tree, path = %path.display(), "resolved corpus directory");
                return Ok(path);
            }
        }
        Err(Error::PathNotFound { tree, root: root.to_path_buf() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn first_existing_candidate_wins() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("mimic-iv-ext-direct-1.0/Finished")).unwrap();
        fs::create_dir_all(tmp.path().join("Finished")).unwrap();

        let resolver = PathResolver::default();
        let dir = resolver.resolve(tmp.path(), CorpusTree::Cases).unwrap();
        assert_eq!(dir, tmp.path().join("mimic-iv-ext-direct-1.0/Finished"));
    }

    #[test]
    fn plain_file_is_not_a_match() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("Diagnosis_flowchart"), "not a dir").unwrap();

        let resolver = PathResolver::default();
        let err = resolver.resolve(tmp.path(), CorpusTree::KnowledgeGraph).unwrap_err();
        assert!(matches!(err, Error::PathNotFound { tree: CorpusTree::KnowledgeGraph, .. }));
    }
}
