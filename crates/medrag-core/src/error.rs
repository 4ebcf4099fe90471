use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::paths::CorpusTree;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("No {tree} directory found under {}", root.display())]
    PathNotFound { tree: CorpusTree, root: PathBuf },

    #[error("No {tree} files found in {}", dir.display())]
    EmptyCorpus { tree: CorpusTree, dir: PathBuf },

    #[error("Failed to parse {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("Indexing into collection '{collection}' failed: {reason}")]
    Index { collection: String, reason: String },

    #[error("Query against collection '{collection}' failed: {reason}")]
    Query { collection: String, reason: String },

    #[error("Collection '{collection}' was built with embedder '{expected}', not '{actual}'")]
    EmbedderMismatch { collection: String, expected: String, actual: String },

    #[error("Retrieval requested before indexing completed")]
    NotIndexed,

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// File-level errors are isolated: the surrounding batch carries on.
    pub fn is_file_level(&self) -> bool {
        matches!(self, Self::Parse { .. } | Self::Io { .. })
    }

    pub fn parse(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Parse { path: path.into(), reason: reason.to_string() }
    }

    /// A failed directory entry while listing `dir`, blamed on the entry
    /// itself when walkdir knows it.
    pub fn walk(dir: &Path, err: walkdir::Error) -> Self {
        let path = err.path().map_or_else(|| dir.to_path_buf(), Path::to_path_buf);
        Self::Io { path, source: err.into() }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
