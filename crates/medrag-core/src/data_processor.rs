use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::cases::{CaseExtractor, CaseFile};
use crate::config::CorpusSettings;
use crate::error::Error;
use crate::knowledge::KnowledgeExtractor;
use crate::paths::{CorpusTree, PathResolver};
use crate::types::{Chunk, Progress, Stage};

/// One unit of extraction work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceFile {
    Knowledge(PathBuf),
    Case(CaseFile),
}

impl SourceFile {
    pub fn tree(&self) -> CorpusTree {
        match self {
            Self::Knowledge(_) => CorpusTree::KnowledgeGraph,
            Self::Case(_) => CorpusTree::Cases,
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::Knowledge(path) => path,
            Self::Case(file) => &file.path,
        }
    }
}

/// What happened to one of the two corpus trees.
#[derive(Debug)]
pub enum TreeOutcome {
    Extracted { dir: PathBuf, files: usize, failed: usize, chunks: usize },
    /// [`Error::PathNotFound`] or [`Error::EmptyCorpus`].
    Unavailable(Error),
}

impl TreeOutcome {
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Extracted { .. })
    }

    /// `None` marks a file that was skipped.
    fn record(&mut self, extracted: Option<usize>) {
        if let Self::Extracted { failed, chunks, .. } = self {
            match extracted {
                Some(n) => *chunks += n,
                None => *failed += 1,
            }
        }
    }
}

/// Ordered work list for one extraction run. Callers may drive it file by
/// file with [`DataProcessor::extract_file`] and stop between files.
#[derive(Debug)]
pub struct ExtractionPlan {
    pub files: Vec<SourceFile>,
    pub knowledge: TreeOutcome,
    pub cases: TreeOutcome,
    /// Directory entries that could not be listed; each one is a skipped file.
    pub warnings: Vec<Error>,
}

#[derive(Debug)]
pub struct ExtractionReport {
    /// Unified chunk list: knowledge files first, then case files.
    pub chunks: Vec<Chunk>,
    pub knowledge: TreeOutcome,
    pub cases: TreeOutcome,
    /// File-level errors, listing failures included; each one skipped a single file.
    pub warnings: Vec<Error>,
}

impl ExtractionReport {
    /// Neither tree could be resolved or populated.
    pub fn is_empty_corpus(&self) -> bool {
        !self.knowledge.is_available() && !self.cases.is_available()
    }

    pub fn tree(&self, tree: CorpusTree) -> &TreeOutcome {
        match tree {
            CorpusTree::KnowledgeGraph => &self.knowledge,
            CorpusTree::Cases => &self.cases,
        }
    }
}

#[derive(Debug, Default)]
pub struct DataProcessor {
    resolver: PathResolver,
    knowledge: KnowledgeExtractor,
    cases: CaseExtractor,
}

impl DataProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resolver(resolver: PathResolver) -> Self {
        Self { resolver, ..Self::default() }
    }

    pub fn from_settings(settings: &CorpusSettings) -> Self {
        Self::with_resolver(PathResolver::from_settings(settings))
    }

    /// Resolves both trees under `root` and lists their files in the pinned
    /// order. Never fails: unavailable trees are reported in the plan.
    pub fn plan(&self, root: &Path) -> ExtractionPlan {
        let mut files = Vec::new();
        let mut warnings = Vec::new();

        let knowledge = match self.resolver.resolve(root, CorpusTree::KnowledgeGraph) {
            Ok(dir) => {
                let (found, errors) = self.knowledge.list_files(&dir);
                let outcome = Self::outcome_for(CorpusTree::KnowledgeGraph, dir, found.len(), &errors);
                files.extend(found.into_iter().map(SourceFile::Knowledge));
                warnings.extend(errors);
                outcome
            }
            Err(e) => TreeOutcome::Unavailable(e),
        };

        let cases = match self.resolver.resolve(root, CorpusTree::Cases) {
            Ok(dir) => {
                let (found, errors) = self.cases.list_files(&dir);
                let outcome = Self::outcome_for(CorpusTree::Cases, dir, found.len(), &errors);
                files.extend(found.into_iter().map(SourceFile::Case));
                warnings.extend(errors);
                outcome
            }
            Err(e) => TreeOutcome::Unavailable(e),
        };

        for e in &warnings {
            warn!(error = %e, "skipping unlistable entry");
        }
        for outcome in [&knowledge, &cases] {
            if let TreeOutcome::Unavailable(e) = outcome {
                warn!(error = %e, "corpus tree unavailable");
            }
        }
        ExtractionPlan { files, knowledge, cases, warnings }
    }

    pub fn extract_file(&self, file: &SourceFile) -> Result<Vec<Chunk>, Error> {
        match file {
            SourceFile::Knowledge(path) => self.knowledge.extract_file(path),
            SourceFile::Case(case) => self.cases.extract_file(case),
        }
    }

    /// Runs the whole plan. A bad file is logged and skipped; the run only
    /// comes back empty when there were no files to process at all.
    pub fn process_corpus(&self, root: &Path, progress: &mut dyn FnMut(Progress)) -> ExtractionReport {
        let ExtractionPlan { files, mut knowledge, mut cases, mut warnings } = self.plan(root);
        let total = files.len();
        info!(root = %root.display(), files = total, "extracting corpus");

        let mut chunks = Vec::new();
        for (done, file) in files.iter().enumerate() {
            let extracted = match self.extract_file(file) {
                Ok(found) => {
                    let n = found.len();
                    chunks.extend(found);
                    Some(n)
                }
                Err(e) => {
                    warn!(path = %file.path().display(), error = %e, "skipping unreadable file");
                    warnings.push(e);
                    None
                }
            };
            match file.tree() {
                CorpusTree::KnowledgeGraph => knowledge.record(extracted),
                CorpusTree::Cases => cases.record(extracted),
            }
            progress(Progress { stage: Stage::Extracting, done: done + 1, total });
        }

        info!(files = total, chunks = chunks.len(), skipped = warnings.len(), "extraction finished");
        ExtractionReport { chunks, knowledge, cases, warnings }
    }

    /// Listing failures count as skipped files of the tree.
    fn outcome_for(tree: CorpusTree, dir: PathBuf, files: usize, errors: &[Error]) -> TreeOutcome {
        if files == 0 && errors.is_empty() {
            TreeOutcome::Unavailable(Error::EmptyCorpus { tree, dir })
        } else {
            TreeOutcome::Extracted { dir, files: files + errors.len(), failed: errors.len(), chunks: 0 }
        }
    }
}
