//! medrag: extract, index and query a medical JSON corpus.
//!
//! Usage:
//!   medrag [--config file] [--root dir] extract [--json]
//!   medrag [--config file] [--root dir] index
//!   medrag [--config file] query <question> [--top-k N]
//!   medrag [--config file] ask <question> [--top-k N]

mod logging;
mod progress;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{info, warn};

use medrag_core::config::{Config, Settings};
use medrag_core::data_processor::{DataProcessor, ExtractionReport, TreeOutcome};
use medrag_core::paths::CorpusTree;
use medrag_core::types::CollectionKind;
use medrag_rag::{pipeline_from_settings, rebuild_pipeline_from_settings, CollectionOutcome, GeminiComposer, IndexReport, Retrieval};

use crate::progress::Bars;

#[derive(Parser)]
#[command(name = "medrag", version, about = "Medical corpus retrieval pipeline")]
struct Cli {
    /// Configuration file used instead of ./medrag.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Extracted corpus root (overrides corpus.root)
    #[arg(long, global = true)]
    root: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract chunks and print a summary
    Extract {
        /// Print every chunk as one JSON line instead
        #[arg(long)]
        json: bool,
    },
    /// Extract and index into the configured store
    Index,
    /// Print the merged context list for a question
    Query {
        question: String,
        /// Results per collection (default: retrieval.top_k)
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        top_k: Option<u32>,
    },
    /// Retrieve context and ask the answer model
    Ask {
        question: String,
        /// Results per collection (default: retrieval.top_k)
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        top_k: Option<u32>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut settings = Config::load(cli.config.as_deref())?.settings()?;
    if let Some(root) = &cli.root {
        settings.corpus.root = root.to_string_lossy().into_owned();
    }
    logging::init(&settings.logging.level)?;

    match cli.command {
        Commands::Extract { json } => extract(&settings, json),
        Commands::Index => index(&settings),
        Commands::Query { question, top_k } => query(&settings, &question, top_k),
        Commands::Ask { question, top_k } => ask(&settings, &question, top_k),
    }
}

fn run_extraction(settings: &Settings, quiet: bool) -> ExtractionReport {
    let root = settings.corpus_root();
    let mut bars = Bars::new(quiet);
    let report = DataProcessor::from_settings(&settings.corpus).process_corpus(&root, &mut |p| bars.update(p));
    bars.finish();
    report
}

fn extract(settings: &Settings, json: bool) -> Result<()> {
    let report = run_extraction(settings, json);
    if json {
        for chunk in &report.chunks {
            println!("{}", serde_json::to_string(chunk)?);
        }
    } else {
        print_extraction(&report);
    }
    if report.is_empty_corpus() {
        bail!("no corpus found under {}", settings.corpus_root().display());
    }
    Ok(())
}

fn print_extraction(report: &ExtractionReport) {
    for tree in [CorpusTree::KnowledgeGraph, CorpusTree::Cases] {
        match report.tree(tree) {
            TreeOutcome::Extracted { dir, files, failed, chunks } => {
                println!("{tree}: {} ({files} files, {failed} skipped, {chunks} chunks)", dir.display());
            }
            TreeOutcome::Unavailable(e) => println!("{tree}: unavailable ({e})"),
        }
    }
    let mut by_kind: BTreeMap<&str, usize> = BTreeMap::new();
    for chunk in &report.chunks {
        *by_kind.entry(chunk.kind().as_str()).or_default() += 1;
    }
    for (kind, count) in &by_kind {
        println!("  {kind}: {count}");
    }
    for w in &report.warnings {
        println!("  skipped: {w}");
    }
    println!("Total chunks: {}", report.chunks.len());
}

fn index(settings: &Settings) -> Result<()> {
    let report = run_extraction(settings, false);
    print_extraction(&report);
    if report.is_empty_corpus() {
        bail!("no corpus found under {}, nothing to index", settings.corpus_root().display());
    }

    let (mut pipeline, handle) = rebuild_pipeline_from_settings(settings)?;
    let mut bars = Bars::new(false);
    let indexed = pipeline.index(&report.chunks, &mut |p| bars.update(p));
    bars.finish();
    print_index(indexed);
    let failures = indexed.failures().count();

    handle.persist()?;
    info!(path = %settings.store_path().display(), "index stored");
    if failures == CollectionKind::ALL.len() {
        bail!("indexing failed for every collection");
    }
    Ok(())
}

fn print_index(report: &IndexReport) {
    for kind in CollectionKind::ALL {
        match report.outcome(kind) {
            CollectionOutcome::Added { count } => println!("{kind}: {count} chunks indexed"),
            CollectionOutcome::Skipped => println!("{kind}: nothing to index"),
            CollectionOutcome::Failed(e) => println!("{kind}: FAILED ({e})"),
        }
    }
}

fn retrieve(settings: &Settings, question: &str, top_k: Option<u32>) -> Result<(medrag_rag::Pipeline, usize)> {
    let (mut pipeline, _handle) = pipeline_from_settings(settings)?;
    pipeline.attach()?;
    let top_k = top_k.map_or(settings.retrieval.top_k, |k| k as usize);
    info!(question, top_k, "retrieving");
    Ok((pipeline, top_k))
}

fn print_contexts(retrieval: &Retrieval) {
    for (i, ctx) in retrieval.contexts.iter().enumerate() {
        let source = if i < retrieval.knowledge_hits { CollectionKind::Knowledge } else { CollectionKind::Case };
        println!("[{}] ({source}) {ctx}", i + 1);
    }
    for e in &retrieval.errors {
        warn!(error = %e, "partial retrieval");
    }
}

fn query(settings: &Settings, question: &str, top_k: Option<u32>) -> Result<()> {
    let (pipeline, top_k) = retrieve(settings, question, top_k)?;
    let retrieval = pipeline.retrieve(question, top_k)?;
    if retrieval.contexts.is_empty() {
        println!("No context found.");
    }
    print_contexts(&retrieval);
    Ok(())
}

fn ask(settings: &Settings, question: &str, top_k: Option<u32>) -> Result<()> {
    let (pipeline, top_k) = retrieve(settings, question, top_k)?;
    let text = match GeminiComposer::from_settings(&settings.answer) {
        Ok(composer) => {
            let answer = pipeline.ask(&composer, question, top_k)?;
            print_contexts(&answer.retrieval);
            answer.text
        }
        Err(e) => format!("Error generating response: {e:#}"),
    };
    println!("\n{text}");
    Ok(())
}
