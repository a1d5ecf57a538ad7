//! Ingest command implementation.

use anyhow::{Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{build_embedder, build_store};
use crate::cli::output::{DocumentPreview, get_formatter};
use crate::models::{Category, Companion, Config, OutputFormat, Priority, SourceDocument};
use crate::services::{Chunker, IngestionPipeline};
use crate::utils::{collect_documents, read_file_content};

#[derive(Debug, Args)]
pub struct IngestArgs {
    /// File or directory to ingest
    #[arg(required = true)]
    pub path: PathBuf,

    /// Pin the companion instead of inferring it per chunk
    #[arg(long)]
    pub companion: Option<Companion>,

    /// Pin the category instead of inferring it per chunk
    #[arg(long)]
    pub category: Option<Category>,

    /// Pin the priority instead of inferring it per chunk
    #[arg(long)]
    pub priority: Option<Priority>,

    /// Labels attached to every stored chunk (comma-separated)
    #[arg(long, short = 't', value_delimiter = ',')]
    pub tags: Vec<String>,

    /// File patterns to exclude (can be specified multiple times)
    #[arg(long, short = 'e')]
    pub exclude: Vec<String>,

    /// Show the chunks that would be stored without embedding anything
    #[arg(long)]
    pub dry_run: bool,
}

impl IngestArgs {
    fn document(&self, content: String, source: String) -> SourceDocument {
        SourceDocument {
            content,
            source,
            companion: self.companion,
            category: self.category,
            priority: self.priority,
            tags: self
                .tags
                .iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }
}

pub async fn handle_ingest(
    args: IngestArgs,
    config: &Config,
    format: OutputFormat,
    verbose: bool,
) -> Result<()> {
    let formatter = get_formatter(format);

    if !args.path.exists() {
        anyhow::bail!("path does not exist: {}", args.path.display());
    }

    let mut exclude = config.ingestion.exclude_patterns.clone();
    exclude.extend(args.exclude.iter().cloned());

    let files = collect_documents(&args.path, &exclude)
        .with_context(|| format!("failed to scan {}", args.path.display()))?;

    if files.is_empty() {
        println!("{}", formatter.format_message("No documents found to ingest."));
        return Ok(());
    }

    let documents = read_documents(&args, &files, config.ingestion.max_file_size, verbose)?;

    if args.dry_run {
        let chunker = Chunker::new(&config.chunking);
        let previews: Vec<DocumentPreview> = documents
            .iter()
            .map(|doc| DocumentPreview {
                source: doc.source.clone(),
                chunks: chunker.chunk(&doc.content, &doc.source),
            })
            .collect();
        print!("{}", formatter.format_preview(&previews));
        return Ok(());
    }

    let embedder = build_embedder(config)?;
    let store = build_store(config).await?;
    store
        .ensure_collection()
        .await
        .context("failed to prepare knowledge collection")?;

    let pipeline = IngestionPipeline::new(embedder, store, &config.chunking, &config.ingestion);

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    spinner.set_message(format!("Ingesting {} documents", documents.len()));
    spinner.enable_steady_tick(Duration::from_millis(120));

    let report = pipeline.ingest_batch(&documents).await;

    spinner.finish_and_clear();

    print!("{}", formatter.format_ingestion(&report));

    if report.chunk_failures() > 0 {
        eprintln!(
            "\nWarning: {} chunks were not stored. Re-run ingest once the provider and store are healthy.",
            report.chunk_failures()
        );
    }

    Ok(())
}

fn read_documents(
    args: &IngestArgs,
    files: &[PathBuf],
    max_file_size: u64,
    verbose: bool,
) -> Result<Vec<SourceDocument>> {
    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );

    let mut documents = Vec::with_capacity(files.len());
    for path in files {
        pb.inc(1);

        match read_file_content(path, max_file_size) {
            Ok(content) if content.trim().is_empty() => {
                if verbose {
                    pb.println(format!("Skipping {}: empty file", path.display()));
                }
            }
            Ok(content) => documents.push(args.document(content, source_name(path))),
            Err(e) => {
                if verbose {
                    pb.println(format!("Skipping {}: {}", path.display(), e));
                }
            }
        }
    }

    pb.finish_and_clear();
    Ok(documents)
}

fn source_name(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
