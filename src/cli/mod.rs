//! Command-line front-end for the knowledge pipeline.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};

use crate::models::OutputFormat;

/// Ingest documents into a companion-tagged knowledge base and retrieve
/// grounding context for free-text questions.
#[derive(Debug, Parser)]
#[command(name = "kpipe")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[arg(
        long,
        short = 'f',
        global = true,
        help = "Output format: text, json, or markdown"
    )]
    pub format: Option<OutputFormat>,

    #[arg(long, short = 'v', global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Check embedding provider and knowledge store health
    Status,

    /// Chunk, classify, embed and store documents from a file or directory
    Ingest(commands::IngestArgs),

    /// Retrieve knowledge relevant to a question
    Search(commands::SearchArgs),

    /// Show chunk totals per companion and category
    Stats,

    /// Manage configuration
    #[command(subcommand)]
    Config(commands::ConfigCommand),
}
