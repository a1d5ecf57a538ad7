use anyhow::{Context, Result};
use clap::Args;

use super::{build_embedder, build_store};
use crate::cli::output::get_formatter;
use crate::models::{
    Category, Companion, Config, OutputFormat, Priority, RetrievalQuery, SearchFilters,
};
use crate::services::RetrievalService;

#[derive(Debug, Args)]
pub struct SearchArgs {
    #[arg(required = true, help = "Question or search text")]
    pub query: String,

    #[arg(long = "top-k", short = 'k', help = "Maximum number of chunks to return")]
    pub top_k: Option<usize>,

    #[arg(long, short = 't', help = "Minimum similarity score")]
    pub threshold: Option<f32>,

    #[arg(long, help = "Restrict to one companion (universal chunks always match)")]
    pub companion: Option<Companion>,

    #[arg(long, help = "Restrict to one category")]
    pub category: Option<Category>,

    #[arg(long, help = "Restrict to one priority")]
    pub priority: Option<Priority>,

    #[arg(long, help = "Print the assembled grounding context")]
    pub context: bool,
}

impl SearchArgs {
    fn to_query(&self) -> RetrievalQuery {
        RetrievalQuery {
            text: self.query.clone(),
            filters: SearchFilters {
                companion: self.companion,
                category: self.category,
                priority: self.priority,
            },
            top_k: self.top_k,
            threshold: self.threshold,
        }
    }
}

pub async fn handle_search(
    args: SearchArgs,
    config: &Config,
    format: OutputFormat,
    verbose: bool,
) -> Result<()> {
    let formatter = get_formatter(format);
    let query = args.to_query();

    if verbose {
        eprintln!("Query: \"{}\"", query.text.trim());
        eprintln!("  Top K: {}", query.top_k.unwrap_or(config.retrieval.top_k));
        eprintln!(
            "  Threshold: {:.3}",
            query.threshold.unwrap_or(config.retrieval.threshold)
        );
        if !query.filters.is_empty() {
            eprintln!("  Filters: {:?}", query.filters);
        }
    }

    let embedder = build_embedder(config)?;
    let store = build_store(config).await?;
    let service = RetrievalService::new(embedder, store, &config.retrieval);

    let result = service.retrieve(&query).await.context("retrieval failed")?;

    if verbose {
        eprintln!("Retrieved {} chunks in {}ms", result.len(), result.duration_ms);
        eprintln!();
    }

    print!("{}", formatter.format_retrieval(&result, args.context));

    if !result.has_grounding() {
        eprintln!("Hint: no chunk passed the threshold. Try --threshold with a lower value.");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_query_carries_filters() {
        let args = SearchArgs {
            query: "refund policy".to_string(),
            top_k: Some(2),
            threshold: None,
            companion: Some(Companion::SuperSal),
            category: None,
            priority: Some(Priority::High),
            context: false,
        };

        let query = args.to_query();
        assert_eq!(query.text, "refund policy");
        assert_eq!(query.top_k, Some(2));
        assert_eq!(query.threshold, None);
        assert_eq!(query.filters.companion, Some(Companion::SuperSal));
        assert_eq!(query.filters.priority, Some(Priority::High));
    }
}
