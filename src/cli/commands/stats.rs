use anyhow::{Context, Result};

use super::build_store;
use crate::cli::output::get_formatter;
use crate::models::{Config, OutputFormat};

pub async fn handle_stats(config: &Config, format: OutputFormat, verbose: bool) -> Result<()> {
    let formatter = get_formatter(format);
    let store = build_store(config).await?;

    if verbose {
        eprintln!("Store: {} ({})", store.name(), store.collection());
    }

    let stats = store.stats().await.context("failed to read knowledge stats")?;
    print!("{}", formatter.format_stats(&stats));

    Ok(())
}
