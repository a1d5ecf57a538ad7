mod config;
mod ingest;
mod search;
mod stats;
mod status;

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::models::Config;
use crate::services::{Embedder, HttpEmbedder, KnowledgeStore, create_store};

pub use config::ConfigCommand;
pub use ingest::IngestArgs;
pub use search::SearchArgs;

pub use config::handle_config;
pub use ingest::handle_ingest;
pub use search::handle_search;
pub use stats::handle_stats;
pub use status::handle_status;

fn build_embedder(config: &Config) -> Result<Arc<dyn Embedder>> {
    let embedder =
        HttpEmbedder::new(&config.embedding).context("failed to create embedding client")?;
    Ok(Arc::new(embedder))
}

async fn build_store(config: &Config) -> Result<Arc<dyn KnowledgeStore>> {
    let store = create_store(&config.vector_store, config.embedding.dimension as usize)
        .await
        .with_context(|| format!("failed to open {} store", config.vector_store.driver))?;
    Ok(Arc::from(store))
}
