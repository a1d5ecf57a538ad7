use anyhow::Result;

use super::{build_embedder, build_store};
use crate::cli::output::{StatusInfo, get_formatter};
use crate::models::{Config, OutputFormat, VectorDriver};

pub async fn handle_status(config: &Config, format: OutputFormat, _verbose: bool) -> Result<()> {
    let formatter = get_formatter(format);

    let embedder = build_embedder(config)?;
    let embedding_error = embedder.health_check().await.err().map(|e| e.to_string());
    let embedding_healthy = embedding_error.is_none();

    let (vector_store_connected, chunk_count) = match build_store(config).await {
        Ok(store) => {
            let connected = store.health_check().await.unwrap_or(false);
            let count = if connected {
                store.count().await.unwrap_or(0)
            } else {
                0
            };
            (connected, count)
        }
        Err(_) => (false, 0),
    };

    let status = StatusInfo {
        embedding_api: config.embedding.api.to_string(),
        embedding_url: config.embedding.url.clone(),
        embedding_model: config.embedding.model.clone(),
        embedding_healthy,
        embedding_error,
        vector_store_driver: config.vector_store.driver.to_string(),
        vector_store_url: config.vector_store.url.clone(),
        vector_store_connected,
        collection: config.vector_store.collection.clone(),
        chunk_count,
    };

    print!("{}", formatter.format_status(&status));

    if !embedding_healthy || !vector_store_connected {
        eprintln!();
        if !embedding_healthy {
            eprintln!(
                "Hint: embedding provider unreachable at {}. Set KPIPE_EMBEDDING_URL or edit the config.",
                config.embedding.url
            );
        }
        if !vector_store_connected {
            match config.vector_store.driver {
                VectorDriver::Qdrant => {
                    eprintln!(
                        "Warning: Qdrant not running. Start with: docker run -p 6334:6334 qdrant/qdrant"
                    );
                }
                VectorDriver::PostgreSQL => {
                    eprintln!("Warning: PostgreSQL not accessible. Check connection settings.");
                }
                VectorDriver::Memory => {
                    eprintln!("Warning: memory store snapshot could not be loaded.");
                }
            }
        }
    }

    Ok(())
}
