//! Query-time retrieval of grounding chunks.

use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use super::embedding::Embedder;
use super::vector_store::KnowledgeStore;
use crate::error::{RetrievalError, ValidationError};
use crate::models::{RetrievalConfig, RetrievalQuery, RetrievalResult};

/// Embeds a query and returns the best matching stored chunks.
pub struct RetrievalService {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn KnowledgeStore>,
    default_top_k: usize,
    default_threshold: f32,
}

impl RetrievalService {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn KnowledgeStore>,
        config: &RetrievalConfig,
    ) -> Self {
        Self {
            embedder,
            store,
            default_top_k: config.top_k,
            default_threshold: config.threshold,
        }
    }

    /// Rank stored chunks against `query`.
    ///
    /// An empty result is not an error; callers fall back to an ungrounded
    /// answer when [`RetrievalResult::has_grounding`] is false.
    pub async fn retrieve(&self, query: &RetrievalQuery) -> Result<RetrievalResult, RetrievalError> {
        let text = query.text.trim();
        if text.is_empty() {
            return Err(ValidationError::EmptyQuery.into());
        }

        let top_k = query.top_k.unwrap_or(self.default_top_k);
        if top_k == 0 {
            return Err(ValidationError::InvalidTopK.into());
        }

        let threshold = query.threshold.unwrap_or(self.default_threshold);
        if !threshold.is_finite() {
            return Err(ValidationError::InvalidThreshold(threshold).into());
        }

        let started = Instant::now();
        let query_vector = self.embedder.embed_query(text).await?;
        let chunks = self
            .store
            .search(&query_vector, &query.filters, top_k, threshold)
            .await?;

        let result = RetrievalResult::new(
            query.text.clone(),
            chunks,
            started.elapsed().as_millis() as u64,
        );

        debug!(
            hits = result.len(),
            top_k,
            threshold,
            confidence = result.confidence,
            store = self.store.name(),
            "retrieved knowledge"
        );
        Ok(result)
    }
}
