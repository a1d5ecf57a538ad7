//! Knowledge store abstraction layer.
//!
//! Backends (in-process memory, Qdrant, PostgreSQL/pgvector) sit behind the
//! [`KnowledgeStore`] trait and are selected from configuration.

mod memory;
mod pgvector;
mod qdrant;

pub use memory::MemoryStore;
pub use pgvector::PgVectorStore;
pub use qdrant::QdrantStore;

use async_trait::async_trait;
use std::cmp::Ordering;

use crate::error::VectorStoreError;
use crate::models::{KnowledgeChunk, KnowledgeStats, ScoredChunk, SearchFilters, VectorDriver, VectorStoreConfig};

/// A record the store refused while the rest of the call went through.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedRecord {
    pub id: String,
    pub reason: String,
}

/// Per-record result of an upsert call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpsertOutcome {
    pub written: Vec<String>,
    pub failed: Vec<FailedRecord>,
}

impl UpsertOutcome {
    pub fn fail(&mut self, id: impl Into<String>, reason: impl Into<String>) {
        self.failed.push(FailedRecord {
            id: id.into(),
            reason: reason.into(),
        });
    }
}

/// Persistent, vector-indexed chunk storage with filtered similarity search.
///
/// No guarantee spans more than one record: a failed upsert may leave earlier
/// records of the same call written.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    async fn health_check(&self) -> Result<bool, VectorStoreError>;

    /// Create the collection/table and its indexes if missing.
    async fn ensure_collection(&self) -> Result<(), VectorStoreError>;

    /// Insert or overwrite chunks by id.
    ///
    /// `Err` means nothing from the call was written (e.g. the store is
    /// unreachable); records rejected individually are listed in the outcome.
    async fn upsert(&self, chunks: Vec<KnowledgeChunk>) -> Result<UpsertOutcome, VectorStoreError>;

    /// Chunks with cosine similarity `>= threshold`, best first, at most `limit`.
    ///
    /// Equal scores are ordered by ingestion time, earlier first. The memory
    /// and Postgres backends apply this before truncating to `limit`. Qdrant
    /// truncates on its side first, so on a tie at the cutoff Qdrant decides
    /// which of the tied chunks are returned.
    async fn search(
        &self,
        query_vector: &[f32],
        filters: &SearchFilters,
        limit: usize,
        threshold: f32,
    ) -> Result<Vec<ScoredChunk>, VectorStoreError>;

    async fn count(&self) -> Result<u64, VectorStoreError>;

    /// Chunk totals per companion and per category.
    async fn stats(&self) -> Result<KnowledgeStats, VectorStoreError>;

    /// Backend name for logging
    fn name(&self) -> &str;

    fn collection(&self) -> &str;
}

/// Create a knowledge store backend based on configuration.
pub async fn create_store(
    config: &VectorStoreConfig,
    embedding_dim: usize,
) -> Result<Box<dyn KnowledgeStore>, VectorStoreError> {
    match config.driver {
        VectorDriver::Memory => {
            let store = match config.snapshot_path {
                Some(ref path) => MemoryStore::open(path, embedding_dim).await?,
                None => MemoryStore::new(embedding_dim),
            };
            Ok(Box::new(store))
        }
        VectorDriver::Qdrant => {
            let store = QdrantStore::new(config, embedding_dim)?;
            Ok(Box::new(store))
        }
        VectorDriver::PostgreSQL => {
            let store = PgVectorStore::new(config, embedding_dim).await?;
            Ok(Box::new(store))
        }
    }
}

/// Cosine similarity of two vectors, accumulated in `f64`.
///
/// `None` when lengths differ, either vector is empty, or a norm is zero.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let x64 = f64::from(x);
        let y64 = f64::from(y);
        dot += x64 * y64;
        norm_a += x64 * x64;
        norm_b += y64 * y64;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom <= f64::EPSILON {
        return None;
    }
    Some(dot / denom)
}

/// Score descending, then earlier upload, then lower chunk index.
pub(crate) fn rank_order(a: &ScoredChunk, b: &ScoredChunk) -> Ordering {
    b.similarity
        .partial_cmp(&a.similarity)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.chunk.metadata.uploaded_at.cmp(&b.chunk.metadata.uploaded_at))
        .then_with(|| a.chunk.chunk_index.cmp(&b.chunk.chunk_index))
}

fn check_dimension(chunk: &KnowledgeChunk, expected: usize) -> Result<(), VectorStoreError> {
    if chunk.vector.len() != expected {
        return Err(VectorStoreError::DimensionMismatch {
            expected,
            actual: chunk.vector.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity() {
        let a = [1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &a).unwrap() - 1.0).abs() < 1e-9);
        assert!(cosine_similarity(&a, &[0.0, 1.0, 0.0]).unwrap().abs() < 1e-9);
        assert!((cosine_similarity(&a, &[-2.0, 0.0, 0.0]).unwrap() + 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_cosine_similarity_degenerate() {
        assert!(cosine_similarity(&[1.0, 0.0], &[1.0]).is_none());
        assert!(cosine_similarity(&[], &[]).is_none());
        assert!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]).is_none());
    }

    #[test]
    fn test_upsert_outcome_fail() {
        let mut outcome = UpsertOutcome::default();
        outcome.fail("kn_1", "dimension mismatch");
        assert_eq!(outcome.failed[0].id, "kn_1");
        assert!(outcome.written.is_empty());
    }

    #[tokio::test]
    async fn test_create_memory_store() {
        let config = VectorStoreConfig {
            driver: VectorDriver::Memory,
            ..Default::default()
        };
        let store = create_store(&config, 8).await.unwrap();
        assert_eq!(store.name(), "memory");
        assert_eq!(store.count().await.unwrap(), 0);
    }
}
