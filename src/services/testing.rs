//! Deterministic collaborators for pipeline tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::embedding::Embedder;
use super::vector_store::{KnowledgeStore, UpsertOutcome};
use crate::error::{EmbeddingError, VectorStoreError};
use crate::models::{KnowledgeChunk, KnowledgeStats, ScoredChunk, SearchFilters};

pub const TEST_DIMENSION: usize = 64;

/// Bag-of-words embedder: each lowercase token bumps one hashed slot.
///
/// Identical texts get identical vectors, and texts sharing no tokens are
/// orthogonal unless their tokens collide.
#[derive(Debug, Default)]
pub struct HashingEmbedder {
    calls: AtomicUsize,
    /// 1-based call number that times out
    fail_on_call: Option<usize>,
}

impl HashingEmbedder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on_call(call: usize) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_on_call: Some(call),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn vector_for(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; TEST_DIMENSION];
        for token in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let slot = token
                .bytes()
                .fold(2166136261u32, |h, b| (h ^ u32::from(b)).wrapping_mul(16777619));
            vector[slot as usize % TEST_DIMENSION] += 1.0;
        }
        vector
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on_call == Some(call) {
            return Err(EmbeddingError::Timeout);
        }
        if text.trim().is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }
        Ok(Self::vector_for(text))
    }

    fn dimension(&self) -> usize {
        TEST_DIMENSION
    }

    async fn health_check(&self) -> Result<(), EmbeddingError> {
        Ok(())
    }

    fn name(&self) -> &str {
        "hashing"
    }
}

/// A store whose backend is unreachable.
#[derive(Debug, Default)]
pub struct UnreachableStore;

#[async_trait]
impl KnowledgeStore for UnreachableStore {
    async fn health_check(&self) -> Result<bool, VectorStoreError> {
        Err(VectorStoreError::ConnectionError("connection refused".to_string()))
    }

    async fn ensure_collection(&self) -> Result<(), VectorStoreError> {
        Err(VectorStoreError::ConnectionError("connection refused".to_string()))
    }

    async fn upsert(&self, _chunks: Vec<KnowledgeChunk>) -> Result<UpsertOutcome, VectorStoreError> {
        Err(VectorStoreError::ConnectionError("connection refused".to_string()))
    }

    async fn search(
        &self,
        _query_vector: &[f32],
        _filters: &SearchFilters,
        _limit: usize,
        _threshold: f32,
    ) -> Result<Vec<ScoredChunk>, VectorStoreError> {
        Err(VectorStoreError::ConnectionError("connection refused".to_string()))
    }

    async fn count(&self) -> Result<u64, VectorStoreError> {
        Err(VectorStoreError::ConnectionError("connection refused".to_string()))
    }

    async fn stats(&self) -> Result<KnowledgeStats, VectorStoreError> {
        Err(VectorStoreError::ConnectionError("connection refused".to_string()))
    }

    fn name(&self) -> &str {
        "unreachable"
    }

    fn collection(&self) -> &str {
        "unreachable"
    }
}
