//! In-process knowledge store with an optional JSON snapshot file.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::debug;

use super::{KnowledgeStore, UpsertOutcome, check_dimension, cosine_similarity};
use crate::error::VectorStoreError;
use crate::models::{KnowledgeChunk, KnowledgeStats, ScoredChunk, SearchFilters};

#[derive(Debug, Clone, Default)]
struct Records {
    /// Insertion order; overwrites keep their original slot.
    chunks: Vec<KnowledgeChunk>,
    positions: HashMap<String, usize>,
}

impl Records {
    fn from_chunks(chunks: Vec<KnowledgeChunk>) -> Self {
        let mut records = Self::default();
        for chunk in chunks {
            records.put(chunk);
        }
        records
    }

    fn put(&mut self, chunk: KnowledgeChunk) {
        if let Some(pos) = self.positions.get(&chunk.id).copied() {
            self.chunks[pos] = chunk;
            return;
        }
        self.positions.insert(chunk.id.clone(), self.chunks.len());
        self.chunks.push(chunk);
    }
}

/// Brute-force cosine search over chunks held in memory.
#[derive(Debug)]
pub struct MemoryStore {
    records: RwLock<Records>,
    dimension: usize,
    snapshot_path: Option<PathBuf>,
}

impl MemoryStore {
    pub fn new(dimension: usize) -> Self {
        Self {
            records: RwLock::new(Records::default()),
            dimension,
            snapshot_path: None,
        }
    }

    /// Load chunks from `path` if it exists; every upsert rewrites it.
    pub async fn open(path: &Path, dimension: usize) -> Result<Self, VectorStoreError> {
        let chunks: Vec<KnowledgeChunk> = match tokio::fs::read(path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| VectorStoreError::SnapshotError(format!("{}: {}", path.display(), e)))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                return Err(VectorStoreError::SnapshotError(format!(
                    "{}: {}",
                    path.display(),
                    e
                )));
            }
        };

        for chunk in &chunks {
            check_dimension(chunk, dimension)?;
        }
        debug!(path = %path.display(), chunks = chunks.len(), "loaded snapshot");

        Ok(Self {
            records: RwLock::new(Records::from_chunks(chunks)),
            dimension,
            snapshot_path: Some(path.to_path_buf()),
        })
    }

    async fn persist(&self, records: &Records) -> Result<(), VectorStoreError> {
        let Some(ref path) = self.snapshot_path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| VectorStoreError::SnapshotError(e.to_string()))?;
        }
        let bytes = serde_json::to_vec(&records.chunks)
            .map_err(|e| VectorStoreError::SnapshotError(e.to_string()))?;
        tokio::fs::write(path, bytes)
            .await
            .map_err(|e| VectorStoreError::SnapshotError(format!("{}: {}", path.display(), e)))
    }
}

#[async_trait]
impl KnowledgeStore for MemoryStore {
    async fn health_check(&self) -> Result<bool, VectorStoreError> {
        Ok(true)
    }

    async fn ensure_collection(&self) -> Result<(), VectorStoreError> {
        Ok(())
    }

    async fn upsert(&self, chunks: Vec<KnowledgeChunk>) -> Result<UpsertOutcome, VectorStoreError> {
        let mut outcome = UpsertOutcome::default();
        if chunks.is_empty() {
            return Ok(outcome);
        }

        let mut records = self.records.write().await;
        // staged so a failed snapshot write leaves the store untouched
        let mut staged = records.clone();
        for chunk in chunks {
            if let Err(e) = check_dimension(&chunk, self.dimension) {
                outcome.fail(chunk.id, e.to_string());
                continue;
            }
            outcome.written.push(chunk.id.clone());
            staged.put(chunk);
        }

        if outcome.written.is_empty() {
            return Ok(outcome);
        }

        self.persist(&staged).await?;
        *records = staged;
        Ok(outcome)
    }

    async fn search(
        &self,
        query_vector: &[f32],
        filters: &SearchFilters,
        limit: usize,
        threshold: f32,
    ) -> Result<Vec<ScoredChunk>, VectorStoreError> {
        if query_vector.len() != self.dimension {
            return Err(VectorStoreError::DimensionMismatch {
                expected: self.dimension,
                actual: query_vector.len(),
            });
        }

        let records = self.records.read().await;
        let mut hits: Vec<ScoredChunk> = records
            .chunks
            .iter()
            .filter(|chunk| filters.matches(chunk))
            .filter_map(|chunk| {
                let similarity = cosine_similarity(query_vector, &chunk.vector)? as f32;
                (similarity >= threshold).then(|| ScoredChunk {
                    chunk: chunk.clone(),
                    similarity,
                })
            })
            .collect();

        // stable: equal scores keep insertion order
        hits.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn count(&self) -> Result<u64, VectorStoreError> {
        Ok(self.records.read().await.chunks.len() as u64)
    }

    async fn stats(&self) -> Result<KnowledgeStats, VectorStoreError> {
        let records = self.records.read().await;
        let mut stats = KnowledgeStats::default();
        for chunk in &records.chunks {
            stats.record(chunk.companion.as_str(), chunk.category.as_str());
        }
        Ok(stats)
    }

    fn name(&self) -> &str {
        "memory"
    }

    fn collection(&self) -> &str {
        "memory"
    }
}
