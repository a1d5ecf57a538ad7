//! Ingestion outcome reporting.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Which collaborator rejected a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureReason {
    /// The embedding provider failed or timed out.
    ProviderError,
    /// The knowledge store failed to write the record.
    StoreError,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::ProviderError => write!(f, "ProviderError"),
            FailureReason::StoreError => write!(f, "StoreError"),
        }
    }
}

/// A chunk that could not be stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkFailure {
    /// 1-based position of the chunk within its document.
    pub index: usize,
    pub chunk_id: String,
    pub title: String,
    pub reason: FailureReason,
    pub message: String,
}

/// Result of ingesting one document.
///
/// Ingestion is best effort and isolated per chunk, so a report can carry
/// written chunk ids and failures at the same time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestionReport {
    pub source: String,
    pub total_chunks: usize,
    pub chunks_written: usize,
    pub chunk_ids: Vec<String>,
    pub failures: Vec<ChunkFailure>,
    /// Written chunk counts keyed by companion.
    #[serde(default)]
    pub companions: BTreeMap<String, usize>,
    pub duration_ms: u64,
}

impl IngestionReport {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Default::default()
        }
    }

    /// True when at least one chunk was written.
    pub fn success(&self) -> bool {
        self.chunks_written > 0
    }

    /// Some chunks were written and some failed.
    pub fn is_partial(&self) -> bool {
        self.chunks_written > 0 && !self.failures.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} of {} chunks stored",
            self.chunks_written, self.total_chunks
        )
    }
}

/// A document rejected before chunking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectedDocument {
    pub source: String,
    pub reason: String,
}

/// Aggregate over many documents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchIngestionReport {
    pub reports: Vec<IngestionReport>,
    pub rejected: Vec<RejectedDocument>,
    pub duration_ms: u64,
}

impl BatchIngestionReport {
    pub fn documents_total(&self) -> usize {
        self.reports.len() + self.rejected.len()
    }

    pub fn documents_succeeded(&self) -> usize {
        self.reports.iter().filter(|r| r.success()).count()
    }

    pub fn chunks_total(&self) -> usize {
        self.reports.iter().map(|r| r.total_chunks).sum()
    }

    pub fn chunks_written(&self) -> usize {
        self.reports.iter().map(|r| r.chunks_written).sum()
    }

    pub fn chunk_failures(&self) -> usize {
        self.reports.iter().map(|r| r.failures.len()).sum()
    }

    /// Written chunk counts per companion across all documents.
    pub fn companion_distribution(&self) -> BTreeMap<String, usize> {
        let mut distribution = BTreeMap::new();
        for report in &self.reports {
            for (companion, count) in &report.companions {
                *distribution.entry(companion.clone()).or_insert(0) += count;
            }
        }
        distribution
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(index: usize) -> ChunkFailure {
        ChunkFailure {
            index,
            chunk_id: format!("kn_{index}"),
            title: "t".to_string(),
            reason: FailureReason::ProviderError,
            message: "timeout".to_string(),
        }
    }

    #[test]
    fn test_report_success_and_partial() {
        let mut report = IngestionReport::new("a.md");
        report.total_chunks = 3;
        assert!(!report.success());

        report.chunks_written = 2;
        report.failures.push(failure(2));
        assert!(report.success());
        assert!(report.is_partial());
        assert_eq!(report.summary(), "2 of 3 chunks stored");
    }

    #[test]
    fn test_batch_aggregates() {
        let mut a = IngestionReport::new("a.md");
        a.total_chunks = 2;
        a.chunks_written = 2;
        a.companions.insert("athena".to_string(), 2);

        let mut b = IngestionReport::new("b.md");
        b.total_chunks = 1;
        b.failures.push(failure(1));

        let batch = BatchIngestionReport {
            reports: vec![a, b],
            rejected: vec![RejectedDocument {
                source: "c.md".to_string(),
                reason: "document content cannot be empty".to_string(),
            }],
            duration_ms: 5,
        };

        assert_eq!(batch.documents_total(), 3);
        assert_eq!(batch.documents_succeeded(), 1);
        assert_eq!(batch.chunks_total(), 3);
        assert_eq!(batch.chunks_written(), 2);
        assert_eq!(batch.chunk_failures(), 1);
        assert_eq!(batch.companion_distribution()["athena"], 2);
    }

    #[test]
    fn test_failure_reason_display() {
        assert_eq!(FailureReason::ProviderError.to_string(), "ProviderError");
        assert_eq!(FailureReason::StoreError.to_string(), "StoreError");
    }
}
