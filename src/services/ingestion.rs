//! Document ingestion: chunk, classify, embed and store.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::chunker::Chunker;
use super::classifier::Classifier;
use super::embedding::Embedder;
use super::vector_store::KnowledgeStore;
use crate::error::ValidationError;
use crate::models::{
    BatchIngestionReport, ChunkFailure, ChunkMetadata, ChunkingConfig, FailureReason,
    IngestionConfig, IngestionReport, KnowledgeChunk, RejectedDocument, SourceDocument, TextChunk,
    file_type_of,
};
use crate::utils::{calculate_confidence, extract_keywords};

/// A chunk waiting for the store, with its 1-based document position.
struct Pending {
    position: usize,
    chunk: KnowledgeChunk,
}

/// Turns raw documents into stored, vectorized knowledge chunks.
///
/// Failures are isolated per chunk: a chunk the provider or the store
/// rejects is reported and the remaining chunks are still written.
pub struct IngestionPipeline {
    chunker: Chunker,
    classifier: Classifier,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn KnowledgeStore>,
    batch_size: usize,
}

impl IngestionPipeline {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn KnowledgeStore>,
        chunking: &ChunkingConfig,
        ingestion: &IngestionConfig,
    ) -> Self {
        Self {
            chunker: Chunker::new(chunking),
            classifier: Classifier::default(),
            embedder,
            store,
            batch_size: ingestion.batch_size.max(1),
        }
    }

    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Chunks `document` would produce, without embedding or storing them.
    pub fn preview(&self, document: &SourceDocument) -> Result<Vec<TextChunk>, ValidationError> {
        validate(document)?;
        Ok(self.chunker.chunk(&document.content, &document.source))
    }

    /// Ingest one document.
    ///
    /// Only invalid input is an error; provider and store failures are
    /// recorded in the report.
    pub async fn ingest(&self, document: &SourceDocument) -> Result<IngestionReport, ValidationError> {
        validate(document)?;

        let started = Instant::now();
        let uploaded_at = Utc::now();
        let mut report = IngestionReport::new(document.source.clone());

        let text_chunks = self.chunker.chunk(&document.content, &document.source);
        report.total_chunks = text_chunks.len();
        debug!(source = %document.source, chunks = text_chunks.len(), "chunked document");

        let mut pending: Vec<Pending> = Vec::with_capacity(self.batch_size);

        for text_chunk in text_chunks {
            let position = text_chunk.index + 1;
            let mut chunk = self.build_chunk(document, text_chunk, uploaded_at);

            match self.embedder.embed(&chunk.content).await {
                Ok(vector) => chunk.vector = vector,
                Err(e) => {
                    warn!(
                        source = %document.source,
                        chunk = position,
                        total = report.total_chunks,
                        provider = self.embedder.name(),
                        error = %e,
                        "failed to embed chunk"
                    );
                    report.failures.push(ChunkFailure {
                        index: position,
                        chunk_id: chunk.id,
                        title: chunk.title,
                        reason: FailureReason::ProviderError,
                        message: e.to_string(),
                    });
                    continue;
                }
            }

            pending.push(Pending { position, chunk });
            if pending.len() >= self.batch_size {
                self.flush(&mut pending, &mut report).await;
            }
        }

        if !pending.is_empty() {
            self.flush(&mut pending, &mut report).await;
        }

        report.failures.sort_by_key(|f| f.index);
        report.duration_ms = started.elapsed().as_millis() as u64;

        info!(
            source = %document.source,
            written = report.chunks_written,
            total = report.total_chunks,
            failed = report.failures.len(),
            "ingested document"
        );
        Ok(report)
    }

    /// Ingest documents one after another.
    ///
    /// Documents failing validation are listed as rejected and do not stop
    /// the batch.
    pub async fn ingest_batch(&self, documents: &[SourceDocument]) -> BatchIngestionReport {
        let started = Instant::now();
        let mut batch = BatchIngestionReport::default();

        for document in documents {
            match self.ingest(document).await {
                Ok(report) => batch.reports.push(report),
                Err(e) => {
                    warn!(source = %document.source, error = %e, "rejected document");
                    batch.rejected.push(RejectedDocument {
                        source: document.source.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        batch.duration_ms = started.elapsed().as_millis() as u64;
        batch
    }

    fn build_chunk(
        &self,
        document: &SourceDocument,
        text_chunk: TextChunk,
        uploaded_at: DateTime<Utc>,
    ) -> KnowledgeChunk {
        let classification = self.classifier.classify(&text_chunk.content);
        let chunk_index = text_chunk.index as u32;

        KnowledgeChunk {
            id: KnowledgeChunk::generate_id(&document.source, chunk_index, uploaded_at),
            keywords: extract_keywords(&text_chunk.content),
            title: text_chunk.title,
            source: document.source.clone(),
            chunk_index,
            companion: document.companion.unwrap_or(classification.companion),
            category: document.category.unwrap_or(classification.category),
            tags: document.tags.clone(),
            metadata: ChunkMetadata {
                file_type: file_type_of(&document.source),
                uploaded_at,
                last_updated: uploaded_at,
                confidence: calculate_confidence(&text_chunk.content),
                priority: document.priority.unwrap_or(classification.priority),
            },
            content: text_chunk.content,
            vector: Vec::new(),
        }
    }

    async fn flush(&self, pending: &mut Vec<Pending>, report: &mut IngestionReport) {
        let batch: Vec<Pending> = std::mem::take(pending);
        let chunks: Vec<KnowledgeChunk> = batch.iter().map(|p| p.chunk.clone()).collect();

        match self.store.upsert(chunks).await {
            Ok(outcome) => {
                for id in outcome.written {
                    if let Some(p) = batch.iter().find(|p| p.chunk.id == id) {
                        *report
                            .companions
                            .entry(p.chunk.companion.to_string())
                            .or_insert(0) += 1;
                    }
                    report.chunk_ids.push(id);
                    report.chunks_written += 1;
                }
                for failed in outcome.failed {
                    warn!(chunk_id = %failed.id, reason = %failed.reason, "store rejected chunk");
                    if let Some(p) = batch.iter().find(|p| p.chunk.id == failed.id) {
                        report.failures.push(store_failure(p, failed.reason));
                    }
                }
            }
            Err(e) => {
                warn!(
                    store = self.store.name(),
                    chunks = batch.len(),
                    error = %e,
                    "failed to store batch"
                );
                let message = e.to_string();
                for p in &batch {
                    report.failures.push(store_failure(p, message.clone()));
                }
            }
        }
    }
}

fn store_failure(pending: &Pending, message: String) -> ChunkFailure {
    ChunkFailure {
        index: pending.position,
        chunk_id: pending.chunk.id.clone(),
        title: pending.chunk.title.clone(),
        reason: FailureReason::StoreError,
        message,
    }
}

fn validate(document: &SourceDocument) -> Result<(), ValidationError> {
    if document.content.trim().is_empty() {
        return Err(ValidationError::EmptyContent);
    }
    if document.source.trim().is_empty() {
        return Err(ValidationError::EmptySource);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, Companion, Priority, SearchFilters};
    use crate::services::classifier::{KeywordRule, RuleTable};
    use crate::services::testing::{HashingEmbedder, TEST_DIMENSION, UnreachableStore};
    use crate::services::vector_store::MemoryStore;

    const REFUNDS: &str = "Refunds are issued within thirty days when the customer provides a receipt.";
    const SHIPPING: &str = "Shipping labels are printed every morning before the courier pickup window.";
    const WARRANTY: &str = "Warranty claims need the serial number and a photo of the damaged unit.";

    fn three_section_doc() -> SourceDocument {
        SourceDocument::new(
            format!("# Refunds\n{REFUNDS}\n# Shipping\n{SHIPPING}\n# Warranty\n{WARRANTY}"),
            "support/policies.md",
        )
    }

    fn pipeline(embedder: Arc<dyn Embedder>, store: Arc<dyn KnowledgeStore>) -> IngestionPipeline {
        IngestionPipeline::new(
            embedder,
            store,
            &ChunkingConfig::default(),
            &IngestionConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_empty_content_rejected() {
        let store = Arc::new(MemoryStore::new(TEST_DIMENSION));
        let pipeline = pipeline(Arc::new(HashingEmbedder::new()), store);

        let result = pipeline.ingest(&SourceDocument::new("  \n ", "a.md")).await;
        assert_eq!(result.unwrap_err(), ValidationError::EmptyContent);

        let result = pipeline.ingest(&SourceDocument::new("body", " ")).await;
        assert_eq!(result.unwrap_err(), ValidationError::EmptySource);
    }

    #[tokio::test]
    async fn test_short_document_writes_nothing() {
        let embedder = Arc::new(HashingEmbedder::new());
        let store = Arc::new(MemoryStore::new(TEST_DIMENSION));
        let pipeline = pipeline(embedder.clone(), store.clone());

        let report = pipeline
            .ingest(&SourceDocument::new("Too short to index.", "short.txt"))
            .await
            .unwrap();

        assert_eq!(report.total_chunks, 0);
        assert_eq!(report.chunks_written, 0);
        assert!(!report.success());
        assert_eq!(embedder.calls(), 0);
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_ingest_stores_every_chunk() {
        let store = Arc::new(MemoryStore::new(TEST_DIMENSION));
        let pipeline = pipeline(Arc::new(HashingEmbedder::new()), store.clone());

        let report = pipeline.ingest(&three_section_doc()).await.unwrap();

        assert_eq!(report.total_chunks, 3);
        assert_eq!(report.chunks_written, 3);
        assert_eq!(report.chunk_ids.len(), 3);
        assert!(report.failures.is_empty());
        assert_eq!(report.summary(), "3 of 3 chunks stored");
        assert_eq!(store.count().await.unwrap(), 3);
        assert!(report.chunk_ids[0].starts_with("kn_policiesmd_"));
        assert!(report.chunk_ids[2].contains("_2_"));
    }

    #[tokio::test]
    async fn test_hacp_document_classified_critical() {
        let store = Arc::new(MemoryStore::new(TEST_DIMENSION));
        let pipeline = pipeline(Arc::new(HashingEmbedder::new()), store.clone());
        let content = "The HACP patent describes how requests are routed between assistants.";

        let report = pipeline
            .ingest(&SourceDocument::new(content, "hacp.txt"))
            .await
            .unwrap();
        assert_eq!(report.chunks_written, 1);

        let hits = store
            .search(
                &HashingEmbedder::vector_for(content),
                &SearchFilters::default(),
                1,
                0.0,
            )
            .await
            .unwrap();
        let chunk = &hits[0].chunk;
        assert_eq!(chunk.category, Category::Hacp);
        assert_eq!(chunk.metadata.priority, Priority::Critical);
        assert_eq!(chunk.metadata.file_type, "txt");
        assert!(chunk.keywords.contains(&"hacp".to_string()));
    }

    #[tokio::test]
    async fn test_hacp_overview_scenario() {
        let store = Arc::new(MemoryStore::new(TEST_DIMENSION));
        let pipeline = pipeline(Arc::new(HashingEmbedder::new()), store.clone());
        let document = SourceDocument::new(
            "HACP patent overview. It covers Human-AI Connection Protocol.",
            "hacp.txt",
        );

        let report = pipeline.ingest(&document).await.unwrap();
        assert_eq!(report.total_chunks, 1);
        assert_eq!(report.chunks_written, 1);
        assert!(report.failures.is_empty());

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.total_chunks, 1);
        assert_eq!(stats.by_category.get("hacp"), Some(&1));
        assert_eq!(stats.by_companion.get("universal"), Some(&1));

        let hits = store
            .search(
                &HashingEmbedder::vector_for(&document.content),
                &SearchFilters::default(),
                1,
                0.0,
            )
            .await
            .unwrap();
        assert_eq!(hits[0].chunk.metadata.priority, Priority::Critical);
    }

    #[tokio::test]
    async fn test_custom_classifier_routes_chunks() {
        let store = Arc::new(MemoryStore::new(TEST_DIMENSION));
        let classifier = Classifier::new(
            RuleTable::new(
                vec![KeywordRule::new(&["radiology"], Companion::Athena)],
                Companion::PartnerTech,
            ),
            RuleTable::new(
                vec![KeywordRule::new(&["imaging"], Category::Technical)],
                Category::Marketing,
            ),
            RuleTable::new(vec![], Priority::Medium),
        );
        let pipeline =
            pipeline(Arc::new(HashingEmbedder::new()), store.clone()).with_classifier(classifier);

        pipeline
            .ingest(&SourceDocument::new(
                "Radiology imaging requests are scheduled through the central desk each morning.",
                "radiology.md",
            ))
            .await
            .unwrap();
        pipeline
            .ingest(&SourceDocument::new(
                "Quarterly newsletter drafts are reviewed by the communications team on Fridays.",
                "newsletter.md",
            ))
            .await
            .unwrap();

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.by_companion.get("athena"), Some(&1));
        assert_eq!(stats.by_companion.get("partnertech"), Some(&1));
        assert_eq!(stats.by_category.get("technical"), Some(&1));
        assert_eq!(stats.by_category.get("marketing"), Some(&1));
    }

    #[tokio::test]
    async fn test_pinned_values_override_classifier() {
        let store = Arc::new(MemoryStore::new(TEST_DIMENSION));
        let pipeline = pipeline(Arc::new(HashingEmbedder::new()), store.clone());
        let document = SourceDocument::new(
            "Medical intake procedure for new patients arriving at the front desk.",
            "intake.md",
        )
        .with_companion(Companion::SuperSal)
        .with_category(Category::Training)
        .with_priority(Priority::High)
        .with_tags(vec!["clinic".to_string()]);

        let report = pipeline.ingest(&document).await.unwrap();
        assert_eq!(report.companions.get("supersal"), Some(&1));

        let stats = store.stats().await.unwrap();
        assert_eq!(stats.by_companion.get("supersal"), Some(&1));
        assert_eq!(stats.by_category.get("training"), Some(&1));

        let hits = store
            .search(
                &HashingEmbedder::vector_for(&document.content),
                &SearchFilters::default(),
                1,
                0.0,
            )
            .await
            .unwrap();
        assert_eq!(hits[0].chunk.metadata.priority, Priority::High);
        assert_eq!(hits[0].chunk.tags, vec!["clinic"]);
    }

    #[tokio::test]
    async fn test_provider_outage_isolated_to_one_chunk() {
        let store = Arc::new(MemoryStore::new(TEST_DIMENSION));
        let pipeline = pipeline(Arc::new(HashingEmbedder::failing_on_call(2)), store.clone());

        let report = pipeline.ingest(&three_section_doc()).await.unwrap();

        assert_eq!(report.total_chunks, 3);
        assert_eq!(report.chunks_written, 2);
        assert!(report.is_partial());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].index, 2);
        assert_eq!(report.failures[0].reason, FailureReason::ProviderError);
        assert_eq!(report.failures[0].title, "Shipping");

        for content in [REFUNDS, WARRANTY] {
            let hits = store
                .search(
                    &HashingEmbedder::vector_for(content),
                    &SearchFilters::default(),
                    1,
                    0.5,
                )
                .await
                .unwrap();
            assert!(hits[0].chunk.content.contains(content));
        }
    }

    #[tokio::test]
    async fn test_store_outage_fails_every_chunk_of_batch() {
        let pipeline = pipeline(Arc::new(HashingEmbedder::new()), Arc::new(UnreachableStore));

        let report = pipeline.ingest(&three_section_doc()).await.unwrap();

        assert_eq!(report.chunks_written, 0);
        assert_eq!(report.failures.len(), 3);
        assert!(report.failures.iter().all(|f| f.reason == FailureReason::StoreError));
        let positions: Vec<_> = report.failures.iter().map(|f| f.index).collect();
        assert_eq!(positions, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_failed_snapshot_write_reports_nothing_stored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        let store = Arc::new(MemoryStore::open(&path, TEST_DIMENSION).await.unwrap());
        std::fs::create_dir(&path).unwrap();
        let pipeline = pipeline(Arc::new(HashingEmbedder::new()), store.clone());

        let report = pipeline.ingest(&three_section_doc()).await.unwrap();

        assert_eq!(report.chunks_written, 0);
        assert_eq!(report.failures.len(), 3);
        assert!(report.failures.iter().all(|f| f.reason == FailureReason::StoreError));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_small_batches_write_everything() {
        let store = Arc::new(MemoryStore::new(TEST_DIMENSION));
        let pipeline = IngestionPipeline::new(
            Arc::new(HashingEmbedder::new()),
            store.clone(),
            &ChunkingConfig::default(),
            &IngestionConfig {
                batch_size: 2,
                ..Default::default()
            },
        );

        let report = pipeline.ingest(&three_section_doc()).await.unwrap();
        assert_eq!(report.chunks_written, 3);
        assert_eq!(store.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_store_rejection_recorded_per_chunk() {
        // store expects a different dimension, so every record is refused
        let store = Arc::new(MemoryStore::new(TEST_DIMENSION + 1));
        let pipeline = pipeline(Arc::new(HashingEmbedder::new()), store);

        let report = pipeline.ingest(&three_section_doc()).await.unwrap();
        assert_eq!(report.chunks_written, 0);
        assert_eq!(report.failures.len(), 3);
        assert!(report.failures[0].message.contains("dimension mismatch"));
    }

    #[tokio::test]
    async fn test_ingest_batch_aggregates() {
        let store = Arc::new(MemoryStore::new(TEST_DIMENSION));
        let pipeline = pipeline(Arc::new(HashingEmbedder::new()), store);

        let documents = vec![
            three_section_doc(),
            SourceDocument::new("", "empty.md"),
            SourceDocument::new(
                "Lending desk checklist for reviewing small business loan applications.",
                "lending.md",
            ),
        ];
        let batch = pipeline.ingest_batch(&documents).await;

        assert_eq!(batch.documents_total(), 3);
        assert_eq!(batch.documents_succeeded(), 2);
        assert_eq!(batch.rejected.len(), 1);
        assert_eq!(batch.rejected[0].source, "empty.md");
        assert_eq!(batch.chunks_written(), 4);
        assert_eq!(batch.companion_distribution().get("ebytech"), Some(&1));
    }

    #[test]
    fn test_preview_does_not_need_collaborators() {
        let pipeline = pipeline(
            Arc::new(HashingEmbedder::new()),
            Arc::new(UnreachableStore),
        );
        let chunks = pipeline.preview(&three_section_doc()).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[1].title, "Shipping");
    }
}
