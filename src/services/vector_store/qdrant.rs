//! Qdrant knowledge store backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use qdrant_client::Qdrant;
use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{
    Condition, CountPointsBuilder, CreateCollectionBuilder, CreateFieldIndexCollectionBuilder,
    Distance, FieldType, Filter, PayloadIncludeSelector, PointStruct, ScrollPointsBuilder,
    SearchPointsBuilder, UpsertPointsBuilder, Value, VectorParamsBuilder,
};
use std::collections::HashMap;
use tracing::{debug, warn};

use super::{KnowledgeStore, UpsertOutcome, check_dimension, rank_order};
use crate::error::VectorStoreError;
use crate::models::{
    ChunkMetadata, Companion, KnowledgeChunk, KnowledgeStats, ScoredChunk, SearchFilters,
    VectorStoreConfig,
};
use crate::utils::Retryable;

type Payload = HashMap<String, Value>;

/// Fields indexed for filtered search.
const KEYWORD_FIELDS: [&str; 3] = ["companion", "category", "priority"];

/// Qdrant backend; points are keyed by a UUIDv5 of the chunk id.
pub struct QdrantStore {
    client: Qdrant,
    collection: String,
    embedding_dim: usize,
}

impl QdrantStore {
    pub fn new(config: &VectorStoreConfig, embedding_dim: usize) -> Result<Self, VectorStoreError> {
        let mut builder = Qdrant::from_url(&config.url);

        if let Some(ref api_key) = config.api_key {
            builder = builder.api_key(api_key.clone());
        }

        let client = builder
            .build()
            .map_err(|e| VectorStoreError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            collection: config.collection.clone(),
            embedding_dim,
        })
    }

    fn build_search_filter(filters: &SearchFilters) -> Option<Filter> {
        let mut must_conditions: Vec<Condition> = Vec::new();

        if let Some(companion) = filters.companion {
            let eligible = Filter::should([
                Condition::matches("companion", companion.to_string()),
                Condition::matches("companion", Companion::Universal.to_string()),
            ]);
            must_conditions.push(eligible.into());
        }
        if let Some(category) = filters.category {
            must_conditions.push(Condition::matches("category", category.to_string()));
        }
        if let Some(priority) = filters.priority {
            must_conditions.push(Condition::matches("priority", priority.to_string()));
        }

        if must_conditions.is_empty() {
            None
        } else {
            Some(Filter::must(must_conditions))
        }
    }

    fn to_point(chunk: KnowledgeChunk) -> PointStruct {
        let point_id = KnowledgeChunk::point_uuid(&chunk.id);
        let metadata = chunk.metadata;

        let mut payload: Payload = HashMap::new();
        payload.insert("chunk_id".to_string(), chunk.id.into());
        payload.insert("content".to_string(), chunk.content.into());
        payload.insert("title".to_string(), chunk.title.into());
        payload.insert("source".to_string(), chunk.source.into());
        payload.insert("chunk_index".to_string(), i64::from(chunk.chunk_index).into());
        payload.insert("companion".to_string(), chunk.companion.to_string().into());
        payload.insert("category".to_string(), chunk.category.to_string().into());
        payload.insert("keywords".to_string(), string_list(chunk.keywords).into());
        payload.insert("tags".to_string(), string_list(chunk.tags).into());
        payload.insert("file_type".to_string(), metadata.file_type.into());
        payload.insert("uploaded_at".to_string(), metadata.uploaded_at.to_rfc3339().into());
        payload.insert("last_updated".to_string(), metadata.last_updated.to_rfc3339().into());
        payload.insert("confidence".to_string(), f64::from(metadata.confidence).into());
        payload.insert("priority".to_string(), metadata.priority.to_string().into());

        PointStruct::new(point_id, chunk.vector, payload)
    }

    fn from_payload(payload: &Payload) -> KnowledgeChunk {
        let now = Utc::now();

        KnowledgeChunk {
            id: payload_str(payload, "chunk_id").unwrap_or_default().to_string(),
            content: payload_str(payload, "content").unwrap_or_default().to_string(),
            title: payload_str(payload, "title").unwrap_or_default().to_string(),
            source: payload_str(payload, "source").unwrap_or_default().to_string(),
            chunk_index: payload_int(payload, "chunk_index").map_or(0, |n| n as u32),
            companion: parse_or_default(payload, "companion"),
            category: parse_or_default(payload, "category"),
            keywords: payload_list(payload, "keywords"),
            tags: payload_list(payload, "tags"),
            metadata: ChunkMetadata {
                file_type: payload_str(payload, "file_type").unwrap_or("unknown").to_string(),
                uploaded_at: payload_time(payload, "uploaded_at").unwrap_or(now),
                last_updated: payload_time(payload, "last_updated").unwrap_or(now),
                confidence: payload_f64(payload, "confidence").map_or(0.0, |c| c as f32),
                priority: parse_or_default(payload, "priority"),
            },
            vector: Vec::new(),
        }
    }

    async fn upsert_batch(&self, points: Vec<PointStruct>) -> Result<(), VectorStoreError> {
        self.client
            .upsert_points(UpsertPointsBuilder::new(&self.collection, points).wait(true))
            .await
            .map(|_| ())
            .map_err(|e| VectorStoreError::UpsertError(e.to_string()))
    }
}

fn string_list(values: Vec<String>) -> Vec<Value> {
    values.into_iter().map(Value::from).collect()
}

fn payload_str<'a>(payload: &'a Payload, key: &str) -> Option<&'a str> {
    match payload.get(key)?.kind {
        Some(Kind::StringValue(ref s)) => Some(s.as_str()),
        _ => None,
    }
}

fn payload_int(payload: &Payload, key: &str) -> Option<i64> {
    match payload.get(key)?.kind {
        Some(Kind::IntegerValue(n)) => Some(n),
        _ => None,
    }
}

fn payload_f64(payload: &Payload, key: &str) -> Option<f64> {
    match payload.get(key)?.kind {
        Some(Kind::DoubleValue(n)) => Some(n),
        Some(Kind::IntegerValue(n)) => Some(n as f64),
        _ => None,
    }
}

fn payload_list(payload: &Payload, key: &str) -> Vec<String> {
    match payload.get(key).and_then(|v| v.kind.as_ref()) {
        Some(Kind::ListValue(list)) => list
            .values
            .iter()
            .filter_map(|v| match v.kind {
                Some(Kind::StringValue(ref s)) => Some(s.clone()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn payload_time(payload: &Payload, key: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(payload_str(payload, key)?)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

fn parse_or_default<T: std::str::FromStr + Default>(payload: &Payload, key: &str) -> T {
    payload_str(payload, key)
        .and_then(|s| s.parse().ok())
        .unwrap_or_default()
}

#[async_trait]
impl KnowledgeStore for QdrantStore {
    async fn health_check(&self) -> Result<bool, VectorStoreError> {
        self.client
            .health_check()
            .await
            .map(|_| true)
            .map_err(|e| VectorStoreError::ConnectionError(e.to_string()))
    }

    async fn ensure_collection(&self) -> Result<(), VectorStoreError> {
        let exists = self
            .client
            .collection_exists(&self.collection)
            .await
            .map_err(|e| VectorStoreError::CollectionError(e.to_string()))?;
        if exists {
            return Ok(());
        }

        let create_collection = CreateCollectionBuilder::new(&self.collection).vectors_config(
            VectorParamsBuilder::new(self.embedding_dim as u64, Distance::Cosine),
        );
        self.client
            .create_collection(create_collection)
            .await
            .map_err(|e| VectorStoreError::CollectionError(e.to_string()))?;

        for field in KEYWORD_FIELDS {
            self.client
                .create_field_index(CreateFieldIndexCollectionBuilder::new(
                    &self.collection,
                    field,
                    FieldType::Keyword,
                ))
                .await
                .map_err(|e| VectorStoreError::CollectionError(e.to_string()))?;
        }

        debug!(collection = %self.collection, "created collection");
        Ok(())
    }

    async fn upsert(&self, chunks: Vec<KnowledgeChunk>) -> Result<UpsertOutcome, VectorStoreError> {
        let mut outcome = UpsertOutcome::default();
        let mut ids = Vec::with_capacity(chunks.len());
        let mut points = Vec::with_capacity(chunks.len());

        for chunk in chunks {
            if let Err(e) = check_dimension(&chunk, self.embedding_dim) {
                outcome.fail(chunk.id, e.to_string());
                continue;
            }
            ids.push(chunk.id.clone());
            points.push(Self::to_point(chunk));
        }

        if points.is_empty() {
            return Ok(outcome);
        }

        match self.upsert_batch(points.clone()).await {
            Ok(()) => outcome.written.extend(ids),
            Err(e) if e.is_retryable() => return Err(e),
            Err(e) => {
                // isolate the offending records
                warn!(collection = %self.collection, error = %e, "batch upsert failed, retrying per point");
                for (id, point) in ids.into_iter().zip(points) {
                    match self.upsert_batch(vec![point]).await {
                        Ok(()) => outcome.written.push(id),
                        Err(e) => outcome.fail(id, e.to_string()),
                    }
                }
            }
        }

        Ok(outcome)
    }

    async fn search(
        &self,
        query_vector: &[f32],
        filters: &SearchFilters,
        limit: usize,
        threshold: f32,
    ) -> Result<Vec<ScoredChunk>, VectorStoreError> {
        if query_vector.len() != self.embedding_dim {
            return Err(VectorStoreError::DimensionMismatch {
                expected: self.embedding_dim,
                actual: query_vector.len(),
            });
        }

        let mut search_builder =
            SearchPointsBuilder::new(&self.collection, query_vector.to_vec(), limit as u64)
                .with_payload(true)
                .score_threshold(threshold);

        if let Some(f) = Self::build_search_filter(filters) {
            search_builder = search_builder.filter(f);
        }

        let results = self
            .client
            .search_points(search_builder)
            .await
            .map_err(|e| VectorStoreError::SearchError(e.to_string()))?;

        let mut hits: Vec<ScoredChunk> = results
            .result
            .into_iter()
            .map(|point| ScoredChunk {
                chunk: Self::from_payload(&point.payload),
                similarity: point.score,
            })
            .collect();

        // reorders ties within the page only; the cutoff is Qdrant's
        hits.sort_by(rank_order);
        Ok(hits)
    }

    async fn count(&self) -> Result<u64, VectorStoreError> {
        let response = self
            .client
            .count(CountPointsBuilder::new(&self.collection).exact(true))
            .await
            .map_err(|e| VectorStoreError::CollectionError(e.to_string()))?;

        Ok(response.result.map_or(0, |r| r.count))
    }

    async fn stats(&self) -> Result<KnowledgeStats, VectorStoreError> {
        let mut stats = KnowledgeStats::default();
        let mut offset: Option<qdrant_client::qdrant::PointId> = None;
        let batch_size = 256u32;

        loop {
            let mut scroll_builder = ScrollPointsBuilder::new(&self.collection)
                .limit(batch_size)
                .with_payload(PayloadIncludeSelector {
                    fields: vec!["companion".to_string(), "category".to_string()],
                })
                .with_vectors(false);

            if let Some(off) = offset {
                scroll_builder = scroll_builder.offset(off);
            }

            let response = self
                .client
                .scroll(scroll_builder)
                .await
                .map_err(|e| VectorStoreError::SearchError(e.to_string()))?;

            if response.result.is_empty() {
                break;
            }

            for point in &response.result {
                stats.record(
                    payload_str(&point.payload, "companion").unwrap_or("universal"),
                    payload_str(&point.payload, "category").unwrap_or("sales"),
                );
            }

            offset = response.next_page_offset;
            if offset.is_none() {
                break;
            }
        }

        Ok(stats)
    }

    fn name(&self) -> &str {
        "qdrant"
    }

    fn collection(&self) -> &str {
        &self.collection
    }
}
