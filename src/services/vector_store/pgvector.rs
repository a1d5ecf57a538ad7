use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pgvector::Vector;
use sqlx::Row;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use std::time::Duration;
use tracing::{debug, warn};

use super::{KnowledgeStore, UpsertOutcome, check_dimension, rank_order};
use crate::error::VectorStoreError;
use crate::models::{
    ChunkMetadata, Companion, KnowledgeChunk, KnowledgeStats, ScoredChunk, SearchFilters,
    VectorStoreConfig,
};

pub struct PgVectorStore {
    pool: PgPool,
    table_name: String,
    collection: String,
    embedding_dim: usize,
}

impl PgVectorStore {
    pub async fn new(config: &VectorStoreConfig, embedding_dim: usize) -> Result<Self, VectorStoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.pool_max)
            .acquire_timeout(Duration::from_secs(config.pool_acquire_timeout.into()))
            .connect(&config.url)
            .await
            .map_err(|e| VectorStoreError::ConnectionError(e.to_string()))?;

        let store = Self {
            pool,
            table_name: config.qualified_table_name(),
            collection: config.collection.clone(),
            embedding_dim,
        };

        store.check_pgvector_extension().await?;

        if let Some(ref schema) = config.schema {
            store.ensure_schema(schema).await?;
        }

        Ok(store)
    }

    async fn check_pgvector_extension(&self) -> Result<(), VectorStoreError> {
        let result: Option<(String,)> =
            sqlx::query_as("SELECT extname FROM pg_extension WHERE extname = 'vector'")
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| VectorStoreError::PostgresError(e.to_string()))?;

        if result.is_none() {
            return Err(VectorStoreError::PgVectorExtensionError(
                "pgvector extension is not installed. Run: CREATE EXTENSION vector;".to_string(),
            ));
        }

        Ok(())
    }

    async fn ensure_schema(&self, schema: &str) -> Result<(), VectorStoreError> {
        let query = format!("CREATE SCHEMA IF NOT EXISTS {}", schema);
        sqlx::query(&query)
            .execute(&self.pool)
            .await
            .map_err(|e| VectorStoreError::PostgresError(e.to_string()))?;
        Ok(())
    }

    fn upsert_sql(&self) -> String {
        format!(
            r#"
            INSERT INTO {} (id, content, title, source, chunk_index, companion, category,
                            keywords, tags, file_type, uploaded_at, last_updated, confidence,
                            priority, embedding)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT (id) DO UPDATE SET
                content = EXCLUDED.content,
                title = EXCLUDED.title,
                source = EXCLUDED.source,
                chunk_index = EXCLUDED.chunk_index,
                companion = EXCLUDED.companion,
                category = EXCLUDED.category,
                keywords = EXCLUDED.keywords,
                tags = EXCLUDED.tags,
                file_type = EXCLUDED.file_type,
                uploaded_at = EXCLUDED.uploaded_at,
                last_updated = EXCLUDED.last_updated,
                confidence = EXCLUDED.confidence,
                priority = EXCLUDED.priority,
                embedding = EXCLUDED.embedding
            "#,
            self.table_name
        )
    }

    /// WHERE clause for `filters`; `$1` is the query vector and `$2` the threshold.
    fn build_where_clause(filters: &SearchFilters) -> (String, Vec<String>) {
        let mut where_parts = vec!["(1 - (embedding <=> $1)) >= $2".to_string()];
        let mut binds = Vec::new();
        let mut param_index = 3;

        if let Some(companion) = filters.companion {
            where_parts.push(format!(
                "(companion = ${} OR companion = '{}')",
                param_index,
                Companion::Universal
            ));
            binds.push(companion.to_string());
            param_index += 1;
        }
        if let Some(category) = filters.category {
            where_parts.push(format!("category = ${}", param_index));
            binds.push(category.to_string());
            param_index += 1;
        }
        if let Some(priority) = filters.priority {
            where_parts.push(format!("priority = ${}", param_index));
            binds.push(priority.to_string());
        }

        (format!("WHERE {}", where_parts.join(" AND ")), binds)
    }

    fn row_to_chunk(row: &PgRow) -> Result<KnowledgeChunk, sqlx::Error> {
        let companion: String = row.try_get("companion")?;
        let category: String = row.try_get("category")?;
        let priority: String = row.try_get("priority")?;
        let chunk_index: i32 = row.try_get("chunk_index")?;
        let uploaded_at: DateTime<Utc> = row.try_get("uploaded_at")?;
        let last_updated: DateTime<Utc> = row.try_get("last_updated")?;

        Ok(KnowledgeChunk {
            id: row.try_get("id")?,
            content: row.try_get("content")?,
            title: row.try_get("title")?,
            source: row.try_get("source")?,
            chunk_index: chunk_index.max(0) as u32,
            companion: companion.parse().unwrap_or_default(),
            category: category.parse().unwrap_or_default(),
            keywords: row.try_get("keywords")?,
            tags: row.try_get("tags")?,
            metadata: ChunkMetadata {
                file_type: row.try_get("file_type")?,
                uploaded_at,
                last_updated,
                confidence: row.try_get("confidence")?,
                priority: priority.parse().unwrap_or_default(),
            },
            vector: Vec::new(),
        })
    }
}

fn is_connectivity_error(e: &sqlx::Error) -> bool {
    matches!(
        e,
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed
    )
}

#[async_trait]
impl KnowledgeStore for PgVectorStore {
    async fn health_check(&self) -> Result<bool, VectorStoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map(|_| true)
            .map_err(|e| VectorStoreError::ConnectionError(e.to_string()))
    }

    async fn ensure_collection(&self) -> Result<(), VectorStoreError> {
        let create_table = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id TEXT PRIMARY KEY,
                content TEXT NOT NULL,
                title TEXT NOT NULL,
                source TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                companion TEXT NOT NULL,
                category TEXT NOT NULL,
                keywords TEXT[] NOT NULL DEFAULT '{{}}',
                tags TEXT[] NOT NULL DEFAULT '{{}}',
                file_type TEXT NOT NULL,
                uploaded_at TIMESTAMPTZ NOT NULL,
                last_updated TIMESTAMPTZ NOT NULL,
                confidence REAL NOT NULL,
                priority TEXT NOT NULL,
                embedding vector({}) NOT NULL
            )
            "#,
            self.table_name, self.embedding_dim
        );

        sqlx::query(&create_table)
            .execute(&self.pool)
            .await
            .map_err(|e| VectorStoreError::CollectionError(e.to_string()))?;

        let indices = [
            format!(
                "CREATE INDEX IF NOT EXISTS {}_embedding_idx ON {} USING hnsw (embedding vector_cosine_ops)",
                self.collection, self.table_name
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS {}_companion_idx ON {} (companion)",
                self.collection, self.table_name
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS {}_category_idx ON {} (category)",
                self.collection, self.table_name
            ),
        ];

        for index_sql in &indices {
            sqlx::query(index_sql)
                .execute(&self.pool)
                .await
                .map_err(|e| VectorStoreError::CollectionError(e.to_string()))?;
        }

        debug!(table = %self.table_name, "ensured knowledge table");
        Ok(())
    }

    async fn upsert(&self, chunks: Vec<KnowledgeChunk>) -> Result<UpsertOutcome, VectorStoreError> {
        let mut outcome = UpsertOutcome::default();
        if chunks.is_empty() {
            return Ok(outcome);
        }

        let query = self.upsert_sql();

        // one statement per record, no spanning transaction
        for chunk in chunks {
            if let Err(e) = check_dimension(&chunk, self.embedding_dim) {
                outcome.fail(chunk.id, e.to_string());
                continue;
            }

            let metadata = &chunk.metadata;
            let result = sqlx::query(&query)
                .bind(&chunk.id)
                .bind(&chunk.content)
                .bind(&chunk.title)
                .bind(&chunk.source)
                .bind(chunk.chunk_index as i32)
                .bind(chunk.companion.to_string())
                .bind(chunk.category.to_string())
                .bind(&chunk.keywords)
                .bind(&chunk.tags)
                .bind(&metadata.file_type)
                .bind(metadata.uploaded_at)
                .bind(metadata.last_updated)
                .bind(metadata.confidence)
                .bind(metadata.priority.to_string())
                .bind(Vector::from(chunk.vector.clone()))
                .execute(&self.pool)
                .await;

            match result {
                Ok(_) => outcome.written.push(chunk.id),
                Err(e) if is_connectivity_error(&e) && outcome.written.is_empty() => {
                    return Err(VectorStoreError::ConnectionError(e.to_string()));
                }
                Err(e) => {
                    warn!(chunk_id = %chunk.id, error = %e, "failed to upsert chunk");
                    outcome.fail(chunk.id, e.to_string());
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

        let (where_clause, binds) = Self::build_where_clause(filters);
        let query = format!(
            r#"
            SELECT
                id, content, title, source, chunk_index, companion, category, keywords, tags,
                file_type, uploaded_at, last_updated, confidence, priority,
                (1 - (embedding <=> $1))::float8 AS score
            FROM {}
            {}
            ORDER BY embedding <=> $1, uploaded_at, chunk_index
            LIMIT {}
            "#,
            self.table_name, where_clause, limit
        );

        let embedding = Vector::from(query_vector.to_vec());
        let mut query_builder = sqlx::query(&query)
            .bind(&embedding)
            .bind(f64::from(threshold));
        for value in &binds {
            query_builder = query_builder.bind(value);
        }

        let rows = query_builder
            .fetch_all(&self.pool)
            .await
            .map_err(|e| VectorStoreError::SearchError(e.to_string()))?;

        let mut hits = rows
            .iter()
            .map(|row| {
                let score: f64 = row.try_get("score")?;
                Ok(ScoredChunk {
                    chunk: Self::row_to_chunk(row)?,
                    similarity: score as f32,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(|e| VectorStoreError::SearchError(e.to_string()))?;

        hits.sort_by(rank_order);
        Ok(hits)
    }

    async fn count(&self) -> Result<u64, VectorStoreError> {
        let query = format!("SELECT COUNT(*) FROM {}", self.table_name);
        let row: (i64,) = sqlx::query_as(&query)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| VectorStoreError::PostgresError(e.to_string()))?;

        Ok(row.0 as u64)
    }

    async fn stats(&self) -> Result<KnowledgeStats, VectorStoreError> {
        let query = format!(
            "SELECT companion, category, COUNT(*) AS count FROM {} GROUP BY companion, category",
            self.table_name
        );

        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| VectorStoreError::PostgresError(e.to_string()))?;

        let mut stats = KnowledgeStats::default();
        for row in rows {
            let companion: String = row.get("companion");
            let category: String = row.get("category");
            let count: i64 = row.get("count");
            let count = count as u64;

            stats.total_chunks += count;
            *stats.by_companion.entry(companion).or_insert(0) += count;
            *stats.by_category.entry(category).or_insert(0) += count;
        }

        Ok(stats)
    }

    fn name(&self) -> &str {
        "postgresql"
    }

    fn collection(&self) -> &str {
        &self.collection
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, Priority};

    #[test]
    fn test_where_clause_without_filters() {
        let (clause, binds) = PgVectorStore::build_where_clause(&SearchFilters::default());
        assert_eq!(clause, "WHERE (1 - (embedding <=> $1)) >= $2");
        assert!(binds.is_empty());
    }

    #[test]
    fn test_where_clause_with_all_filters() {
        let (clause, binds) = PgVectorStore::build_where_clause(&SearchFilters {
            companion: Some(Companion::Athena),
            category: Some(Category::Sop),
            priority: Some(Priority::Critical),
        });
        assert!(clause.contains("(companion = $3 OR companion = 'universal')"));
        assert!(clause.contains("category = $4"));
        assert!(clause.contains("priority = $5"));
        assert_eq!(binds, vec!["athena", "sop", "critical"]);
    }

    #[test]
    fn test_where_clause_numbers_params_in_order() {
        let (clause, binds) = PgVectorStore::build_where_clause(&SearchFilters {
            companion: None,
            category: None,
            priority: Some(Priority::High),
        });
        assert!(clause.ends_with("priority = $3"));
        assert_eq!(binds, vec!["high"]);
    }
}
