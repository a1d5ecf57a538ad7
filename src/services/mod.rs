mod chunker;
mod classifier;
mod embedding;
mod ingestion;
mod retrieval;
mod vector_store;

#[cfg(test)]
pub(crate) mod testing;

pub use chunker::Chunker;
pub use classifier::{
    CATEGORY_RULES, COMPANION_RULES, Classification, Classifier, KeywordRule, PRIORITY_RULES,
    RuleTable,
};
pub use embedding::{Embedder, HttpEmbedder};
pub use ingestion::IngestionPipeline;
pub use retrieval::RetrievalService;
pub use vector_store::{
    FailedRecord, KnowledgeStore, MemoryStore, PgVectorStore, QdrantStore, UpsertOutcome,
    cosine_similarity, create_store,
};
