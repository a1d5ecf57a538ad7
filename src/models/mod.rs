mod chunk;
mod config;
mod document;
mod report;
mod search;
mod taxonomy;

pub use chunk::{ChunkMetadata, KnowledgeChunk, TextChunk, file_type_of};
pub use config::{
    ChunkingConfig, Config, DEFAULT_CHUNK_OVERLAP, DEFAULT_COLLECTION, DEFAULT_EMBEDDING_DIMENSION,
    DEFAULT_EMBEDDING_MODEL, DEFAULT_EMBEDDING_URL, DEFAULT_MAX_CHUNK_SIZE,
    DEFAULT_MIN_CHUNK_LENGTH, DEFAULT_QDRANT_URL, DEFAULT_THRESHOLD, DEFAULT_TOP_K, EmbeddingApi,
    EmbeddingConfig, IngestionConfig, RetrievalConfig, VectorDriver, VectorStoreConfig,
};
pub use document::SourceDocument;
pub use report::{
    BatchIngestionReport, ChunkFailure, FailureReason, IngestionReport, RejectedDocument,
};
pub use search::{
    KnowledgeStats, OutputFormat, RetrievalQuery, RetrievalResult, ScoredChunk, SearchFilters,
};
pub use taxonomy::{Category, Companion, Priority};
