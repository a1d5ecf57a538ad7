use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use super::search::OutputFormat;
use crate::error::ConfigError;

pub const DEFAULT_EMBEDDING_URL: &str = "http://localhost:11411";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";
pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 1536;
pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";
pub const DEFAULT_COLLECTION: &str = "knowledge";
pub const DEFAULT_MAX_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;
pub const DEFAULT_MIN_CHUNK_LENGTH: usize = 50;
pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_THRESHOLD: f32 = 0.75;

const ENV_EMBEDDING_URL: &str = "KPIPE_EMBEDDING_URL";
const ENV_EMBEDDING_API_KEY: &str = "KPIPE_EMBEDDING_API_KEY";
const ENV_VECTOR_STORE_URL: &str = "KPIPE_VECTOR_STORE_URL";
const ENV_VECTOR_STORE_API_KEY: &str = "KPIPE_VECTOR_STORE_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub vector_store: VectorStoreConfig,

    #[serde(default)]
    pub chunking: ChunkingConfig,

    #[serde(default)]
    pub ingestion: IngestionConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

impl Config {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("kpipe").join("config.toml"))
    }

    /// Load the user config file (or defaults), then apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path)?,
            _ => Self::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let path = Self::config_path().ok_or_else(|| {
            ConfigError::PathError("could not determine config directory".to_string())
        })?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var(ENV_EMBEDDING_URL) {
            self.embedding.url = url;
        }
        if let Ok(key) = std::env::var(ENV_EMBEDDING_API_KEY) {
            self.embedding.api_key = Some(key);
        }
        if let Ok(url) = std::env::var(ENV_VECTOR_STORE_URL) {
            self.vector_store.url = url;
        }
        if let Ok(key) = std::env::var(ENV_VECTOR_STORE_API_KEY) {
            self.vector_store.api_key = Some(key);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let chunking = &self.chunking;
        if chunking.max_chunk_size == 0 {
            return Err(ConfigError::ValidationError(
                "chunking.max_chunk_size must be at least 1".to_string(),
            ));
        }
        if chunking.overlap >= chunking.max_chunk_size {
            return Err(ConfigError::ValidationError(format!(
                "chunking.overlap ({}) must be smaller than chunking.max_chunk_size ({})",
                chunking.overlap, chunking.max_chunk_size
            )));
        }
        if self.retrieval.top_k == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.top_k must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.retrieval.threshold) {
            return Err(ConfigError::ValidationError(
                "retrieval.threshold must be between 0.0 and 1.0".to_string(),
            ));
        }
        if self.ingestion.batch_size == 0 {
            return Err(ConfigError::ValidationError(
                "ingestion.batch_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Wire format spoken by the embedding provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingApi {
    /// text-embeddings-inference style `/embed`
    #[default]
    Tei,
    /// OpenAI-compatible `/embeddings`
    OpenAi,
    /// Azure OpenAI deployment endpoint
    Azure,
}

impl fmt::Display for EmbeddingApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmbeddingApi::Tei => write!(f, "tei"),
            EmbeddingApi::OpenAi => write!(f, "openai"),
            EmbeddingApi::Azure => write!(f, "azure"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub api: EmbeddingApi,

    #[serde(default = "default_embedding_url")]
    pub url: String,

    /// Model name (OpenAI) or deployment name (Azure)
    #[serde(default = "default_embedding_model")]
    pub model: String,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub api_key: Option<String>,

    #[serde(default = "default_azure_api_version")]
    pub api_version: String,

    /// Expected vector length; responses of any other length are rejected
    #[serde(default = "default_dimension")]
    pub dimension: u32,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_embedding_url() -> String {
    DEFAULT_EMBEDDING_URL.to_string()
}

fn default_embedding_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

fn default_azure_api_version() -> String {
    "2023-05-15".to_string()
}

fn default_dimension() -> u32 {
    DEFAULT_EMBEDDING_DIMENSION
}

fn default_timeout() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    3
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            api: EmbeddingApi::default(),
            url: default_embedding_url(),
            model: default_embedding_model(),
            api_key: None,
            api_version: default_azure_api_version(),
            dimension: default_dimension(),
            timeout_secs: default_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

/// Knowledge store backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorDriver {
    /// In-process store, optionally snapshotted to a JSON file
    Memory,
    #[default]
    Qdrant,
    #[serde(alias = "postgres")]
    PostgreSQL,
}

impl fmt::Display for VectorDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VectorDriver::Memory => write!(f, "memory"),
            VectorDriver::Qdrant => write!(f, "qdrant"),
            VectorDriver::PostgreSQL => write!(f, "postgresql"),
        }
    }
}

impl FromStr for VectorDriver {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(VectorDriver::Memory),
            "qdrant" => Ok(VectorDriver::Qdrant),
            "postgresql" | "postgres" | "pgvector" => Ok(VectorDriver::PostgreSQL),
            _ => Err(format!("unknown vector store driver: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    #[serde(default)]
    pub driver: VectorDriver,

    #[serde(default = "default_qdrant_url")]
    pub url: String,

    /// Collection (Qdrant) or table (PostgreSQL) name
    #[serde(default = "default_collection")]
    pub collection: String,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub api_key: Option<String>,

    /// PostgreSQL schema; the default search path when unset
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub schema: Option<String>,

    #[serde(default = "default_pool_max")]
    pub pool_max: u32,

    /// Seconds to wait for a pooled PostgreSQL connection
    #[serde(default = "default_pool_acquire_timeout")]
    pub pool_acquire_timeout: u32,

    /// JSON snapshot for the memory driver
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub snapshot_path: Option<PathBuf>,
}

fn default_qdrant_url() -> String {
    DEFAULT_QDRANT_URL.to_string()
}

fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

fn default_pool_max() -> u32 {
    5
}

fn default_pool_acquire_timeout() -> u32 {
    30
}

impl VectorStoreConfig {
    pub fn qualified_table_name(&self) -> String {
        match self.schema {
            Some(ref schema) => format!("{}.{}", schema, self.collection),
            None => self.collection.clone(),
        }
    }
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            driver: VectorDriver::default(),
            url: default_qdrant_url(),
            collection: default_collection(),
            api_key: None,
            schema: None,
            pool_max: default_pool_max(),
            pool_acquire_timeout: default_pool_acquire_timeout(),
            snapshot_path: None,
        }
    }
}

/// Chunk size policy, in characters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: usize,

    #[serde(default = "default_chunk_overlap")]
    pub overlap: usize,

    /// Chunks shorter than this after trimming are discarded
    #[serde(default = "default_min_chunk_length")]
    pub min_chunk_length: usize,
}

fn default_max_chunk_size() -> usize {
    DEFAULT_MAX_CHUNK_SIZE
}

fn default_chunk_overlap() -> usize {
    DEFAULT_CHUNK_OVERLAP
}

fn default_min_chunk_length() -> usize {
    DEFAULT_MIN_CHUNK_LENGTH
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: default_max_chunk_size(),
            overlap: default_chunk_overlap(),
            min_chunk_length: default_min_chunk_length(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    /// Chunks per store upsert call
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_exclude_patterns")]
    pub exclude_patterns: Vec<String>,

    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
}

fn default_batch_size() -> usize {
    16
}

fn default_exclude_patterns() -> Vec<String> {
    vec![
        "**/node_modules/**".to_string(),
        "**/target/**".to_string(),
        "**/.git/**".to_string(),
        "**/dist/**".to_string(),
        "**/build/**".to_string(),
        "**/.venv/**".to_string(),
        "**/*.min.js".to_string(),
        "**/*.lock".to_string(),
        "**/package-lock.json".to_string(),
    ]
}

fn default_max_file_size() -> u64 {
    10 * 1024 * 1024
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            exclude_patterns: default_exclude_patterns(),
            max_file_size: default_max_file_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default = "default_threshold")]
    pub threshold: f32,

    #[serde(default)]
    pub default_format: OutputFormat,
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

fn default_threshold() -> f32 {
    DEFAULT_THRESHOLD
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            threshold: default_threshold(),
            default_format: OutputFormat::Text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.embedding.url, DEFAULT_EMBEDDING_URL);
        assert_eq!(config.vector_store.url, DEFAULT_QDRANT_URL);
        assert_eq!(config.vector_store.collection, DEFAULT_COLLECTION);
        assert_eq!(config.chunking.max_chunk_size, 1000);
        assert_eq!(config.chunking.overlap, 200);
        assert_eq!(config.chunking.min_chunk_length, 50);
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.retrieval.threshold, 0.75);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_path() {
        let path = Config::config_path();
        assert!(path.is_some());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [vector_store]
            driver = "postgres"
            url = "postgres://localhost/knowledge"

            [retrieval]
            threshold = 0.7
            "#,
        )
        .unwrap();

        assert_eq!(config.vector_store.driver, VectorDriver::PostgreSQL);
        assert_eq!(config.vector_store.collection, DEFAULT_COLLECTION);
        assert_eq!(config.retrieval.threshold, 0.7);
        assert_eq!(config.retrieval.top_k, DEFAULT_TOP_K);
        assert_eq!(config.embedding.api, EmbeddingApi::Tei);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.embedding.api = EmbeddingApi::OpenAi;
        config.vector_store.driver = VectorDriver::Memory;
        config.chunking.max_chunk_size = 800;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.embedding.api, EmbeddingApi::OpenAi);
        assert_eq!(loaded.vector_store.driver, VectorDriver::Memory);
        assert_eq!(loaded.chunking.max_chunk_size, 800);
    }

    #[test]
    fn test_validate_rejects_overlap_not_smaller_than_size() {
        let mut config = Config::default();
        config.chunking.overlap = 1000;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_validate_rejects_threshold_out_of_range() {
        let mut config = Config::default();
        config.retrieval.threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_qualified_table_name() {
        let mut config = VectorStoreConfig::default();
        assert_eq!(config.qualified_table_name(), DEFAULT_COLLECTION);
        config.schema = Some("rag".to_string());
        assert_eq!(config.qualified_table_name(), "rag.knowledge");
    }

    #[test]
    fn test_vector_driver_parse() {
        assert_eq!("pgvector".parse::<VectorDriver>().unwrap(), VectorDriver::PostgreSQL);
        assert_eq!("memory".parse::<VectorDriver>().unwrap(), VectorDriver::Memory);
        assert!("redis".parse::<VectorDriver>().is_err());
    }
}
