//! Search-related models for queries and results.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::chunk::KnowledgeChunk;
use super::taxonomy::{Category, Companion, Priority};

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// Machine-parseable JSON format
    Json,
    /// Documentation-friendly Markdown format
    Markdown,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            _ => Err(format!("unknown output format: {}", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

/// Metadata filters applied during similarity search.
///
/// A companion filter also admits `universal` chunks; category and priority
/// are exact matches. Unset filters do not restrict.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFilters {
    pub companion: Option<Companion>,
    pub category: Option<Category>,
    pub priority: Option<Priority>,
}

impl SearchFilters {
    pub fn matches(&self, chunk: &KnowledgeChunk) -> bool {
        chunk.companion.is_eligible_for(self.companion)
            && self.category.is_none_or(|c| chunk.category == c)
            && self.priority.is_none_or(|p| chunk.metadata.priority == p)
    }

    pub fn is_empty(&self) -> bool {
        self.companion.is_none() && self.category.is_none() && self.priority.is_none()
    }
}

/// A free-text retrieval request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievalQuery {
    /// Natural language query text
    pub text: String,

    pub filters: SearchFilters,

    /// Maximum results to return; the service default applies when unset
    pub top_k: Option<usize>,

    /// Minimum similarity; the service default applies when unset
    pub threshold: Option<f32>,
}

impl RetrievalQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_filters(mut self, filters: SearchFilters) -> Self {
        self.filters = filters;
        self
    }

    pub fn with_companion(mut self, companion: Companion) -> Self {
        self.filters.companion = Some(companion);
        self
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.filters.category = Some(category);
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = Some(threshold);
        self
    }
}

/// A stored chunk paired with its similarity to the query vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: KnowledgeChunk,
    pub similarity: f32,
}

/// Ranked chunks plus the aggregate confidence of the retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub query: String,
    pub chunks: Vec<ScoredChunk>,
    /// Mean similarity of `chunks`, 0 when nothing matched.
    pub confidence: f32,
    pub duration_ms: u64,
}

impl RetrievalResult {
    pub fn new(query: String, chunks: Vec<ScoredChunk>, duration_ms: u64) -> Self {
        let confidence = mean_similarity(&chunks);
        Self {
            query,
            chunks,
            confidence,
            duration_ms,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// False signals the caller to fall back to an ungrounded answer.
    pub fn has_grounding(&self) -> bool {
        !self.chunks.is_empty()
    }

    /// Retrieved contents joined for a downstream grounded prompt.
    pub fn context_block(&self) -> String {
        self.chunks
            .iter()
            .map(|c| c.chunk.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

fn mean_similarity(chunks: &[ScoredChunk]) -> f32 {
    if chunks.is_empty() {
        return 0.0;
    }
    chunks.iter().map(|c| c.similarity).sum::<f32>() / chunks.len() as f32
}

/// Chunk totals per companion and per category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeStats {
    pub total_chunks: u64,
    pub by_companion: BTreeMap<String, u64>,
    pub by_category: BTreeMap<String, u64>,
}

impl KnowledgeStats {
    pub fn record(&mut self, companion: &str, category: &str) {
        self.total_chunks += 1;
        *self.by_companion.entry(companion.to_string()).or_insert(0) += 1;
        *self.by_category.entry(category.to_string()).or_insert(0) += 1;
    }
}
