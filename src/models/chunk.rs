use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::taxonomy::{Category, Companion, Priority};

/// A bounded span of document text produced by the chunker, before
/// classification and embedding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub content: String,
    pub title: String,
    /// 0-based position within the document's chunk list.
    pub index: usize,
}

/// The unit of stored knowledge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeChunk {
    pub id: String,
    pub content: String,
    pub title: String,
    pub source: String,
    pub chunk_index: u32,
    pub companion: Companion,
    pub category: Category,
    pub keywords: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub metadata: ChunkMetadata,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub vector: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub file_type: String,
    pub uploaded_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    /// Content quality estimate in [0, 1].
    pub confidence: f32,
    pub priority: Priority,
}

impl KnowledgeChunk {
    /// Build a chunk id from the source, the chunk index and the creation time.
    ///
    /// The readable slug is the last path segment of the source; the short
    /// hash of the full source keeps `a/notes.md` and `b/notes.md` apart.
    pub fn generate_id(source: &str, chunk_index: u32, created_at: DateTime<Utc>) -> String {
        let slug: String = source
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or_default()
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .collect();
        let slug = if slug.is_empty() {
            "unknown".to_string()
        } else {
            slug
        };
        let source_hash = Uuid::new_v5(&Uuid::NAMESPACE_URL, source.as_bytes()).simple().to_string();

        format!(
            "kn_{}_{}_{}_{}",
            slug,
            &source_hash[..8],
            chunk_index,
            created_at.timestamp_millis()
        )
    }

    /// Stable point id for stores that only accept UUIDs.
    pub fn point_uuid(id: &str) -> String {
        Uuid::new_v5(&Uuid::NAMESPACE_OID, id.as_bytes()).to_string()
    }
}

/// Lowercased extension of a source identifier, or `unknown`.
pub fn file_type_of(source: &str) -> String {
    let name = source.rsplit(['/', '\\']).next().unwrap_or(source);
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => ext.to_lowercase(),
        _ => "unknown".to_string(),
    }
}
