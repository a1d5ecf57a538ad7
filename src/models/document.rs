use serde::{Deserialize, Serialize};

use super::taxonomy::{Category, Companion, Priority};

/// A raw document handed to the ingestion pipeline.
///
/// Companion, category and priority are inferred per chunk unless pinned here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceDocument {
    pub content: String,
    /// Path, URL or logical name of the originating document.
    pub source: String,
    #[serde(default)]
    pub companion: Option<Companion>,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl SourceDocument {
    pub fn new(content: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            source: source.into(),
            ..Default::default()
        }
    }

    pub fn with_companion(mut self, companion: Companion) -> Self {
        self.companion = Some(companion);
        self
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let doc = SourceDocument::new("body", "notes.md")
            .with_companion(Companion::Athena)
            .with_priority(Priority::High)
            .with_tags(vec!["upload".to_string()]);

        assert_eq!(doc.source, "notes.md");
        assert_eq!(doc.companion, Some(Companion::Athena));
        assert_eq!(doc.category, None);
        assert_eq!(doc.priority, Some(Priority::High));
        assert_eq!(doc.tags, vec!["upload"]);
    }

    #[test]
    fn test_deserialize_minimal() {
        let doc: SourceDocument =
            serde_json::from_str(r#"{"content": "text", "source": "a.txt"}"#).unwrap();
        assert!(doc.companion.is_none());
        assert!(doc.tags.is_empty());
    }
}
