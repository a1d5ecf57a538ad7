use std::fmt::{self, Write as FmtWrite};

use crate::models::{BatchIngestionReport, KnowledgeStats, OutputFormat, RetrievalResult, TextChunk};
use crate::utils::truncate;

const PREVIEW_CHARS: usize = 200;

pub trait Formatter {
    fn format_retrieval(&self, result: &RetrievalResult, show_context: bool) -> String;
    fn format_ingestion(&self, report: &BatchIngestionReport) -> String;
    fn format_preview(&self, previews: &[DocumentPreview]) -> String;
    fn format_status(&self, status: &StatusInfo) -> String;
    fn format_stats(&self, stats: &KnowledgeStats) -> String;
    fn format_message(&self, message: &str) -> String;
    fn format_error(&self, error: &str) -> String;
}

#[derive(Debug, Clone)]
pub struct StatusInfo {
    pub embedding_api: String,
    pub embedding_url: String,
    pub embedding_model: String,
    pub embedding_healthy: bool,
    pub embedding_error: Option<String>,
    pub vector_store_driver: String,
    pub vector_store_url: String,
    pub vector_store_connected: bool,
    pub collection: String,
    pub chunk_count: u64,
}

/// Chunks a dry run would ingest for one document.
#[derive(Debug, Clone)]
pub struct DocumentPreview {
    pub source: String,
    pub chunks: Vec<TextChunk>,
}

fn render(write: impl FnOnce(&mut String) -> fmt::Result) -> String {
    let mut output = String::new();
    // writing into a String cannot fail
    let _ = write(&mut output);
    output
}

pub struct TextFormatter;

impl Formatter for TextFormatter {
    fn format_retrieval(&self, result: &RetrievalResult, show_context: bool) -> String {
        if result.is_empty() {
            return format!("No knowledge found for: {}\n", result.query);
        }

        render(|output| {
            writeln!(output, "Knowledge for: \"{}\"", result.query)?;
            writeln!(
                output,
                "Found {} chunks in {}ms (confidence {:.3})\n",
                result.len(),
                result.duration_ms,
                result.confidence
            )?;

            for (i, scored) in result.chunks.iter().enumerate() {
                let chunk = &scored.chunk;
                writeln!(output, "{}. [Score: {:.3}] {}", i + 1, scored.similarity, chunk.title)?;
                writeln!(output, "   Source:    {} (chunk {})", chunk.source, chunk.chunk_index)?;
                writeln!(
                    output,
                    "   Routing:   {} / {} / {}",
                    chunk.companion, chunk.category, chunk.metadata.priority
                )?;
                if !chunk.keywords.is_empty() {
                    writeln!(output, "   Keywords:  {}", chunk.keywords.join(", "))?;
                }
                writeln!(output, "   ---")?;
                for line in truncate(&chunk.content, PREVIEW_CHARS).lines() {
                    writeln!(output, "   {}", line)?;
                }
                writeln!(output)?;
            }

            if show_context {
                writeln!(output, "Context")?;
                writeln!(output, "-------")?;
                writeln!(output, "{}", result.context_block())?;
            }
            Ok(())
        })
    }

    fn format_ingestion(&self, report: &BatchIngestionReport) -> String {
        render(|output| {
            writeln!(output, "Ingestion Complete")?;
            writeln!(output, "------------------")?;
            writeln!(
                output,
                "Documents:      {} ingested, {} rejected",
                report.documents_succeeded(),
                report.rejected.len()
            )?;
            writeln!(
                output,
                "Chunks stored:  {} of {}",
                report.chunks_written(),
                report.chunks_total()
            )?;
            writeln!(output, "Chunk failures: {}", report.chunk_failures())?;
            writeln!(output, "Duration:       {}ms", report.duration_ms)?;

            let distribution = report.companion_distribution();
            if !distribution.is_empty() {
                writeln!(output, "\nBy companion")?;
                for (companion, count) in &distribution {
                    writeln!(output, "  {:<12} {}", companion, count)?;
                }
            }

            for doc in report.reports.iter().filter(|r| !r.failures.is_empty()) {
                writeln!(output, "\n{}: {}", doc.source, doc.summary())?;
                for failure in &doc.failures {
                    writeln!(
                        output,
                        "  chunk {} of {} [{}] {}",
                        failure.index, doc.total_chunks, failure.reason, failure.message
                    )?;
                }
            }

            for rejected in &report.rejected {
                writeln!(output, "\nRejected {}: {}", rejected.source, rejected.reason)?;
            }
            Ok(())
        })
    }

    fn format_preview(&self, previews: &[DocumentPreview]) -> String {
        render(|output| {
            writeln!(output, "Dry run: nothing was embedded or stored")?;
            for preview in previews {
                writeln!(output, "\n{} ({} chunks)", preview.source, preview.chunks.len())?;
                for chunk in &preview.chunks {
                    writeln!(
                        output,
                        "  {}. {} ({} chars)",
                        chunk.index + 1,
                        chunk.title,
                        chunk.content.chars().count()
                    )?;
                }
            }
            Ok(())
        })
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        render(|output| {
            writeln!(output, "Status")?;
            writeln!(output, "------")?;

            let embedding_status = if status.embedding_healthy {
                "[HEALTHY]"
            } else {
                "[UNAVAILABLE]"
            };
            writeln!(
                output,
                "Embedding:     {} ({})",
                status.embedding_api, embedding_status
            )?;
            writeln!(output, "  URL:         {}", status.embedding_url)?;
            writeln!(output, "  Model:       {}", status.embedding_model)?;
            if let Some(ref error) = status.embedding_error {
                writeln!(output, "  Error:       {}", error)?;
            }
            writeln!(output)?;

            let vector_status = if status.vector_store_connected {
                "[CONNECTED]"
            } else {
                "[DISCONNECTED]"
            };
            writeln!(
                output,
                "Vector Store:  {} ({})",
                status.vector_store_driver, vector_status
            )?;
            if status.vector_store_connected {
                writeln!(output, "  URL:         {}", status.vector_store_url)?;
                writeln!(output, "  Collection:  {}", status.collection)?;
                writeln!(output, "  Chunks:      {}", status.chunk_count)?;
            }
            Ok(())
        })
    }

    fn format_stats(&self, stats: &KnowledgeStats) -> String {
        if stats.total_chunks == 0 {
            return "Knowledge base is empty.\n".to_string();
        }

        render(|output| {
            writeln!(output, "Knowledge Base")?;
            writeln!(output, "--------------")?;
            writeln!(output, "Total chunks: {}", stats.total_chunks)?;
            writeln!(output, "\nBy companion")?;
            for (companion, count) in &stats.by_companion {
                writeln!(output, "  {:<12} {}", companion, count)?;
            }
            writeln!(output, "\nBy category")?;
            for (category, count) in &stats.by_category {
                writeln!(output, "  {:<12} {}", category, count)?;
            }
            Ok(())
        })
    }

    fn format_message(&self, message: &str) -> String {
        format!("{}\n", message)
    }

    fn format_error(&self, error: &str) -> String {
        format!("Error: {}\n", error)
    }
}

pub struct JsonFormatter {
    pub pretty: bool,
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    fn to_json<T: serde::Serialize + ?Sized>(&self, value: &T) -> String {
        let result = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        result.unwrap_or_else(|e| serde_json::json!({"error": e.to_string()}).to_string())
    }
}

impl Formatter for JsonFormatter {
    fn format_retrieval(&self, result: &RetrievalResult, show_context: bool) -> String {
        if !show_context {
            return self.to_json(result);
        }
        let mut json = serde_json::to_value(result)
            .unwrap_or_else(|e| serde_json::json!({"error": e.to_string()}));
        if let Some(object) = json.as_object_mut() {
            object.insert("context".to_string(), result.context_block().into());
        }
        self.to_json(&json)
    }

    fn format_ingestion(&self, report: &BatchIngestionReport) -> String {
        let json = serde_json::json!({
            "documents_total": report.documents_total(),
            "documents_succeeded": report.documents_succeeded(),
            "chunks_total": report.chunks_total(),
            "chunks_written": report.chunks_written(),
            "chunk_failures": report.chunk_failures(),
            "companions": report.companion_distribution(),
            "duration_ms": report.duration_ms,
            "reports": report.reports,
            "rejected": report.rejected,
        });
        self.to_json(&json)
    }

    fn format_preview(&self, previews: &[DocumentPreview]) -> String {
        let documents: Vec<serde_json::Value> = previews
            .iter()
            .map(|p| {
                let chunks: Vec<serde_json::Value> = p
                    .chunks
                    .iter()
                    .map(|c| {
                        serde_json::json!({
                            "index": c.index,
                            "title": c.title,
                            "chars": c.content.chars().count(),
                        })
                    })
                    .collect();
                serde_json::json!({"source": p.source, "chunks": chunks})
            })
            .collect();

        self.to_json(&serde_json::json!({"dry_run": true, "documents": documents}))
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let json = serde_json::json!({
            "embedding": {
                "api": status.embedding_api,
                "url": status.embedding_url,
                "model": status.embedding_model,
                "healthy": status.embedding_healthy,
                "error": status.embedding_error,
            },
            "vector_store": {
                "driver": status.vector_store_driver,
                "url": status.vector_store_url,
                "connected": status.vector_store_connected,
                "collection": status.collection,
                "chunks": status.chunk_count,
            }
        });
        self.to_json(&json)
    }

    fn format_stats(&self, stats: &KnowledgeStats) -> String {
        self.to_json(stats)
    }

    fn format_message(&self, message: &str) -> String {
        serde_json::json!({"message": message}).to_string()
    }

    fn format_error(&self, error: &str) -> String {
        serde_json::json!({"error": error}).to_string()
    }
}

pub struct MarkdownFormatter;

impl Formatter for MarkdownFormatter {
    fn format_retrieval(&self, result: &RetrievalResult, show_context: bool) -> String {
        if result.is_empty() {
            return format!("## No knowledge found\n\nQuery: `{}`\n", result.query);
        }

        render(|output| {
            writeln!(output, "## Knowledge\n")?;
            writeln!(output, "**Query:** `{}`\n", result.query)?;
            writeln!(
                output,
                "Found {} chunks in {}ms, confidence {:.3}\n",
                result.len(),
                result.duration_ms,
                result.confidence
            )?;

            for (i, scored) in result.chunks.iter().enumerate() {
                let chunk = &scored.chunk;
                writeln!(output, "### {}. {} ({:.3})\n", i + 1, chunk.title, scored.similarity)?;
                writeln!(
                    output,
                    "**Source:** `{}` | **Companion:** {} | **Category:** {} | **Priority:** {}\n",
                    chunk.source, chunk.companion, chunk.category, chunk.metadata.priority
                )?;
                writeln!(output, "```")?;
                writeln!(output, "{}", chunk.content)?;
                writeln!(output, "```\n")?;
            }

            if show_context {
                writeln!(output, "### Context\n")?;
                for line in result.context_block().lines() {
                    writeln!(output, "> {}", line)?;
                }
            }
            Ok(())
        })
    }

    fn format_ingestion(&self, report: &BatchIngestionReport) -> String {
        render(|output| {
            writeln!(output, "## Ingestion Complete\n")?;
            writeln!(output, "| Metric | Value |")?;
            writeln!(output, "|--------|-------|")?;
            writeln!(output, "| Documents ingested | {} |", report.documents_succeeded())?;
            writeln!(output, "| Documents rejected | {} |", report.rejected.len())?;
            writeln!(output, "| Chunks stored | {} |", report.chunks_written())?;
            writeln!(output, "| Chunks total | {} |", report.chunks_total())?;
            writeln!(output, "| Chunk failures | {} |", report.chunk_failures())?;
            writeln!(output, "| Duration | {}ms |", report.duration_ms)?;

            let failures: Vec<_> = report
                .reports
                .iter()
                .flat_map(|r| r.failures.iter().map(move |f| (r, f)))
                .collect();
            if !failures.is_empty() {
                writeln!(output, "\n### Failures\n")?;
                writeln!(output, "| Source | Chunk | Reason | Message |")?;
                writeln!(output, "|--------|-------|--------|---------|")?;
                for (doc, failure) in failures {
                    writeln!(
                        output,
                        "| `{}` | {} of {} | {} | {} |",
                        doc.source, failure.index, doc.total_chunks, failure.reason, failure.message
                    )?;
                }
            }
            Ok(())
        })
    }

    fn format_preview(&self, previews: &[DocumentPreview]) -> String {
        render(|output| {
            writeln!(output, "## Dry Run\n")?;
            for preview in previews {
                writeln!(output, "### `{}`\n", preview.source)?;
                writeln!(output, "| # | Title | Chars |")?;
                writeln!(output, "|---|-------|-------|")?;
                for chunk in &preview.chunks {
                    writeln!(
                        output,
                        "| {} | {} | {} |",
                        chunk.index + 1,
                        chunk.title,
                        chunk.content.chars().count()
                    )?;
                }
                writeln!(output)?;
            }
            Ok(())
        })
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        render(|output| {
            writeln!(output, "## Status\n")?;

            let embedding_status = if status.embedding_healthy { "✅" } else { "❌" };
            writeln!(output, "### Embedding ({}) {}\n", status.embedding_api, embedding_status)?;
            writeln!(output, "- **URL:** `{}`", status.embedding_url)?;
            writeln!(output, "- **Model:** {}", status.embedding_model)?;
            if let Some(ref error) = status.embedding_error {
                writeln!(output, "- **Error:** {}", error)?;
            }
            writeln!(output)?;

            let vector_status = if status.vector_store_connected {
                "✅"
            } else {
                "❌"
            };
            writeln!(
                output,
                "### Vector Store ({}) {}\n",
                status.vector_store_driver, vector_status
            )?;
            writeln!(output, "- **URL:** `{}`", status.vector_store_url)?;
            writeln!(output, "- **Collection:** {}", status.collection)?;
            writeln!(output, "- **Chunks:** {}", status.chunk_count)?;
            Ok(())
        })
    }

    fn format_stats(&self, stats: &KnowledgeStats) -> String {
        render(|output| {
            writeln!(output, "## Knowledge Base\n")?;
            writeln!(output, "**Total chunks:** {}\n", stats.total_chunks)?;
            writeln!(output, "| Companion | Chunks |")?;
            writeln!(output, "|-----------|--------|")?;
            for (companion, count) in &stats.by_companion {
                writeln!(output, "| {} | {} |", companion, count)?;
            }
            writeln!(output, "\n| Category | Chunks |")?;
            writeln!(output, "|----------|--------|")?;
            for (category, count) in &stats.by_category {
                writeln!(output, "| {} | {} |", category, count)?;
            }
            Ok(())
        })
    }

    fn format_message(&self, message: &str) -> String {
        format!("> {}\n", message)
    }

    fn format_error(&self, error: &str) -> String {
        format!("> ⚠️ **Error:** {}\n", error)
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter),
        OutputFormat::Json => Box::new(JsonFormatter::new(true)),
        OutputFormat::Markdown => Box::new(MarkdownFormatter),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Category, ChunkFailure, ChunkMetadata, Companion, FailureReason, IngestionReport,
        KnowledgeChunk, Priority, ScoredChunk,
    };
    use chrono::Utc;

    fn result() -> RetrievalResult {
        let chunk = KnowledgeChunk {
            id: "kn_a".to_string(),
            content: "Escalate lending exceptions to the credit desk.".to_string(),
            title: "Escalation".to_string(),
            source: "playbook.md".to_string(),
            chunk_index: 0,
            companion: Companion::EbyTech,
            category: Category::Sop,
            keywords: vec!["lending".to_string()],
            tags: vec![],
            metadata: ChunkMetadata {
                file_type: "md".to_string(),
                uploaded_at: Utc::now(),
                last_updated: Utc::now(),
                confidence: 0.3,
                priority: Priority::High,
            },
            vector: vec![],
        };
        RetrievalResult::new(
            "lending exceptions".to_string(),
            vec![ScoredChunk {
                chunk,
                similarity: 0.91,
            }],
            3,
        )
    }

    fn batch() -> BatchIngestionReport {
        let mut report = IngestionReport::new("policies.md");
        report.total_chunks = 3;
        report.chunks_written = 2;
        report.companions.insert("universal".to_string(), 2);
        report.failures.push(ChunkFailure {
            index: 2,
            chunk_id: "kn_b".to_string(),
            title: "Shipping".to_string(),
            reason: FailureReason::ProviderError,
            message: "embedding timeout".to_string(),
        });
        BatchIngestionReport {
            reports: vec![report],
            rejected: vec![],
            duration_ms: 10,
        }
    }

    #[test]
    fn test_text_retrieval() {
        let output = TextFormatter.format_retrieval(&result(), true);
        assert!(output.contains("[Score: 0.910] Escalation"));
        assert!(output.contains("ebytech / sop / high"));
        assert!(output.contains("Context"));
    }

    #[test]
    fn test_text_empty_retrieval() {
        let empty = RetrievalResult::new("nothing".to_string(), vec![], 1);
        assert_eq!(
            TextFormatter.format_retrieval(&empty, false),
            "No knowledge found for: nothing\n"
        );
    }

    #[test]
    fn test_text_ingestion_lists_failures() {
        let output = TextFormatter.format_ingestion(&batch());
        assert!(output.contains("Chunks stored:  2 of 3"));
        assert!(output.contains("chunk 2 of 3 [ProviderError] embedding timeout"));
    }

    #[test]
    fn test_json_retrieval_with_context() {
        let output = JsonFormatter::new(false).format_retrieval(&result(), true);
        let json: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(json["chunks"][0]["chunk"]["companion"], "ebytech");
        assert_eq!(
            json["context"],
            "Escalate lending exceptions to the credit desk."
        );
    }

    #[test]
    fn test_json_ingestion() {
        let output = JsonFormatter::new(true).format_ingestion(&batch());
        let json: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(json["chunks_written"], 2);
        assert_eq!(json["reports"][0]["failures"][0]["reason"], "ProviderError");
    }

    #[test]
    fn test_markdown_stats() {
        let mut stats = KnowledgeStats::default();
        stats.record("athena", "sop");
        let output = MarkdownFormatter.format_stats(&stats);
        assert!(output.contains("| athena | 1 |"));
        assert!(output.contains("| sop | 1 |"));
    }
}
