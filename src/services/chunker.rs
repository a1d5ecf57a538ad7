//! Section-aware text chunking with a sliding window for long sections.

use regex::Regex;
use std::sync::LazyLock;

use crate::models::{ChunkingConfig, TextChunk};
use crate::utils::{extract_title, has_meaningful_content};

// A newline followed by a level 1-3 markdown heading marker.
static SECTION_BREAK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n#{1,3}\s+").unwrap());

/// Splits document text into bounded, titled chunks.
#[derive(Debug, Clone)]
pub struct Chunker {
    /// Maximum chunk size in characters
    max_chunk_size: usize,
    /// Characters shared by consecutive windows of one section
    overlap: usize,
    min_chunk_length: usize,
}

impl Chunker {
    pub fn new(config: &ChunkingConfig) -> Self {
        Self {
            max_chunk_size: config.max_chunk_size.max(1),
            overlap: config.overlap,
            min_chunk_length: config.min_chunk_length,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(&ChunkingConfig::default())
    }

    /// Chunk `content`, using `source` to name untitled sections.
    ///
    /// Chunks below the minimum length are dropped and the survivors are
    /// numbered from 0 in document order.
    pub fn chunk(&self, content: &str, source: &str) -> Vec<TextChunk> {
        if content.trim().is_empty() {
            return Vec::new();
        }

        let mut pieces: Vec<(String, String)> = Vec::new();

        for (section_idx, section) in SECTION_BREAK
            .split(content)
            .filter(|s| !s.trim().is_empty())
            .enumerate()
        {
            let title = extract_title(section)
                .unwrap_or_else(|| format!("{} - Section {}", source, section_idx + 1));

            if section.chars().count() <= self.max_chunk_size {
                pieces.push((section.trim().to_string(), title));
                continue;
            }

            for (part_idx, window) in self.split_with_overlap(section).into_iter().enumerate() {
                pieces.push((window, format!("{} - Part {}", title, part_idx + 1)));
            }
        }

        pieces
            .into_iter()
            .filter(|(content, _)| has_meaningful_content(content, self.min_chunk_length))
            .enumerate()
            .map(|(index, (content, title))| TextChunk {
                content,
                title,
                index,
            })
            .collect()
    }

    /// Fixed-size character windows advancing by `max_chunk_size - overlap`.
    fn split_with_overlap(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let total_chars = chars.len();

        let step = if self.max_chunk_size > self.overlap {
            self.max_chunk_size - self.overlap
        } else {
            self.max_chunk_size
        };

        let mut windows = Vec::with_capacity(total_chars.div_ceil(step));
        let mut start = 0;
        while start < total_chars {
            let end = (start + self.max_chunk_size).min(total_chars);
            windows.push(chars[start..end].iter().collect());
            start += step;
        }

        windows
    }
}
