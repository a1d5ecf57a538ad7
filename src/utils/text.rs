//! Text analysis helpers used while enriching chunks.

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Chunks shorter than this (in characters, after trimming) are discarded.
pub const MIN_CHUNK_LENGTH: usize = 50;

/// Maximum keywords kept per chunk.
pub const MAX_KEYWORDS: usize = 10;

/// Character length at which the size component of confidence saturates.
const CONFIDENCE_FULL_LENGTH: f32 = 1000.0;

const STOP_WORDS: &[&str] = &[
    "the", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by", "is", "are",
    "was", "were", "be", "been", "have", "has", "had", "do", "does", "did", "will", "would",
    "could", "should", "may", "might", "must", "can", "this", "that", "these", "those",
];

static NON_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\W+").unwrap());

// Markdown heading, bold span or bullet.
static STRUCTURE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#{1,3}\s+|\*\*|-\s+").unwrap());

/// True if `content` reaches `min_length` characters once trimmed.
pub fn has_meaningful_content(content: &str, min_length: usize) -> bool {
    content.trim().chars().count() >= min_length
}

/// Most frequent content words of `text`, most frequent first.
///
/// Tokens are lowercased, split on non-word characters and kept only when
/// longer than three characters and not a stop word. Ties keep the order of
/// first occurrence.
pub fn extract_keywords(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();

    for (position, word) in NON_WORD
        .split(&lowered)
        .filter(|w| w.chars().count() > 3 && !STOP_WORDS.contains(w))
        .enumerate()
    {
        counts.entry(word).or_insert((0, position)).0 += 1;
    }

    let mut ranked: Vec<(&str, (usize, usize))> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.0.cmp(&a.1.0).then(a.1.1.cmp(&b.1.1)));

    ranked
        .into_iter()
        .take(MAX_KEYWORDS)
        .map(|(word, _)| word.to_string())
        .collect()
}

/// Content quality estimate in `[0, 1]`.
///
/// Length contributes up to 0.7 (saturating at 1000 characters) and any
/// markdown structure adds 0.3.
pub fn calculate_confidence(text: &str) -> f32 {
    let length = text.chars().count() as f32;
    let mut confidence = (length / CONFIDENCE_FULL_LENGTH).min(1.0) * 0.7;

    if STRUCTURE_MARKER.is_match(text) {
        confidence += 0.3;
    }

    confidence.min(1.0)
}

/// First line of a section when it is short enough to read as a heading.
///
/// Leading `#` markers are stripped. Returns `None` for long or empty lines.
pub fn extract_title(section: &str) -> Option<String> {
    let first_line = section.trim().lines().next()?.trim();
    if first_line.is_empty() || first_line.chars().count() >= 100 {
        return None;
    }

    let title = first_line.trim_start_matches('#').trim();
    if title.is_empty() {
        None
    } else {
        Some(title.to_string())
    }
}

/// Truncate text to `max_chars` characters, appending an ellipsis.
pub fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let head: String = text.chars().take(max_chars).collect();
    format!("{}...", head.trim_end())
}
