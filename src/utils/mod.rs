//! Utility modules.

pub mod file;
pub mod retry;
pub mod text;

pub use file::{collect_documents, is_text_file, read_file_content};
pub use retry::{RetryConfig, Retryable, with_retry};
pub use text::{
    MIN_CHUNK_LENGTH, calculate_confidence, extract_keywords, extract_title,
    has_meaningful_content, truncate,
};
