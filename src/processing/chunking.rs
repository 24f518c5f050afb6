//! Word-window chunking.
//!
//! Text is split on runs of whitespace and regrouped into consecutive, non-overlapping
//! windows of `chunk_size` words joined by single spaces. Boundaries ignore sentence
//! structure; the last window may be shorter.

use super::types::ChunkingError;

/// Words per chunk when no override is configured.
pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// Split `text` into windows of `chunk_size` words.
///
/// Returns an empty vector when the input is empty or all whitespace.
pub fn chunk_text(text: &str, chunk_size: usize) -> Result<Vec<String>, ChunkingError> {
    if chunk_size == 0 {
        return Err(ChunkingError::InvalidChunkSize);
    }

    let words: Vec<&str> = text.split_whitespace().collect();
    Ok(words
        .chunks(chunk_size)
        .map(|window| window.join(" "))
        .collect())
}
