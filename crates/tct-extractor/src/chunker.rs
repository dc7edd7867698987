//! Token-bounded document chunking
//!
//! Chunks never overlap and keep document order. With an exact tokenizer
//! the id sequence is cut into fixed groups of `max_tokens` and each group
//! decoded; otherwise the text is cut into slices of `max_tokens * 4`
//! characters.

use crate::tokenizer::{TokenEstimator, CHARS_PER_TOKEN};
use tracing::{debug, warn};

/// Splits text into chunks for individual extraction calls
#[derive(Debug, Default)]
pub struct TextChunker {
    estimator: TokenEstimator,
}

impl TextChunker {
    pub fn new(estimator: TokenEstimator) -> Self {
        Self { estimator }
    }

    pub fn estimator(&self) -> &TokenEstimator {
        &self.estimator
    }

    /// Estimated token count of `text`
    pub fn estimate_tokens(&self, text: &str) -> usize {
        self.estimator.estimate_tokens(text)
    }

    /// Split `text` into chunks of at most `max_tokens` estimated tokens
    ///
    /// Empty text yields no chunks. A budget of 0 is treated as 1.
    pub fn chunk(&self, text: &str, max_tokens: usize) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }
        let max_tokens = max_tokens.max(1);

        if let Some(tokenizer) = self.estimator.tokenizer() {
            let decoded = tokenizer.encode(text).and_then(|ids| {
                ids.chunks(max_tokens)
                    .map(|group| tokenizer.decode(group))
                    .collect::<Result<Vec<_>, _>>()
            });
            match decoded {
                Ok(chunks) => {
                    debug!(chunks = chunks.len(), max_tokens, "Token-accurate chunking");
                    return chunks;
                }
                Err(e) => warn!("Token chunking failed, using character slices: {}", e),
            }
        }

        let chunks = chunk_by_chars(text, max_tokens.saturating_mul(CHARS_PER_TOKEN));
        debug!(chunks = chunks.len(), max_tokens, "Character chunking");
        chunks
    }
}

/// Slices of `width` characters, cut on char boundaries
fn chunk_by_chars(text: &str, width: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut count = 0;

    for (idx, _) in text.char_indices() {
        if count == width {
            chunks.push(text[start..idx].to_string());
            start = idx;
            count = 0;
        }
        count += 1;
    }
    if start < text.len() {
        chunks.push(text[start..].to_string());
    }
    chunks
}
