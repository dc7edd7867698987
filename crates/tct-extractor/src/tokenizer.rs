//! Token counting
//!
//! Exact counts come from a HuggingFace `tokenizer.json` when the crate is
//! built with the `hf-tokenizer` feature and a path is configured. Every
//! other case uses the approximation of one token per four characters.

use std::path::Path;
use thiserror::Error;
use tracing::warn;

/// Tokenizer failure; always recoverable by falling back to the estimate
#[derive(Error, Debug)]
#[error("Tokenizer error: {0}")]
pub struct TokenizerError(pub String);

/// Exact tokenizer seam
pub trait Tokenizer: Send + Sync {
    fn encode(&self, text: &str) -> Result<Vec<u32>, TokenizerError>;

    fn decode(&self, ids: &[u32]) -> Result<String, TokenizerError>;
}

/// Characters per token assumed by the approximation
pub const CHARS_PER_TOKEN: usize = 4;

/// Token count approximation: character count divided by four
pub fn approximate_tokens(text: &str) -> usize {
    text.chars().count() / CHARS_PER_TOKEN
}

/// Token estimator with an optional exact tokenizer
pub struct TokenEstimator {
    exact: Option<Box<dyn Tokenizer>>,
}

impl TokenEstimator {
    /// Estimator that only approximates
    pub fn approximate() -> Self {
        Self { exact: None }
    }

    /// Estimator backed by an exact tokenizer
    pub fn with_tokenizer(tokenizer: impl Tokenizer + 'static) -> Self {
        Self {
            exact: Some(Box::new(tokenizer)),
        }
    }

    pub fn is_exact(&self) -> bool {
        self.exact.is_some()
    }

    pub(crate) fn tokenizer(&self) -> Option<&dyn Tokenizer> {
        self.exact.as_deref()
    }

    /// Estimated token count of `text`
    pub fn estimate_tokens(&self, text: &str) -> usize {
        match &self.exact {
            Some(tokenizer) => match tokenizer.encode(text) {
                Ok(ids) => ids.len(),
                Err(e) => {
                    warn!("Exact token count failed, using approximation: {}", e);
                    approximate_tokens(text)
                }
            },
            None => approximate_tokens(text),
        }
    }
}

impl Default for TokenEstimator {
    fn default() -> Self {
        Self::approximate()
    }
}

impl std::fmt::Debug for TokenEstimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenEstimator")
            .field("exact", &self.is_exact())
            .finish()
    }
}

// ============================================================================
// HuggingFace tokenizer
// ============================================================================

#[cfg(feature = "hf-tokenizer")]
pub use hf::HfTokenizer;

#[cfg(feature = "hf-tokenizer")]
mod hf {
    use super::{Tokenizer, TokenizerError};
    use std::path::Path;

    /// `tokenizers` crate wrapper loaded from a `tokenizer.json`
    pub struct HfTokenizer {
        inner: tokenizers::Tokenizer,
    }

    impl HfTokenizer {
        pub fn from_file(path: &Path) -> Result<Self, TokenizerError> {
            let inner = tokenizers::Tokenizer::from_file(path)
                .map_err(|e| TokenizerError(format!("load {}: {e}", path.display())))?;
            Ok(Self { inner })
        }
    }

    impl Tokenizer for HfTokenizer {
        fn encode(&self, text: &str) -> Result<Vec<u32>, TokenizerError> {
            self.inner
                .encode(text, false)
                .map(|encoding| encoding.get_ids().to_vec())
                .map_err(|e| TokenizerError(e.to_string()))
        }

        fn decode(&self, ids: &[u32]) -> Result<String, TokenizerError> {
            self.inner
                .decode(ids, false)
                .map_err(|e| TokenizerError(e.to_string()))
        }
    }
}

/// Build an estimator from an optional `tokenizer.json` path
///
/// Never fails: a missing feature, missing path or load error is logged
/// and the approximate estimator is returned.
pub fn load_tokenizer(path: Option<&Path>) -> TokenEstimator {
    match path {
        Some(path) => load_exact(path),
        None => TokenEstimator::approximate(),
    }
}

#[cfg(feature = "hf-tokenizer")]
fn load_exact(path: &Path) -> TokenEstimator {
    match HfTokenizer::from_file(path) {
        Ok(tokenizer) => {
            tracing::info!(path = %path.display(), "Loaded tokenizer");
            TokenEstimator::with_tokenizer(tokenizer)
        }
        Err(e) => {
            warn!("{}; falling back to approximate token counts", e);
            TokenEstimator::approximate()
        }
    }
}

#[cfg(not(feature = "hf-tokenizer"))]
fn load_exact(path: &Path) -> TokenEstimator {
    warn!(
        path = %path.display(),
        "Built without the hf-tokenizer feature; using approximate token counts"
    );
    TokenEstimator::approximate()
}
