//! TCT LLM - Model transports for the extraction pipeline
//!
//! Provides:
//! - OpenAI-compatible and Ollama chat clients
//! - A deterministic mock client dispatched on `Operation`
//! - Bounded retry with exponential backoff
//! - A one-call model health check
//!
//! Author: hephaex@gmail.com

pub mod health;
pub mod llm;
pub mod mock;
pub mod retry;

pub use health::{check_provider, health_check, HealthState, HealthStatus};
pub use llm::{OllamaClient, OpenAiClient};
pub use mock::{canned_response, MockClient};
pub use retry::{complete_with_retry, RetryPolicy};

use std::sync::Arc;
use tct_core::{LlmClient, LlmConfig, LlmProvider, Result};

// ============================================================================
// Factory function
// ============================================================================

/// Create an LLM client from config
///
/// Transports make a single attempt per call; callers apply a
/// `RetryPolicy` around them.
pub fn create_llm_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>> {
    match config.provider {
        LlmProvider::OpenAI | LlmProvider::Azure => {
            Ok(Arc::new(OpenAiClient::from_config(config)?))
        }
        LlmProvider::Ollama => Ok(Arc::new(OllamaClient::from_config(config)?)),
        LlmProvider::Mock => Ok(Arc::new(MockClient::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_selects_provider() {
        let mut config = LlmConfig::default();
        config.provider = LlmProvider::Mock;
        assert_eq!(create_llm_client(&config).unwrap().model_name(), "mock-model");

        config.provider = LlmProvider::Ollama;
        config.model = "llama3".to_string();
        assert_eq!(create_llm_client(&config).unwrap().model_name(), "llama3");
    }

    #[test]
    fn test_factory_openai_without_key_fails() {
        let config = LlmConfig::default();
        assert!(create_llm_client(&config).is_err());
    }
}
