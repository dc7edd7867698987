//! Model health check
//!
//! One tiny completion through the `LlmClient` seam; the reply content is
//! ignored, only success or failure matters.

use crate::create_llm_client;
use serde::Serialize;
use tct_core::{CompletionRequest, LlmClient, LlmConfig, Operation};
use tracing::{info, warn};

/// Output budget for the liveness call
pub const HEALTH_CHECK_MAX_TOKENS: u32 = 5;

/// Overall model availability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    /// The model answered
    Healthy,
    /// The call failed
    Unhealthy,
    /// No call was attempted, e.g. credentials are missing
    Unavailable,
}

/// Health check report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthStatus {
    pub status: HealthState,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthStatus {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            status: HealthState::Unavailable,
            model: None,
            error: Some(reason.into()),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == HealthState::Healthy
    }
}

/// Send a single "Hello" completion and report whether it succeeded
///
/// Makes exactly one attempt; no retry policy is applied.
pub async fn health_check(llm: &dyn LlmClient) -> HealthStatus {
    let mut request = CompletionRequest::new(Operation::HealthCheck, "", "Hello")
        .with_max_tokens(HEALTH_CHECK_MAX_TOKENS);
    request.json_mode = false;

    let model = llm.model_name().to_string();
    match llm.complete(&request).await {
        Ok(_) => {
            info!(model = %model, "Model is healthy");
            HealthStatus {
                status: HealthState::Healthy,
                model: Some(model),
                error: None,
            }
        }
        Err(e) => {
            warn!(model = %model, error = %e, "Model health check failed");
            HealthStatus {
                status: HealthState::Unhealthy,
                model: Some(model),
                error: Some(e.to_string()),
            }
        }
    }
}

/// Check the provider described by `config`
///
/// Providers that need an API key report `Unavailable` without one.
pub async fn check_provider(config: &LlmConfig) -> HealthStatus {
    if config.requires_api_key() && !config.has_api_key() {
        return HealthStatus::unavailable("API key not configured");
    }
    match create_llm_client(config) {
        Ok(llm) => health_check(llm.as_ref()).await,
        Err(e) => HealthStatus::unavailable(e.to_string()),
    }
}
