//! LLM Client implementations
//!
//! Provides chat-completion transports for OpenAI-compatible APIs and
//! Ollama. Both send a system and a user message and return the raw
//! reply text; parsing is left to callers.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tct_core::{CompletionRequest, LlmClient, LlmConfig, Result, TctError};
use tracing::debug;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

fn build_http_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| TctError::ConfigError(format!("Failed to build HTTP client: {e}")))
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct Message {
    role: String,
    content: String,
}

fn chat_messages(request: &CompletionRequest) -> Vec<Message> {
    let mut messages = Vec::with_capacity(2);
    if !request.system_prompt.is_empty() {
        messages.push(Message {
            role: "system".to_string(),
            content: request.system_prompt.clone(),
        });
    }
    messages.push(Message {
        role: "user".to_string(),
        content: request.user_prompt.clone(),
    });
    messages
}

// ============================================================================
// OpenAI Client
// ============================================================================

/// OpenAI API client
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct Choice {
    message: Message,
    finish_reason: Option<String>,
}

impl OpenAiClient {
    /// Create a new OpenAI client
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: OPENAI_BASE_URL.to_string(),
            model: model.into(),
        }
    }

    /// Create from config
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .openai_api_key
            .as_ref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| TctError::ConfigError("OpenAI API key required".to_string()))?;

        let base_url = config
            .openai_base_url
            .clone()
            .unwrap_or_else(|| OPENAI_BASE_URL.to_string());

        Ok(Self {
            client: build_http_client(config.timeout_secs)?,
            api_key: api_key.clone(),
            base_url,
            model: config.model.clone(),
        })
    }

    /// JSON response format is only requested from models known to accept it
    fn supports_json_format(&self) -> bool {
        self.model.starts_with("gpt-") || self.model.starts_with("azure/")
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let body = OpenAiRequest {
            model: self.model.clone(),
            messages: chat_messages(request),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            response_format: (request.json_mode && self.supports_json_format())
                .then_some(ResponseFormat { kind: "json_object" }),
        };

        debug!(
            operation = %request.operation,
            model = %self.model,
            prompt_chars = request.user_prompt.len(),
            "Sending OpenAI chat completion"
        );

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| TctError::Transport(format!("Request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(TctError::Transport(format!(
                "OpenAI error ({status}): {error_text}"
            )));
        }

        let result: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| TctError::Transport(format!("Failed to parse response: {e}")))?;

        result
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| TctError::MalformedResponse("No response generated".to_string()))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Ollama Client
// ============================================================================

/// Ollama API client
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<Message>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct OllamaResponse {
    message: Message,
    done: bool,
}

impl OllamaClient {
    /// Create a new Ollama client
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            model: model.into(),
        }
    }

    /// Create from config
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            client: build_http_client(config.timeout_secs)?,
            base_url: config.ollama_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let body = OllamaRequest {
            model: self.model.clone(),
            messages: chat_messages(request),
            stream: false,
            format: request.json_mode.then_some("json"),
            options: OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        };

        debug!(
            operation = %request.operation,
            model = %self.model,
            prompt_chars = request.user_prompt.len(),
            "Sending Ollama chat request"
        );

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| TctError::Transport(format!("Ollama request failed: {e}")))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(TctError::Transport(format!("Ollama error: {error_text}")));
        }

        let result: OllamaResponse = response
            .json()
            .await
            .map_err(|e| TctError::Transport(format!("Failed to parse Ollama response: {e}")))?;

        Ok(result.message.content)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Tests
// ============================================================================
