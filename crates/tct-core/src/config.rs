//! TCT Configuration Management
//!
//! Handles configuration from environment variables, config files,
//! and command-line arguments with sensible defaults for development.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// LLM provider configuration
    pub llm: LlmConfig,

    /// Chunking and extraction configuration
    pub extraction: ExtractionConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Extra or overriding country names, keyed by ISO code
    pub jurisdictions: HashMap<String, String>,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        // LLM
        if let Ok(provider) = std::env::var("LLM_PROVIDER") {
            config.llm.provider = provider.parse()?;
        }
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            if !key.trim().is_empty() {
                config.llm.openai_api_key = Some(key);
            }
        }
        if let Ok(url) = std::env::var("OPENAI_BASE_URL") {
            config.llm.openai_base_url = Some(url);
        }
        if let Ok(url) = std::env::var("OLLAMA_URL") {
            config.llm.ollama_url = url;
        }
        if let Ok(model) = std::env::var("LLM_MODEL").or_else(|_| std::env::var("OPENAI_MODEL")) {
            config.llm.model = model;
        }
        if let Ok(secs) = std::env::var("LLM_TIMEOUT_SECS") {
            config.llm.timeout_secs = parse_env("LLM_TIMEOUT_SECS", secs)?;
        }
        if let Ok(retries) = std::env::var("LLM_MAX_RETRIES") {
            config.llm.max_retries = parse_env("LLM_MAX_RETRIES", retries)?;
        }

        // Extraction
        if let Ok(tokens) = std::env::var("MAX_CHUNK_TOKENS") {
            config.extraction.max_chunk_tokens = parse_env("MAX_CHUNK_TOKENS", tokens)?;
        }
        if let Ok(path) = std::env::var("TOKENIZER_PATH") {
            config.extraction.tokenizer_path = Some(PathBuf::from(path));
        }
        if let Ok(size) = std::env::var("MAX_FILE_SIZE_MB") {
            config.extraction.max_file_size_mb = parse_env("MAX_FILE_SIZE_MB", size)?;
        }

        // Logging
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Ok(json) = std::env::var("LOG_JSON") {
            config.logging.json_format = matches!(json.to_lowercase().as_str(), "1" | "true" | "yes");
        }

        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        let env_config = Self::from_env()?;
        let llm_defaults = LlmConfig::default();
        let extraction_defaults = ExtractionConfig::default();

        // Only override if env values differ from defaults
        if env_config.llm.provider != llm_defaults.provider {
            self.llm.provider = env_config.llm.provider;
        }
        if env_config.llm.model != llm_defaults.model {
            self.llm.model = env_config.llm.model;
        }
        if env_config.llm.ollama_url != llm_defaults.ollama_url {
            self.llm.ollama_url = env_config.llm.ollama_url;
        }
        if env_config.llm.openai_base_url.is_some() {
            self.llm.openai_base_url = env_config.llm.openai_base_url;
        }
        if env_config.llm.timeout_secs != llm_defaults.timeout_secs {
            self.llm.timeout_secs = env_config.llm.timeout_secs;
        }
        if env_config.llm.max_retries != llm_defaults.max_retries {
            self.llm.max_retries = env_config.llm.max_retries;
        }
        if env_config.extraction.max_chunk_tokens != extraction_defaults.max_chunk_tokens {
            self.extraction.max_chunk_tokens = env_config.extraction.max_chunk_tokens;
        }
        if env_config.extraction.tokenizer_path.is_some() {
            self.extraction.tokenizer_path = env_config.extraction.tokenizer_path;
        }
        if env_config.extraction.max_file_size_mb != extraction_defaults.max_file_size_mb {
            self.extraction.max_file_size_mb = env_config.extraction.max_file_size_mb;
        }
        if env_config.logging.level != LoggingConfig::default().level {
            self.logging.level = env_config.logging.level;
        }
        if env_config.logging.json_format {
            self.logging.json_format = true;
        }

        // Always use env for sensitive values
        if env_config.llm.openai_api_key.is_some() {
            self.llm.openai_api_key = env_config.llm.openai_api_key;
        }

        Ok(self)
    }

    /// Copy with secrets replaced, for display
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.llm.openai_api_key.is_some() {
            config.llm.openai_api_key = Some("***".to_string());
        }
        config
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value,
    })
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// LLM provider to use
    pub provider: LlmProvider,

    /// OpenAI API key
    pub openai_api_key: Option<String>,

    /// OpenAI API base URL (for Azure or compatible APIs)
    pub openai_base_url: Option<String>,

    /// Ollama server URL
    pub ollama_url: String,

    /// Model name to use
    pub model: String,

    /// Maximum tokens for completion
    pub max_tokens: u32,

    /// Temperature for generation
    pub temperature: f32,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Total attempts per model call, including the first
    pub max_retries: u32,

    /// Delay before the second attempt; doubles afterwards
    pub retry_initial_secs: u64,

    /// Upper bound for the delay between attempts
    pub retry_max_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::OpenAI,
            openai_api_key: None,
            openai_base_url: None,
            ollama_url: "http://localhost:11434".to_string(),
            model: "gpt-4-turbo-preview".to_string(),
            max_tokens: 4096,
            temperature: 0.1,
            timeout_secs: 60,
            max_retries: 3,
            retry_initial_secs: 4,
            retry_max_secs: 10,
        }
    }
}

impl LlmConfig {
    /// Whether the provider cannot work without `openai_api_key`
    pub fn requires_api_key(&self) -> bool {
        matches!(self.provider, LlmProvider::OpenAI | LlmProvider::Azure)
    }

    /// Whether a usable API key is configured
    pub fn has_api_key(&self) -> bool {
        self.openai_api_key
            .as_deref()
            .map(|k| !k.trim().is_empty())
            .unwrap_or(false)
    }
}

/// Supported LLM providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    OpenAI,
    Ollama,
    Azure,
    /// Canned offline responses
    Mock,
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            "azure" => Ok(Self::Azure),
            "mock" => Ok(Self::Mock),
            _ => Err(ConfigError::InvalidValue {
                key: "LLM_PROVIDER".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Chunking and extraction configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Documents estimated above this many tokens are chunked
    pub chunk_threshold_tokens: usize,

    /// Token budget per chunk
    pub max_chunk_tokens: usize,

    /// HuggingFace `tokenizer.json` for exact token counts
    pub tokenizer_path: Option<PathBuf>,

    /// Largest accepted input file
    pub max_file_size_mb: u64,

    /// Language assumed when none is given
    pub default_language: String,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            chunk_threshold_tokens: 6000,
            max_chunk_tokens: 6000,
            tokenizer_path: None,
            max_file_size_mb: 10,
            default_language: "en".to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,

    /// Include file/line in logs
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            include_location: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

impl From<ConfigError> for crate::TctError {
    fn from(err: ConfigError) -> Self {
        crate::TctError::ConfigError(err.to_string())
    }
}
