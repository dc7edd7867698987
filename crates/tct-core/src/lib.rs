//! TCT Core - Domain models, traits, and shared types
//!
//! This crate defines the core abstractions used throughout the TCT
//! (Tax-Code Translator) system:
//! - Tax entity models (rates, brackets, thresholds, deadlines, rules)
//! - The `EntitySet` aggregate produced by extraction and merging
//! - Common error types
//! - The `LlmClient` seam used for every model call
//! - Configuration management and the jurisdiction table
//! - Rendered output models

pub mod config;
pub mod jurisdiction;
pub mod output;

pub use config::{AppConfig, ConfigError, ExtractionConfig, LlmConfig, LlmProvider, LoggingConfig};
pub use jurisdiction::Jurisdictions;
pub use output::{
    GeneratedCode, JsonConfig, OutputFormat, PolicyDefinition, ProcessingResult, SqlMigration,
};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for TCT operations
#[derive(Error, Debug)]
pub enum TctError {
    /// Network or API failure while calling the model. Retryable.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The model replied with text that could not be recovered as a JSON object
    #[error("Malformed model response: {0}")]
    MalformedResponse(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TctError {
    /// Whether the failed operation may succeed if attempted again
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

pub type Result<T> = std::result::Result<T, TctError>;

// ============================================================================
// Tax Entity Models
// ============================================================================

/// Closed set of tax categories
///
/// Unknown labels never fail: entity parsing maps them to `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaxType {
    Vat,
    Income,
    Corporate,
    Sales,
    Withholding,
    Customs,
    Excise,
    Property,
    Payroll,
    Other,
}

impl TaxType {
    /// All members in declaration order
    pub const ALL: [TaxType; 10] = [
        Self::Vat,
        Self::Income,
        Self::Corporate,
        Self::Sales,
        Self::Withholding,
        Self::Customs,
        Self::Excise,
        Self::Property,
        Self::Payroll,
        Self::Other,
    ];

    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vat => "VAT",
            Self::Income => "INCOME",
            Self::Corporate => "CORPORATE",
            Self::Sales => "SALES",
            Self::Withholding => "WITHHOLDING",
            Self::Customs => "CUSTOMS",
            Self::Excise => "EXCISE",
            Self::Property => "PROPERTY",
            Self::Payroll => "PAYROLL",
            Self::Other => "OTHER",
        }
    }

    /// Strict lookup; surrounding whitespace and case are ignored
    pub fn parse(s: &str) -> Option<Self> {
        let normalized = s.trim().to_uppercase();
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == normalized)
    }
}

impl std::fmt::Display for TaxType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A named tax rate, expressed as a decimal fraction (0.19 for 19%)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxRate {
    /// Rate name, e.g. "standard" or "reduced". Dedup key.
    pub name: String,

    pub rate: f64,

    pub description: Option<String>,

    /// Conditions under which the rate applies
    #[serde(default)]
    pub conditions: Vec<String>,

    #[serde(default)]
    pub exemptions: Vec<String>,
}

impl TaxRate {
    /// Create a rate with no description, conditions or exemptions
    pub fn new(name: impl Into<String>, rate: f64) -> Self {
        Self {
            name: name.into(),
            rate,
            description: None,
            conditions: Vec::new(),
            exemptions: Vec::new(),
        }
    }
}

/// One step of a progressive schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxBracket {
    pub min_amount: f64,

    /// Upper bound; `None` means unbounded
    pub max_amount: Option<f64>,

    pub rate: f64,

    /// Fixed amount added on top of the proportional part
    pub fixed_amount: Option<f64>,
}

impl TaxBracket {
    /// Create a bracket without a fixed amount
    pub fn new(min_amount: f64, max_amount: Option<f64>, rate: f64) -> Self {
        Self {
            min_amount,
            max_amount,
            rate,
            fixed_amount: None,
        }
    }
}

/// Registration, exemption or filing threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxThreshold {
    /// Dedup key
    pub name: String,

    pub amount: f64,

    pub currency: String,

    pub description: Option<String>,

    pub effective_date: Option<NaiveDate>,
}

impl TaxThreshold {
    /// Create a threshold in the default currency (USD)
    pub fn new(name: impl Into<String>, amount: f64) -> Self {
        Self {
            name: name.into(),
            amount,
            currency: DEFAULT_CURRENCY.to_string(),
            description: None,
            effective_date: None,
        }
    }
}

/// Currency assumed when a threshold does not state one
pub const DEFAULT_CURRENCY: &str = "USD";

/// Filing, payment or reporting deadline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxDeadline {
    /// Dedup key
    pub name: String,

    /// filing, payment, reporting (free text)
    pub deadline_type: String,

    /// monthly, quarterly, annually (free text)
    pub frequency: String,

    /// Day of the month/quarter the deadline falls on
    pub day_of_period: Option<i64>,

    pub description: Option<String>,
}

impl TaxDeadline {
    /// Create a deadline
    pub fn new(
        name: impl Into<String>,
        deadline_type: impl Into<String>,
        frequency: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            deadline_type: deadline_type.into(),
            frequency: frequency.into(),
            day_of_period: None,
            description: None,
        }
    }
}

/// A specific tax rule, condition or special case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxRule {
    /// Unique identifier. Dedup key.
    pub id: String,

    pub name: String,

    pub description: String,

    pub tax_type: TaxType,

    #[serde(default)]
    pub conditions: Vec<String>,

    pub rate: Option<f64>,

    pub effective_date: Option<NaiveDate>,

    pub expiry_date: Option<NaiveDate>,

    /// Section or article of the source document
    pub source_reference: Option<String>,
}

impl TaxRule {
    /// Create a rule with the given id, name and description
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        tax_type: TaxType,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            tax_type,
            conditions: Vec::new(),
            rate: None,
            effective_date: None,
            expiry_date: None,
            source_reference: None,
        }
    }

    /// Set rate
    pub fn with_rate(mut self, rate: f64) -> Self {
        self.rate = Some(rate);
        self
    }
}

// ============================================================================
// Entity Set
// ============================================================================

/// Extras key holding the model's document summary
pub const EXTRA_SUMMARY: &str = "summary";

/// Extras key holding the model's self-reported confidence
pub const EXTRA_CONFIDENCE: &str = "confidence_score";

/// Extras key holding warnings reported by the model
pub const EXTRA_WARNINGS: &str = "warnings";

/// Extras key holding per-record diagnostics from response parsing
pub const EXTRA_PARSE_WARNINGS: &str = "parse_warnings";

/// All tax entities recognized in one document or chunk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntitySet {
    /// Tax categories mentioned, each at most once, in first-seen order
    #[serde(default)]
    pub tax_types: Vec<TaxType>,

    #[serde(default)]
    pub rates: Vec<TaxRate>,

    #[serde(default)]
    pub brackets: Vec<TaxBracket>,

    #[serde(default)]
    pub thresholds: Vec<TaxThreshold>,

    #[serde(default)]
    pub deadlines: Vec<TaxDeadline>,

    #[serde(default)]
    pub rules: Vec<TaxRule>,

    /// Auxiliary values (summary, confidence, warning lists)
    #[serde(default)]
    pub extras: HashMap<String, serde_json::Value>,
}

impl EntitySet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether no entity of any category is present (extras are ignored)
    pub fn is_empty(&self) -> bool {
        self.entity_count() == 0
    }

    /// Total number of entities across all categories
    pub fn entity_count(&self) -> usize {
        self.tax_types.len()
            + self.rates.len()
            + self.brackets.len()
            + self.thresholds.len()
            + self.deadlines.len()
            + self.rules.len()
    }

    /// The model's summary, if one was reported and is non-empty
    pub fn summary(&self) -> Option<&str> {
        self.extras
            .get(EXTRA_SUMMARY)
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
    }

    /// The model's confidence score, if reported as a number
    pub fn confidence_score(&self) -> Option<f64> {
        self.extras.get(EXTRA_CONFIDENCE).and_then(|v| v.as_f64())
    }

    /// String elements of a list-valued extra; non-strings are skipped
    pub fn extra_strings(&self, key: &str) -> Vec<String> {
        self.extras
            .get(key)
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Set an extra value
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.extras.insert(key.into(), value.into());
        self
    }
}

// ============================================================================
// Model Client Seam
// ============================================================================

/// The purpose of a model call
///
/// Carried with every request so transports and test doubles can dispatch
/// on it without inspecting prompt text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    EntityExtraction,
    JsonConfig,
    SqlMigration,
    PolicyDefinition,
    CodeGeneration,
    /// Minimal liveness call made by `tct check`
    HealthCheck,
}

impl Operation {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EntityExtraction => "entity_extraction",
            Self::JsonConfig => "json_config",
            Self::SqlMigration => "sql_migration",
            Self::PolicyDefinition => "policy_definition",
            Self::CodeGeneration => "code_generation",
            Self::HealthCheck => "health_check",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single system + user prompt exchange with the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub operation: Operation,

    pub system_prompt: String,

    pub user_prompt: String,

    /// Sampling temperature (lower = more deterministic)
    pub temperature: f32,

    /// Maximum tokens in the reply
    pub max_tokens: u32,

    /// Ask the provider for a JSON-only reply when it supports it
    pub json_mode: bool,
}

impl CompletionRequest {
    /// Create a JSON-mode request with default sampling settings
    pub fn new(
        operation: Operation,
        system_prompt: impl Into<String>,
        user_prompt: impl Into<String>,
    ) -> Self {
        Self {
            operation,
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
            temperature: 0.1,
            max_tokens: 4096,
            json_mode: true,
        }
    }

    /// Set temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set max output tokens
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Trait for LLM clients
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    /// Send one request and return the raw reply text
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;

    /// Model identifier for logging
    fn model_name(&self) -> &str;
}

#[async_trait::async_trait]
impl<T: LlmClient + ?Sized> LlmClient for Arc<T> {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        (**self).complete(request).await
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

#[async_trait::async_trait]
impl<T: LlmClient + ?Sized> LlmClient for Box<T> {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        (**self).complete(request).await
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tax_type_parse() {
        assert_eq!(TaxType::parse("vat "), Some(TaxType::Vat));
        assert_eq!(TaxType::parse("Income"), Some(TaxType::Income));
        assert_eq!(TaxType::parse(""), None);
        assert_eq!(TaxType::parse("payroll"), Some(TaxType::Payroll));
        assert_eq!(TaxType::parse("FOO"), None);
    }

    #[test]
    fn test_tax_type_serde_uses_upper_case() {
        let json = serde_json::to_string(&TaxType::Withholding).unwrap();
        assert_eq!(json, "\"WITHHOLDING\"");

        let parsed: TaxType = serde_json::from_str("\"VAT\"").unwrap();
        assert_eq!(parsed, TaxType::Vat);
    }

    #[test]
    fn test_entity_set_extras_accessors() {
        let set = EntitySet::new()
            .with_extra(EXTRA_SUMMARY, "VAT provisions")
            .with_extra(EXTRA_CONFIDENCE, 0.85)
            .with_extra(EXTRA_WARNINGS, serde_json::json!(["a", 3, "b"]));

        assert_eq!(set.summary(), Some("VAT provisions"));
        assert_eq!(set.confidence_score(), Some(0.85));
        assert_eq!(set.extra_strings(EXTRA_WARNINGS), vec!["a", "b"]);
        assert!(set.extra_strings(EXTRA_PARSE_WARNINGS).is_empty());
        assert!(set.is_empty());
    }

    #[test]
    fn test_blank_summary_is_absent() {
        let set = EntitySet::new().with_extra(EXTRA_SUMMARY, "  ");
        assert_eq!(set.summary(), None);
    }

    #[test]
    fn test_entity_set_dates_serialize_as_iso() {
        let mut threshold = TaxThreshold::new("registration", 10_000.0);
        threshold.effective_date = NaiveDate::from_ymd_opt(2024, 1, 1);

        let json = serde_json::to_value(&threshold).unwrap();
        assert_eq!(json["effective_date"], "2024-01-01");
        assert_eq!(json["currency"], "USD");
    }

    #[test]
    fn test_only_transport_errors_are_retryable() {
        assert!(TctError::Transport("timeout".into()).is_retryable());
        assert!(!TctError::MalformedResponse("garbage".into()).is_retryable());
        assert!(!TctError::ConfigError("key".into()).is_retryable());
    }

    #[test]
    fn test_completion_request_builder() {
        let request = CompletionRequest::new(Operation::SqlMigration, "sys", "user")
            .with_temperature(0.0)
            .with_max_tokens(512);

        assert_eq!(request.operation, Operation::SqlMigration);
        assert_eq!(request.temperature, 0.0);
        assert_eq!(request.max_tokens, 512);
        assert!(request.json_mode);
    }
}
