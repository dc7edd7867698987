//! Rendered output models and the final processing result

use crate::{EntitySet, TaxType, TctError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Requested set of rendered outputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Json,
    /// Policy definition
    Yaml,
    Sql,
    Code,
    #[default]
    All,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Yaml => "yaml",
            Self::Sql => "sql",
            Self::Code => "code",
            Self::All => "all",
        }
    }

    pub fn includes_json(&self) -> bool {
        matches!(self, Self::Json | Self::All)
    }

    pub fn includes_sql(&self) -> bool {
        matches!(self, Self::Sql | Self::All)
    }

    pub fn includes_policy(&self) -> bool {
        matches!(self, Self::Yaml | Self::All)
    }

    pub fn includes_code(&self) -> bool {
        matches!(self, Self::Code | Self::All)
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = TctError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "yaml" => Ok(Self::Yaml),
            "sql" => Ok(Self::Sql),
            "code" => Ok(Self::Code),
            "all" => Ok(Self::All),
            other => Err(TctError::InvalidInput(format!(
                "unknown output format '{}'",
                other
            ))),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Tax configuration for a rules engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonConfig {
    pub version: String,
    pub country: String,
    pub country_name: String,
    pub tax_type: TaxType,
    pub effective_date: Option<NaiveDate>,
    pub currency: String,
    pub rules: Vec<serde_json::Value>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Database migration with apply and rollback scripts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlMigration {
    pub migration_name: String,
    pub up_script: String,
    pub down_script: String,
    #[serde(default)]
    pub tables_affected: Vec<String>,
    pub description: String,
}

/// Rules-engine policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyDefinition {
    pub policy_name: String,
    pub version: String,
    pub description: String,
    pub rules: Vec<serde_json::Value>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Generated calculator source code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedCode {
    pub language: String,
    pub filename: String,
    pub code: String,
    pub description: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

/// Summary used when the model reported none
pub const DEFAULT_SUMMARY: &str = "Document processed successfully";

/// Confidence used when the model reported none
pub const DEFAULT_CONFIDENCE: f64 = 0.8;

/// Complete result of processing one document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub success: bool,
    pub document_id: String,
    /// Upper-case ISO code
    pub country: String,
    pub country_name: String,
    pub language_detected: String,
    pub processing_time_ms: u64,

    pub summary: String,
    pub entities: EntitySet,

    pub json_config: Option<JsonConfig>,
    pub sql_migration: Option<SqlMigration>,
    pub policy_definition: Option<PolicyDefinition>,
    pub generated_code: Option<GeneratedCode>,

    pub confidence_score: f64,
    /// Validator warnings, then model warnings, then parse diagnostics
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub source_sections: Vec<String>,
}

impl ProcessingResult {
    /// Start a successful result for a merged entity set
    ///
    /// Summary and confidence come from the set's extras with fallbacks;
    /// `warnings` combines `validator_warnings` with the set's reported and
    /// parse warnings.
    pub fn new(
        country: &str,
        country_name: impl Into<String>,
        language: impl Into<String>,
        entities: EntitySet,
        validator_warnings: Vec<String>,
    ) -> Self {
        let summary = entities
            .summary()
            .map(str::to_string)
            .unwrap_or_else(|| DEFAULT_SUMMARY.to_string());
        let confidence_score = entities.confidence_score().unwrap_or(DEFAULT_CONFIDENCE);

        let mut warnings = validator_warnings;
        warnings.extend(entities.extra_strings(crate::EXTRA_WARNINGS));
        warnings.extend(entities.extra_strings(crate::EXTRA_PARSE_WARNINGS));

        Self {
            success: true,
            document_id: uuid::Uuid::new_v4().to_string(),
            country: country.trim().to_uppercase(),
            country_name: country_name.into(),
            language_detected: language.into(),
            processing_time_ms: 0,
            summary,
            entities,
            json_config: None,
            sql_migration: None,
            policy_definition: None,
            generated_code: None,
            confidence_score,
            warnings,
            source_sections: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EXTRA_CONFIDENCE, EXTRA_PARSE_WARNINGS, EXTRA_SUMMARY, EXTRA_WARNINGS};

    #[test]
    fn test_output_format_parse() {
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("yaml".parse::<OutputFormat>().unwrap(), OutputFormat::Yaml);
        assert!(matches!(
            "xml".parse::<OutputFormat>(),
            Err(TctError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_output_format_selection() {
        assert!(OutputFormat::All.includes_json());
        assert!(OutputFormat::All.includes_code());
        assert!(OutputFormat::Yaml.includes_policy());
        assert!(!OutputFormat::Yaml.includes_sql());
        assert!(!OutputFormat::Json.includes_policy());
    }

    #[test]
    fn test_processing_result_fallbacks() {
        let result = ProcessingResult::new("de", "Germany", "de", EntitySet::new(), vec![]);

        assert!(result.success);
        assert_eq!(result.country, "DE");
        assert_eq!(result.summary, DEFAULT_SUMMARY);
        assert_eq!(result.confidence_score, DEFAULT_CONFIDENCE);
        assert!(uuid::Uuid::parse_str(&result.document_id).is_ok());
    }

    #[test]
    fn test_processing_result_warning_order() {
        let entities = EntitySet::new()
            .with_extra(EXTRA_SUMMARY, "VAT law")
            .with_extra(EXTRA_CONFIDENCE, 0.9)
            .with_extra(EXTRA_WARNINGS, serde_json::json!(["model"]))
            .with_extra(EXTRA_PARSE_WARNINGS, serde_json::json!(["parse"]));

        let result = ProcessingResult::new(
            "BR",
            "Brazil",
            "pt",
            entities,
            vec!["validator".to_string()],
        );

        assert_eq!(result.summary, "VAT law");
        assert_eq!(result.confidence_score, 0.9);
        assert_eq!(result.warnings, vec!["validator", "model", "parse"]);
    }
}
