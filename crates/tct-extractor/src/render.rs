//! Model-rendered outputs: JSON config, SQL migration, policy, code
//!
//! One model call per output. Fields missing from the reply are filled
//! with fixed defaults, so a sparse but well-formed reply still renders.

use crate::client::{request_json, CallSettings};
use crate::prompt::{render_prompt, RenderTarget};
use chrono::Utc;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tct_core::{
    EntitySet, GeneratedCode, JsonConfig, LlmClient, OutputFormat, PolicyDefinition, Result,
    SqlMigration, TaxType, TctError, DEFAULT_CURRENCY,
};
use tracing::info;

/// Outputs produced for one document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderedOutputs {
    pub json_config: Option<JsonConfig>,
    pub sql_migration: Option<SqlMigration>,
    pub policy_definition: Option<PolicyDefinition>,
    pub generated_code: Option<GeneratedCode>,
}

/// Renders an entity set into downstream formats
#[derive(Clone)]
pub struct OutputRenderer {
    llm: Arc<dyn LlmClient>,
    settings: CallSettings,
}

impl OutputRenderer {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            settings: CallSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: CallSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Produce every output selected by `format`, in a fixed order
    pub async fn render(
        &self,
        format: OutputFormat,
        entities: &EntitySet,
        country: &str,
        country_name: &str,
    ) -> Result<RenderedOutputs> {
        let mut outputs = RenderedOutputs::default();

        if format.includes_json() {
            outputs.json_config = Some(self.json_config(entities, country, country_name).await?);
        }
        if format.includes_sql() {
            outputs.sql_migration = Some(self.sql_migration(entities, country, country_name).await?);
        }
        if format.includes_policy() {
            outputs.policy_definition =
                Some(self.policy_definition(entities, country, country_name).await?);
        }
        if format.includes_code() {
            outputs.generated_code = Some(self.generated_code(entities, country, country_name).await?);
        }

        info!(%format, "Rendered outputs");
        Ok(outputs)
    }

    pub async fn json_config(
        &self,
        entities: &EntitySet,
        country: &str,
        country_name: &str,
    ) -> Result<JsonConfig> {
        let reply = self
            .call(RenderTarget::JsonConfig, entities, country, country_name)
            .await?;

        let metadata = match reply.get("metadata") {
            Some(Value::Object(map)) => object_to_map(map),
            _ => HashMap::from([(
                "generated_at".to_string(),
                Value::String(Utc::now().to_rfc3339()),
            )]),
        };

        Ok(JsonConfig {
            version: text(&reply, "version", "1.0"),
            country: country.to_string(),
            country_name: country_name.to_string(),
            tax_type: entities.tax_types.first().copied().unwrap_or(TaxType::Vat),
            effective_date: None,
            currency: text(&reply, "currency", DEFAULT_CURRENCY),
            rules: values(&reply, "rules"),
            metadata,
        })
    }

    pub async fn sql_migration(
        &self,
        entities: &EntitySet,
        country: &str,
        country_name: &str,
    ) -> Result<SqlMigration> {
        let reply = self
            .call(RenderTarget::SqlMigration, entities, country, country_name)
            .await?;
        let default_name = format!("migration_{}", Utc::now().format("%Y%m%d%H%M%S"));

        Ok(SqlMigration {
            migration_name: text(&reply, "migration_name", &default_name),
            up_script: text(&reply, "up_script", "-- No migration generated"),
            down_script: text(&reply, "down_script", "-- No rollback generated"),
            tables_affected: strings(&reply, "tables_affected"),
            description: text(&reply, "description", "Auto-generated migration"),
        })
    }

    pub async fn policy_definition(
        &self,
        entities: &EntitySet,
        country: &str,
        country_name: &str,
    ) -> Result<PolicyDefinition> {
        let reply = self
            .call(RenderTarget::PolicyDefinition, entities, country, country_name)
            .await?;

        Ok(PolicyDefinition {
            policy_name: text(&reply, "policy_name", "tax_policy"),
            version: text(&reply, "version", "1.0"),
            description: text(&reply, "description", "Auto-generated policy"),
            rules: values(&reply, "rules"),
            metadata: match reply.get("metadata") {
                Some(Value::Object(map)) => object_to_map(map),
                _ => HashMap::new(),
            },
        })
    }

    pub async fn generated_code(
        &self,
        entities: &EntitySet,
        country: &str,
        country_name: &str,
    ) -> Result<GeneratedCode> {
        let reply = self
            .call(RenderTarget::CodeGeneration, entities, country, country_name)
            .await?;
        let default_filename = format!("tax_calculator_{}.py", country.to_lowercase());

        Ok(GeneratedCode {
            language: "python".to_string(),
            filename: text(&reply, "filename", &default_filename),
            code: text(&reply, "code", "# No code generated"),
            description: text(&reply, "description", "Auto-generated tax calculator"),
            dependencies: strings(&reply, "dependencies"),
        })
    }

    async fn call(
        &self,
        target: RenderTarget,
        entities: &EntitySet,
        country: &str,
        country_name: &str,
    ) -> Result<Map<String, Value>> {
        let entities_json = serde_json::to_string_pretty(entities).map_err(|e| {
            TctError::Other(anyhow::Error::new(e).context("serializing entities for rendering"))
        })?;
        let prompt = render_prompt(target, &entities_json, country, country_name);
        let (reply, _raw) =
            request_json(self.llm.as_ref(), target.operation(), prompt, &self.settings).await?;
        Ok(reply)
    }
}

impl std::fmt::Debug for OutputRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputRenderer")
            .field("model", &self.llm.model_name())
            .field("settings", &self.settings)
            .finish()
    }
}

fn text(reply: &Map<String, Value>, key: &str, default: &str) -> String {
    reply
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or(default)
        .to_string()
}

fn values(reply: &Map<String, Value>, key: &str) -> Vec<Value> {
    reply
        .get(key)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

fn strings(reply: &Map<String, Value>, key: &str) -> Vec<String> {
    values(reply, key)
        .into_iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect()
}

fn object_to_map(map: &Map<String, Value>) -> HashMap<String, Value> {
    map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tct_core::Operation;
    use tct_llm::{MockClient, RetryPolicy};

    fn renderer(mock: &MockClient) -> OutputRenderer {
        OutputRenderer::new(Arc::new(mock.clone())).with_settings(CallSettings {
            retry: RetryPolicy::no_retry(),
            ..CallSettings::default()
        })
    }

    fn entities() -> EntitySet {
        EntitySet {
            tax_types: vec![TaxType::Excise],
            ..EntitySet::default()
        }
    }

    #[tokio::test]
    async fn test_render_all_calls_each_operation_once() {
        let mock = MockClient::new();
        let outputs = renderer(&mock)
            .render(OutputFormat::All, &entities(), "DE", "Germany")
            .await
            .unwrap();

        assert!(outputs.json_config.is_some());
        assert!(outputs.sql_migration.is_some());
        assert!(outputs.policy_definition.is_some());
        assert!(outputs.generated_code.is_some());

        let operations: Vec<Operation> = mock.requests().iter().map(|r| r.operation).collect();
        assert_eq!(
            operations,
            vec![
                Operation::JsonConfig,
                Operation::SqlMigration,
                Operation::PolicyDefinition,
                Operation::CodeGeneration,
            ]
        );
    }

    #[tokio::test]
    async fn test_render_single_format() {
        let mock = MockClient::new();
        let outputs = renderer(&mock)
            .render(OutputFormat::Sql, &entities(), "DE", "Germany")
            .await
            .unwrap();

        assert!(outputs.json_config.is_none());
        assert!(outputs.sql_migration.is_some());
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_sparse_replies_take_defaults() {
        let mock = MockClient::new()
            .with_response(Operation::JsonConfig, "{}")
            .with_response(Operation::SqlMigration, "{\"up_script\": 42}")
            .with_response(Operation::PolicyDefinition, "{}")
            .with_response(Operation::CodeGeneration, "{}");
        let r = renderer(&mock);
        let set = entities();

        let config = r.json_config(&set, "AT", "Austria").await.unwrap();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.currency, "USD");
        assert_eq!(config.tax_type, TaxType::Excise);
        assert!(config.metadata.contains_key("generated_at"));

        let sql = r.sql_migration(&set, "AT", "Austria").await.unwrap();
        assert!(sql.migration_name.starts_with("migration_"));
        assert_eq!(sql.up_script, "-- No migration generated");
        assert_eq!(sql.down_script, "-- No rollback generated");

        let policy = r.policy_definition(&set, "AT", "Austria").await.unwrap();
        assert_eq!(policy.policy_name, "tax_policy");
        assert!(policy.metadata.is_empty());

        let code = r.generated_code(&set, "AT", "Austria").await.unwrap();
        assert_eq!(code.filename, "tax_calculator_at.py");
        assert_eq!(code.code, "# No code generated");
        assert_eq!(code.language, "python");
    }

    #[tokio::test]
    async fn test_json_config_defaults_to_vat() {
        let mock = MockClient::new().with_response(Operation::JsonConfig, "{}");
        let config = renderer(&mock)
            .json_config(&EntitySet::default(), "DE", "Germany")
            .await
            .unwrap();
        assert_eq!(config.tax_type, TaxType::Vat);
    }

    #[tokio::test]
    async fn test_entities_embedded_in_prompt() {
        let mock = MockClient::new();
        renderer(&mock)
            .generated_code(&entities(), "FR", "France")
            .await
            .unwrap();

        let prompt = &mock.requests()[0].user_prompt;
        assert!(prompt.contains("\"EXCISE\""));
        assert!(prompt.contains("tax_calculator_fr.py"));
    }

    #[tokio::test]
    async fn test_malformed_render_reply_is_fatal() {
        let mock = MockClient::new().with_response(Operation::PolicyDefinition, "no policy today");
        let result = renderer(&mock)
            .render(OutputFormat::Yaml, &entities(), "DE", "Germany")
            .await;
        assert!(matches!(result, Err(TctError::MalformedResponse(_))));
    }
}
