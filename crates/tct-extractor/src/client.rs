//! Model-backed entity extraction for one slice of text

use crate::json::extract_json_object;
use crate::parser::parse_entities;
use crate::prompt::{extraction_prompt, PromptPair};
use serde_json::{Map, Value};
use std::sync::Arc;
use tct_core::{
    CompletionRequest, EntitySet, Jurisdictions, LlmClient, LlmConfig, Operation, Result,
};
use tct_llm::{complete_with_retry, RetryPolicy};

/// Sampling settings and retry policy shared by every model call
#[derive(Debug, Clone)]
pub struct CallSettings {
    pub temperature: f32,
    pub max_tokens: u32,
    pub retry: RetryPolicy,
}

impl Default for CallSettings {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            max_tokens: 4096,
            retry: RetryPolicy::default(),
        }
    }
}

impl CallSettings {
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            retry: RetryPolicy::from_config(config),
        }
    }
}

/// Send one JSON-mode request and recover the object from the reply
///
/// Transport failures are retried per `settings.retry`; a reply with no
/// recoverable object is a `MalformedResponse` and is not retried.
pub(crate) async fn request_json(
    llm: &dyn LlmClient,
    operation: Operation,
    prompt: PromptPair,
    settings: &CallSettings,
) -> Result<(Map<String, Value>, String)> {
    let request = CompletionRequest::new(operation, prompt.system, prompt.user)
        .with_temperature(settings.temperature)
        .with_max_tokens(settings.max_tokens);
    tracing::debug!(
        %operation,
        model = llm.model_name(),
        prompt_chars = request.user_prompt.len(),
        "Calling model"
    );

    let raw = complete_with_retry(llm, &request, &settings.retry).await?;
    tracing::debug!(%operation, reply_chars = raw.len(), "Model replied");

    let object = extract_json_object(&raw)?;
    Ok((object, raw))
}

/// Extracts tax entities from a single document slice
#[derive(Clone)]
pub struct ExtractionClient {
    llm: Arc<dyn LlmClient>,
    jurisdictions: Arc<Jurisdictions>,
    settings: CallSettings,
}

impl ExtractionClient {
    /// Create a client with default sampling and retry settings
    pub fn new(llm: Arc<dyn LlmClient>, jurisdictions: Arc<Jurisdictions>) -> Self {
        Self {
            llm,
            jurisdictions,
            settings: CallSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: CallSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &CallSettings {
        &self.settings
    }

    pub fn jurisdictions(&self) -> &Jurisdictions {
        &self.jurisdictions
    }

    pub fn llm(&self) -> &Arc<dyn LlmClient> {
        &self.llm
    }

    /// Extract entities from `text`
    ///
    /// Returns the parsed set and the recovered JSON object as received.
    pub async fn extract_one(
        &self,
        text: &str,
        country: &str,
        language: &str,
        context: Option<&str>,
    ) -> Result<(EntitySet, Value)> {
        let country = country.trim().to_uppercase();
        let country_name = self.jurisdictions.name_for(&country);
        let prompt = extraction_prompt(text, &country, &country_name, language, context);

        let (object, _raw) = request_json(
            self.llm.as_ref(),
            Operation::EntityExtraction,
            prompt,
            &self.settings,
        )
        .await?;

        let entities = parse_entities(&object);
        Ok((entities, Value::Object(object)))
    }
}

impl std::fmt::Debug for ExtractionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractionClient")
            .field("model", &self.llm.model_name())
            .field("jurisdictions", &self.jurisdictions.len())
            .field("settings", &self.settings)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tct_core::TctError;
    use tct_llm::MockClient;

    fn client(mock: &MockClient) -> ExtractionClient {
        ExtractionClient::new(Arc::new(mock.clone()), Arc::new(Jurisdictions::builtin()))
            .with_settings(CallSettings {
                retry: RetryPolicy::new(3, std::time::Duration::ZERO, std::time::Duration::ZERO),
                ..CallSettings::default()
            })
    }

    #[tokio::test]
    async fn test_extract_canned_reply() {
        let mock = MockClient::new();
        let (entities, raw) = client(&mock)
            .extract_one("Umsatzsteuer 19%", "de", "de", None)
            .await
            .unwrap();

        assert_eq!(entities.rates[0].name, "standard");
        assert_eq!(entities.thresholds[0].currency, "EUR");
        assert_eq!(raw["confidence_score"], 0.85);

        let requests = mock.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].operation, Operation::EntityExtraction);
        assert!(requests[0].json_mode);
        assert_eq!(requests[0].temperature, 0.1);
        assert_eq!(requests[0].max_tokens, 4096);
        assert!(requests[0].user_prompt.contains("- Country: DE (Germany)"));
    }

    #[tokio::test]
    async fn test_reply_wrapped_in_prose_is_recovered() {
        let mock = MockClient::new().with_response(
            Operation::EntityExtraction,
            "Sure, here it is:\n{\"tax_types\": [\"vat \"], \"rates\": []}\nHope that helps",
        );
        let (entities, _) = client(&mock)
            .extract_one("text", "FR", "fr", None)
            .await
            .unwrap();

        assert_eq!(entities.tax_types, vec![tct_core::TaxType::Vat]);
    }

    #[tokio::test]
    async fn test_malformed_reply_is_not_retried() {
        let mock = MockClient::new()
            .with_response(Operation::EntityExtraction, "I cannot help with that");
        let result = client(&mock).extract_one("text", "US", "en", None).await;

        assert!(matches!(result, Err(TctError::MalformedResponse(_))));
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_transport_failures_retried_then_succeed() {
        let mock = MockClient::new().fail_times(2);
        let result = client(&mock).extract_one("text", "DE", "de", None).await;

        assert!(result.is_ok());
        assert_eq!(mock.call_count(), 3);
    }

    #[tokio::test]
    async fn test_transport_failures_exhaust_retries() {
        let mock = MockClient::new().fail_times(5);
        let result = client(&mock).extract_one("text", "DE", "de", None).await;

        assert!(matches!(result, Err(TctError::Transport(_))));
        assert_eq!(mock.call_count(), 3);
    }

    #[tokio::test]
    async fn test_unknown_country_uses_code_as_name() {
        let mock = MockClient::new();
        client(&mock)
            .extract_one("text", "zz", "en", Some("annex B"))
            .await
            .unwrap();

        let prompt = &mock.requests()[0].user_prompt;
        assert!(prompt.contains("- Country: ZZ (ZZ)"));
        assert!(prompt.contains("- Additional Context: annex B"));
    }
}
