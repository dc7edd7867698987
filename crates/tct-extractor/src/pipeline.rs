//! End-to-end extraction for one document
//!
//! Estimate tokens, chunk when above the threshold, extract each chunk in
//! document order, merge, validate.

use crate::chunker::TextChunker;
use crate::client::ExtractionClient;
use crate::merger::EntityMerger;
use crate::validator::validate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tct_core::{EntitySet, ExtractionConfig, Result, TctError};
use tracing::{error, info};

/// Documents estimated above this many tokens are chunked
pub const DEFAULT_CHUNK_THRESHOLD: usize = 6000;

/// Per-chunk token budget when the caller gives none
pub const DEFAULT_MAX_CHUNK_TOKENS: usize = 6000;

/// One document to extract from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentInput {
    /// Cleaned document text
    pub text: String,

    /// Jurisdiction code
    pub country: String,

    pub language: String,

    /// Free-text hint passed to the model
    pub context: Option<String>,

    /// Overrides the pipeline's chunk budget for this document
    pub max_chunk_tokens: Option<usize>,
}

impl DocumentInput {
    pub fn new(
        text: impl Into<String>,
        country: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            text: text.into(),
            country: country.into(),
            language: language.into(),
            context: None,
            max_chunk_tokens: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_max_chunk_tokens(mut self, max_chunk_tokens: usize) -> Self {
        self.max_chunk_tokens = Some(max_chunk_tokens);
        self
    }
}

/// Result of one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineOutput {
    /// Merged entities
    pub entities: EntitySet,

    /// Validator warnings
    pub warnings: Vec<String>,

    /// Recovered JSON object of every extraction call, in chunk order
    pub raw_responses: Vec<Value>,

    pub chunk_count: usize,
}

/// Extraction pipeline
#[derive(Debug)]
pub struct ExtractionPipeline {
    client: ExtractionClient,
    chunker: TextChunker,
    chunk_threshold: usize,
    max_chunk_tokens: usize,
}

impl ExtractionPipeline {
    /// Create a pipeline with the default threshold and budget
    pub fn new(client: ExtractionClient, chunker: TextChunker) -> Self {
        Self {
            client,
            chunker,
            chunk_threshold: DEFAULT_CHUNK_THRESHOLD,
            max_chunk_tokens: DEFAULT_MAX_CHUNK_TOKENS,
        }
    }

    /// Apply threshold and budget from config
    pub fn with_config(mut self, config: &ExtractionConfig) -> Self {
        self.chunk_threshold = config.chunk_threshold_tokens;
        self.max_chunk_tokens = config.max_chunk_tokens;
        self
    }

    pub fn with_chunk_threshold(mut self, threshold: usize) -> Self {
        self.chunk_threshold = threshold;
        self
    }

    pub fn client(&self) -> &ExtractionClient {
        &self.client
    }

    /// Run extraction over one document
    ///
    /// Any chunk failure aborts the whole run; no partial result is
    /// returned.
    pub async fn run(&self, input: &DocumentInput) -> Result<PipelineOutput> {
        if input.text.trim().is_empty() {
            return Err(TctError::InvalidInput("document text is empty".to_string()));
        }

        let estimated = self.chunker.estimate_tokens(&input.text);
        let context = input.context.as_deref();

        let (entities, raw_responses) = if estimated > self.chunk_threshold {
            let budget = input.max_chunk_tokens.unwrap_or(self.max_chunk_tokens);
            self.run_chunked(input, context, budget, estimated).await?
        } else {
            info!(estimated_tokens = estimated, "Extracting document in one call");
            let (entities, raw) = self
                .client
                .extract_one(&input.text, &input.country, &input.language, context)
                .await?;
            (entities, vec![raw])
        };

        let warnings = validate(&entities);
        let chunk_count = raw_responses.len();
        info!(
            chunks = chunk_count,
            entities = entities.entity_count(),
            warnings = warnings.len(),
            "Extraction complete"
        );

        Ok(PipelineOutput {
            entities,
            warnings,
            raw_responses,
            chunk_count,
        })
    }

    async fn run_chunked(
        &self,
        input: &DocumentInput,
        context: Option<&str>,
        budget: usize,
        estimated: usize,
    ) -> Result<(EntitySet, Vec<Value>)> {
        let chunks = self.chunker.chunk(&input.text, budget);
        let total = chunks.len();
        info!(
            estimated_tokens = estimated,
            budget,
            chunks = total,
            "Document above chunk threshold, extracting in chunks"
        );

        let mut merger = EntityMerger::new();
        let mut raw_responses = Vec::with_capacity(total);

        for (index, chunk) in chunks.iter().enumerate() {
            let chunk_context = chunk_context(context, index + 1, total);
            let extracted = self
                .client
                .extract_one(chunk, &input.country, &input.language, Some(&chunk_context))
                .await;

            match extracted {
                Ok((entities, raw)) => {
                    merger.absorb(entities);
                    raw_responses.push(raw);
                }
                Err(e) => {
                    error!(chunk = index + 1, total, "Chunk extraction failed: {}", e);
                    return Err(e);
                }
            }
        }

        Ok((merger.finish(), raw_responses))
    }
}

/// `"<context> [Chunk i of n]"`, or just the marker without context
fn chunk_context(context: Option<&str>, index: usize, total: usize) -> String {
    let marker = format!("[Chunk {index} of {total}]");
    match context.map(str::trim).filter(|c| !c.is_empty()) {
        Some(context) => format!("{context} {marker}"),
        None => marker,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::CallSettings;
    use std::sync::Arc;
    use tct_core::{Jurisdictions, Operation};
    use tct_llm::{MockClient, RetryPolicy};

    fn pipeline(mock: &MockClient) -> ExtractionPipeline {
        let client = ExtractionClient::new(Arc::new(mock.clone()), Arc::new(Jurisdictions::builtin()))
            .with_settings(CallSettings {
                retry: RetryPolicy::no_retry(),
                ..CallSettings::default()
            });
        ExtractionPipeline::new(client, TextChunker::default())
    }

    #[test]
    fn test_chunk_context() {
        assert_eq!(chunk_context(None, 1, 3), "[Chunk 1 of 3]");
        assert_eq!(chunk_context(Some("  "), 2, 3), "[Chunk 2 of 3]");
        assert_eq!(chunk_context(Some("VAT act"), 3, 3), "VAT act [Chunk 3 of 3]");
    }

    #[tokio::test]
    async fn test_short_document_single_call() {
        let mock = MockClient::new();
        let output = pipeline(&mock)
            .run(&DocumentInput::new("Der Steuersatz beträgt 19%.", "DE", "de"))
            .await
            .unwrap();

        assert_eq!(output.chunk_count, 1);
        assert_eq!(mock.call_count(), 1);
        assert_eq!(output.entities.rates.len(), 1);
        assert!(output.warnings.is_empty());
        assert!(!mock.requests()[0].user_prompt.contains("[Chunk"));
    }

    #[tokio::test]
    async fn test_threshold_is_exclusive() {
        let mock = MockClient::new();
        // 400 chars = 100 estimated tokens, exactly at the threshold
        let input = DocumentInput::new("a".repeat(400), "DE", "de").with_max_chunk_tokens(10);
        let output = pipeline(&mock)
            .with_chunk_threshold(100)
            .run(&input)
            .await
            .unwrap();

        assert_eq!(output.chunk_count, 1);
    }

    #[tokio::test]
    async fn test_long_document_chunked_in_order() {
        let mock = MockClient::new();
        let input = DocumentInput::new("x".repeat(404), "DE", "de")
            .with_context("Annex")
            .with_max_chunk_tokens(50);
        let output = pipeline(&mock)
            .with_chunk_threshold(100)
            .run(&input)
            .await
            .unwrap();

        // 404 chars in slices of 200
        assert_eq!(output.chunk_count, 3);
        assert_eq!(output.raw_responses.len(), 3);

        let prompts: Vec<String> = mock.requests().into_iter().map(|r| r.user_prompt).collect();
        assert!(prompts[0].contains("- Additional Context: Annex [Chunk 1 of 3]"));
        assert!(prompts[2].contains("- Additional Context: Annex [Chunk 3 of 3]"));

        // Identical canned replies collapse to one of each named entity
        assert_eq!(output.entities.rates.len(), 1);
        assert_eq!(output.entities.thresholds.len(), 1);
        assert_eq!(output.entities.extra_strings(tct_core::EXTRA_WARNINGS).len(), 3);
    }

    #[tokio::test]
    async fn test_failed_chunk_aborts_run() {
        let mock = MockClient::new()
            .with_response(Operation::EntityExtraction, "{\"rates\": []}")
            .with_response(Operation::EntityExtraction, "not json");
        let input = DocumentInput::new("y".repeat(1200), "DE", "de").with_max_chunk_tokens(100);
        let result = pipeline(&mock).with_chunk_threshold(100).run(&input).await;

        assert!(matches!(result, Err(TctError::MalformedResponse(_))));
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_empty_text_rejected() {
        let mock = MockClient::new();
        let result = pipeline(&mock).run(&DocumentInput::new("  \n", "DE", "de")).await;

        assert!(matches!(result, Err(TctError::InvalidInput(_))));
        assert_eq!(mock.call_count(), 0);
    }
}
