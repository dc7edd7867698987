//! Document processing: parse, clean, extract, render

use crate::chunker::TextChunker;
use crate::client::{CallSettings, ExtractionClient};
use crate::pipeline::{DocumentInput, ExtractionPipeline};
use crate::render::OutputRenderer;
use crate::tokenizer::load_tokenizer;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tct_core::{
    AppConfig, Jurisdictions, LlmClient, OutputFormat, ProcessingResult, Result, TctError,
};
use tct_parser::{clean_text, detect_language, ParserRegistry};
use tracing::info;

/// Per-document request options
#[derive(Debug, Clone, Default)]
pub struct ProcessOptions {
    /// Jurisdiction code, any case
    pub country: String,

    /// Detected from the text when absent
    pub language: Option<String>,

    pub context: Option<String>,

    pub format: OutputFormat,

    pub max_chunk_tokens: Option<usize>,
}

impl ProcessOptions {
    pub fn new(country: impl Into<String>) -> Self {
        Self {
            country: country.into(),
            ..Self::default()
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }
}

/// Turns documents into a `ProcessingResult`
#[derive(Debug)]
pub struct DocumentProcessor {
    parsers: ParserRegistry,
    pipeline: ExtractionPipeline,
    renderer: OutputRenderer,
    jurisdictions: Arc<Jurisdictions>,
    /// Used when no language is given and detection finds no marker words
    default_language: String,
}

impl DocumentProcessor {
    /// Build a processor around `llm` using `config` for every setting
    pub fn from_config(config: &AppConfig, llm: Arc<dyn LlmClient>) -> Self {
        let jurisdictions = Arc::new(Jurisdictions::with_overrides(&config.jurisdictions));
        let settings = CallSettings::from_config(&config.llm);

        let client = ExtractionClient::new(Arc::clone(&llm), Arc::clone(&jurisdictions))
            .with_settings(settings.clone());
        let chunker = TextChunker::new(load_tokenizer(
            config.extraction.tokenizer_path.as_deref(),
        ));
        let pipeline = ExtractionPipeline::new(client, chunker).with_config(&config.extraction);

        Self {
            parsers: ParserRegistry::with_defaults()
                .with_max_file_size_mb(config.extraction.max_file_size_mb),
            pipeline,
            renderer: OutputRenderer::new(llm).with_settings(settings),
            jurisdictions,
            default_language: config.extraction.default_language.clone(),
        }
    }

    /// Parse a file and process its text
    pub async fn process_file(
        &self,
        path: &Path,
        options: &ProcessOptions,
    ) -> Result<ProcessingResult> {
        let start = Instant::now();
        let document = self.parsers.parse(path).map_err(|e| {
            TctError::Other(anyhow::Error::new(e).context(format!("parsing {}", path.display())))
        })?;
        info!(
            path = %path.display(),
            file_type = ?document.file_type,
            chars = document.char_count(),
            "Parsed document"
        );

        let mut result = self.process_text(&document.content, options).await?;
        result.processing_time_ms = elapsed_ms(start);
        Ok(result)
    }

    /// Process raw document text
    pub async fn process_text(
        &self,
        text: &str,
        options: &ProcessOptions,
    ) -> Result<ProcessingResult> {
        let start = Instant::now();
        if text.trim().is_empty() {
            return Err(TctError::InvalidInput("document text is empty".to_string()));
        }

        let text = clean_text(text);
        let language = options
            .language
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| {
                detect_language(&text)
                    .unwrap_or(self.default_language.as_str())
                    .to_string()
            });
        let country = options.country.trim().to_uppercase();
        let country_name = self.jurisdictions.name_for(&country);
        info!(country = %country, language = %language, format = %options.format, "Processing document");

        let input = DocumentInput {
            text,
            country: country.clone(),
            language: language.clone(),
            context: options.context.clone(),
            max_chunk_tokens: options.max_chunk_tokens,
        };
        let output = self.pipeline.run(&input).await?;

        let outputs = self
            .renderer
            .render(options.format, &output.entities, &country, &country_name)
            .await?;

        let mut result =
            ProcessingResult::new(&country, country_name, language, output.entities, output.warnings);
        result.json_config = outputs.json_config;
        result.sql_migration = outputs.sql_migration;
        result.policy_definition = outputs.policy_definition;
        result.generated_code = outputs.generated_code;
        result.processing_time_ms = elapsed_ms(start);

        info!(
            document_id = %result.document_id,
            chunks = output.chunk_count,
            elapsed_ms = result.processing_time_ms,
            "Document processed"
        );
        Ok(result)
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tct_core::LlmProvider;
    use tct_llm::MockClient;

    fn mock_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.llm.provider = LlmProvider::Mock;
        config.llm.max_retries = 1;
        config
    }

    fn processor(mock: &MockClient) -> DocumentProcessor {
        DocumentProcessor::from_config(&mock_config(), Arc::new(mock.clone()))
    }

    #[tokio::test]
    async fn test_process_text_assembles_result() {
        let mock = MockClient::new();
        let result = processor(&mock)
            .process_text(
                "Der Umsatzsteuersatz beträgt 19 Prozent und die Steuer ist für die Umsätze fällig.",
                &ProcessOptions::new("de").with_format(OutputFormat::Json),
            )
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.country, "DE");
        assert_eq!(result.country_name, "Germany");
        assert_eq!(result.language_detected, "de");
        assert_eq!(result.confidence_score, 0.85);
        assert_eq!(result.warnings, vec!["Mock data - for demonstration only"]);
        assert!(result.json_config.is_some());
        assert!(result.sql_migration.is_none());
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_explicit_language_wins() {
        let mock = MockClient::new();
        let result = processor(&mock)
            .process_text(
                "The rate is 19%",
                &ProcessOptions::new("BR")
                    .with_language("pt")
                    .with_format(OutputFormat::Code),
            )
            .await
            .unwrap();

        assert_eq!(result.language_detected, "pt");
        assert_eq!(result.country_name, "Brazil");
    }

    #[tokio::test]
    async fn test_configured_default_language_when_undetected() {
        let mut config = mock_config();
        config.extraction.default_language = "de".to_string();
        let processor = DocumentProcessor::from_config(&config, Arc::new(MockClient::new()));

        let result = processor
            .process_text(
                "12345 67890",
                &ProcessOptions::new("DE").with_format(OutputFormat::Json),
            )
            .await
            .unwrap();
        assert_eq!(result.language_detected, "de");

        let result = processor
            .process_text(
                "The tax rate is 20% and is due monthly",
                &ProcessOptions::new("DE").with_format(OutputFormat::Json),
            )
            .await
            .unwrap();
        assert_eq!(result.language_detected, "en");
    }

    #[tokio::test]
    async fn test_process_file() {
        let mock = MockClient::new();
        let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        writeln!(file, "VAT   applies at 20%.\r\n\r\n\r\n\r\nReturns are due quarterly.").unwrap();

        let result = processor(&mock)
            .process_file(file.path(), &ProcessOptions::new("gb").with_format(OutputFormat::Yaml))
            .await
            .unwrap();

        assert_eq!(result.country, "GB");
        assert!(result.policy_definition.is_some());

        let prompt = &mock.requests()[0].user_prompt;
        assert!(prompt.contains("VAT applies at 20%.\n\nReturns are due quarterly."));
    }

    #[tokio::test]
    async fn test_unsupported_file_is_an_error() {
        let mock = MockClient::new();
        let file = tempfile::Builder::new().suffix(".xyz").tempfile().unwrap();

        let result = processor(&mock)
            .process_file(file.path(), &ProcessOptions::new("DE"))
            .await;

        assert!(matches!(result, Err(TctError::Other(_))));
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn test_blank_text_rejected() {
        let mock = MockClient::new();
        let result = processor(&mock)
            .process_text(" \t\n", &ProcessOptions::new("DE"))
            .await;
        assert!(matches!(result, Err(TctError::InvalidInput(_))));
    }
}
