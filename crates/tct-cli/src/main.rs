//! TCT CLI - Command-line interface
//!
//! Usage:
//!   tct process <path> --country DE [--format all]
//!   tct text "<text>" --country BR
//!   tct text - --country US < document.txt
//!   tct check [--offline]
//!
//! Results are printed to stdout as JSON; logs go to stderr.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;
use tct_core::{AppConfig, LlmClient, LoggingConfig, OutputFormat};
use tct_extractor::{DocumentProcessor, ProcessOptions};
use tct_llm::{check_provider, create_llm_client, HealthState, MockClient};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "tct")]
#[command(about = "Tax-Code Translator: tax documents to machine-readable rules")]
#[command(version)]
struct Cli {
    /// TOML configuration file; environment variables take precedence
    #[arg(long, global = true, env = "TCT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process a document file (pdf, docx, md, txt)
    Process {
        /// Path to the document
        path: PathBuf,

        #[command(flatten)]
        options: RunArgs,
    },
    /// Process raw text; `-` reads stdin
    Text {
        text: String,

        #[command(flatten)]
        options: RunArgs,
    },
    /// Print the resolved configuration and check that the model answers
    Check {
        /// Only print the configuration; skip the model call
        #[arg(long)]
        offline: bool,
    },
}

#[derive(Args)]
struct RunArgs {
    /// ISO country code, e.g. DE, BR, US
    #[arg(short, long)]
    country: String,

    /// Outputs to render: all, json, yaml, sql, code
    #[arg(short, long, default_value = "all")]
    format: OutputFormat,

    /// Document language; detected when omitted
    #[arg(short, long)]
    language: Option<String>,

    /// Free-text hint for the model
    #[arg(long)]
    context: Option<String>,

    /// Token budget per chunk for long documents
    #[arg(long)]
    max_chunk_tokens: Option<usize>,

    /// Use the offline mock model
    #[arg(long)]
    mock: bool,

    /// Pretty-print the JSON result
    #[arg(long)]
    pretty: bool,
}

impl RunArgs {
    fn process_options(&self) -> ProcessOptions {
        ProcessOptions {
            country: self.country.clone(),
            language: self.language.clone(),
            context: self.context.clone(),
            format: self.format,
            max_chunk_tokens: self.max_chunk_tokens,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;
    init_tracing(&config.logging);

    match cli.command {
        Commands::Process { path, options } => {
            let processor = build_processor(&config, options.mock)?;
            let result = processor
                .process_file(&path, &options.process_options())
                .await
                .with_context(|| format!("processing {}", path.display()))?;
            print_json(&result, options.pretty)?;
        }
        Commands::Text { text, options } => {
            let text = if text == "-" {
                let mut buf = String::new();
                std::io::stdin()
                    .read_to_string(&mut buf)
                    .context("reading text from stdin")?;
                buf
            } else {
                text
            };
            let processor = build_processor(&config, options.mock)?;
            let result = processor
                .process_text(&text, &options.process_options())
                .await
                .context("processing text")?;
            print_json(&result, options.pretty)?;
        }
        Commands::Check { offline } => {
            print_json(&config.redacted(), true)?;
            if config.llm.requires_api_key() && !config.llm.has_api_key() {
                warn!(provider = ?config.llm.provider, "No API key configured; runs will use the mock model");
            }
            if !offline {
                let status = check_provider(&config.llm).await;
                print_json(&status, true)?;
                if status.status == HealthState::Unhealthy {
                    anyhow::bail!("model health check failed");
                }
            }
        }
    }

    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::from_file(path)?.with_env_override()?,
        None => AppConfig::from_env()?,
    };
    Ok(config)
}

/// Install the stderr subscriber; `RUST_LOG` wins over the configured level
fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| logging.level.clone().into());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_file(logging.include_location)
        .with_line_number(logging.include_location);

    if logging.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn build_processor(config: &AppConfig, mock: bool) -> anyhow::Result<DocumentProcessor> {
    let llm: Arc<dyn LlmClient> = if mock {
        info!("Using mock model");
        Arc::new(MockClient::new())
    } else if config.llm.requires_api_key() && !config.llm.has_api_key() {
        warn!(
            provider = ?config.llm.provider,
            "No API key configured, falling back to the mock model"
        );
        Arc::new(MockClient::new())
    } else {
        create_llm_client(&config.llm)?
    };
    info!(model = llm.model_name(), "Model client ready");

    Ok(DocumentProcessor::from_config(config, llm))
}

fn print_json<T: serde::Serialize>(value: &T, pretty: bool) -> anyhow::Result<()> {
    let out = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{out}");
    Ok(())
}
