//! TCT Extractor - Tax entity extraction pipeline
//!
//! Turns document text into one canonical `EntitySet`:
//! - Token estimation and chunking of long documents
//! - Model-backed extraction per chunk, with JSON recovery
//! - Lenient per-record parsing of untrusted replies
//! - First-wins merging across chunks and plausibility checks
//!
//! The `processor` module wires this together with document parsing and
//! output rendering.

pub mod chunker;
pub mod client;
pub mod json;
pub mod merger;
pub mod parser;
pub mod pipeline;
pub mod processor;
pub mod prompt;
pub mod render;
pub mod tokenizer;
pub mod validator;

pub use chunker::TextChunker;
pub use client::{CallSettings, ExtractionClient};
pub use json::extract_json_object;
pub use merger::{merge, EntityMerger};
pub use parser::{parse_entities, RecordError};
pub use pipeline::{DocumentInput, ExtractionPipeline, PipelineOutput};
pub use processor::{DocumentProcessor, ProcessOptions};
pub use render::{OutputRenderer, RenderedOutputs};
pub use prompt::RenderTarget;
pub use tokenizer::{load_tokenizer, TokenEstimator, Tokenizer, TokenizerError};
pub use validator::validate;
