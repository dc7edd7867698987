//! TCT Parser - Document-to-text conversion
//!
//! Supports parsing of:
//! - PDF documents
//! - Microsoft Word (DOCX)
//! - Markdown files
//! - Plain text files
//!
//! Each parser implements the `DocumentParser` trait and produces a
//! `ParsedDocument` whose text is handed to the extraction pipeline.
//! Decoding itself is delegated to `pdf-extract` and `docx-rs`.

pub mod docx;
pub mod pdf;
pub mod text;

pub use docx::DocxParser;
pub use pdf::PdfParser;
pub use text::{clean_text, detect_language};

use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur during document parsing
#[derive(Error, Debug)]
pub enum ParserError {
    /// File format is not supported
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// IO error while reading the file
    #[error("IO error reading file: {path}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// PDF parsing error
    #[error("PDF parsing error: {0}")]
    PdfError(String),

    /// DOCX parsing error
    #[error("DOCX parsing error: {0}")]
    DocxError(String),

    /// No text could be extracted
    #[error("No text content extracted from {0}")]
    EmptyDocument(String),

    /// File exceeds the configured size limit
    #[error("File {path} is {size_bytes} bytes, limit is {limit_bytes}")]
    FileTooLarge {
        path: String,
        size_bytes: u64,
        limit_bytes: u64,
    },
}

pub type Result<T> = std::result::Result<T, ParserError>;

// ============================================================================
// Parsed Document Types
// ============================================================================

/// A parsed document with extracted content
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    /// Original file path
    pub file_path: String,

    /// Detected file type
    pub file_type: FileType,

    /// Extracted text content
    pub content: String,

    /// Metadata collected during parsing
    pub metadata: DocumentParseMetadata,
}

impl ParsedDocument {
    /// Create a new parsed document
    pub fn new(file_path: impl Into<String>, file_type: FileType) -> Self {
        Self {
            file_path: file_path.into(),
            file_type,
            content: String::new(),
            metadata: DocumentParseMetadata::default(),
        }
    }

    /// Set content
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    /// Get total character count
    pub fn char_count(&self) -> usize {
        self.content.chars().count()
    }

    /// Get total word count (approximate)
    pub fn word_count(&self) -> usize {
        self.content.split_whitespace().count()
    }
}

/// Supported file types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Pdf,
    Docx,
    Markdown,
    PlainText,
    Unknown,
}

impl FileType {
    /// Detect file type from extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "pdf" => Self::Pdf,
            "docx" => Self::Docx,
            "md" | "markdown" => Self::Markdown,
            "txt" => Self::PlainText,
            _ => Self::Unknown,
        }
    }

    /// Detect file type from path
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(Self::from_extension)
            .unwrap_or(Self::Unknown)
    }

    /// Get MIME type
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Docx => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            Self::Markdown => "text/markdown",
            Self::PlainText => "text/plain",
            Self::Unknown => "application/octet-stream",
        }
    }
}

impl std::fmt::Display for FileType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pdf => write!(f, "pdf"),
            Self::Docx => write!(f, "docx"),
            Self::Markdown => write!(f, "markdown"),
            Self::PlainText => write!(f, "text"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Metadata extracted during parsing
#[derive(Debug, Clone, Default)]
pub struct DocumentParseMetadata {
    /// Number of pages
    pub page_count: Option<u32>,

    /// Word count
    pub word_count: Option<u32>,

    /// Size of the source file
    pub size_bytes: u64,

    /// Text encoding used to decode the file
    pub encoding: Option<String>,

    /// Which decoder produced the text
    pub extraction_method: &'static str,
}

// ============================================================================
// Parser Trait
// ============================================================================

/// Trait for document parsers
pub trait DocumentParser: Send + Sync {
    /// Parse a document from a file path
    fn parse(&self, path: &Path) -> Result<ParsedDocument>;

    /// Get supported file types
    fn supported_types(&self) -> &[FileType];

    /// Check if this parser can handle a file type
    fn can_parse(&self, file_type: FileType) -> bool {
        self.supported_types().contains(&file_type)
    }
}

pub(crate) fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| ParserError::IoError {
        path: path.display().to_string(),
        source: e,
    })
}

// ============================================================================
// Parser Registry
// ============================================================================

/// Default upper bound on input file size (10 MB)
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Registry of available parsers
pub struct ParserRegistry {
    parsers: Vec<Box<dyn DocumentParser>>,
    max_file_size: u64,
}

impl ParserRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            parsers: Vec::new(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }

    /// Registry with text, PDF and DOCX parsers
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(PlainTextParser);
        registry.register(PdfParser::new());
        registry.register(DocxParser::new());
        registry
    }

    /// Set the size limit in megabytes
    pub fn with_max_file_size_mb(mut self, mb: u64) -> Self {
        self.max_file_size = mb.saturating_mul(1024 * 1024);
        self
    }

    /// Register a parser
    pub fn register<P: DocumentParser + 'static>(&mut self, parser: P) {
        self.parsers.push(Box::new(parser));
    }

    /// Find a parser for a file type
    pub fn find_parser(&self, file_type: FileType) -> Option<&dyn DocumentParser> {
        self.parsers
            .iter()
            .find(|p| p.can_parse(file_type))
            .map(|p| p.as_ref())
    }

    /// Parse a file using the appropriate parser
    ///
    /// Fails with `FileTooLarge` before decoding and with `EmptyDocument`
    /// when the decoder produced only whitespace.
    pub fn parse(&self, path: &Path) -> Result<ParsedDocument> {
        let file_type = FileType::from_path(path);

        if file_type == FileType::Unknown {
            return Err(ParserError::UnsupportedFormat(
                path.extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or("none")
                    .to_string(),
            ));
        }

        let parser = self
            .find_parser(file_type)
            .ok_or_else(|| ParserError::UnsupportedFormat(file_type.to_string()))?;

        let size_bytes = std::fs::metadata(path)
            .map_err(|e| ParserError::IoError {
                path: path.display().to_string(),
                source: e,
            })?
            .len();
        if size_bytes > self.max_file_size {
            return Err(ParserError::FileTooLarge {
                path: path.display().to_string(),
                size_bytes,
                limit_bytes: self.max_file_size,
            });
        }

        let mut doc = parser.parse(path)?;
        if doc.content.trim().is_empty() {
            warn!(path = %path.display(), "Parser returned no text");
            return Err(ParserError::EmptyDocument(path.display().to_string()));
        }

        doc.metadata.size_bytes = size_bytes;
        doc.metadata.word_count = Some(doc.word_count() as u32);
        debug!(
            path = %path.display(),
            file_type = %doc.file_type,
            chars = doc.char_count(),
            "Parsed document"
        );
        Ok(doc)
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParserRegistry")
            .field("parsers", &self.parsers.len())
            .field("max_file_size", &self.max_file_size)
            .finish()
    }
}

// ============================================================================
// Plain Text Parser
// ============================================================================

/// Plain text and markdown parser
///
/// Decodes UTF-8, falling back to Latin-1 (every byte maps to one char).
pub struct PlainTextParser;

impl PlainTextParser {
    fn decode(bytes: Vec<u8>) -> (String, &'static str) {
        match String::from_utf8(bytes) {
            Ok(text) => (text, "utf-8"),
            Err(e) => {
                let text = e.into_bytes().iter().map(|&b| b as char).collect();
                (text, "latin-1")
            }
        }
    }
}

impl DocumentParser for PlainTextParser {
    fn parse(&self, path: &Path) -> Result<ParsedDocument> {
        let (content, encoding) = Self::decode(read_bytes(path)?);
        let file_type = match FileType::from_path(path) {
            FileType::Markdown => FileType::Markdown,
            _ => FileType::PlainText,
        };

        let mut doc = ParsedDocument::new(path.display().to_string(), file_type)
            .with_content(content);
        doc.metadata.encoding = Some(encoding.to_string());
        doc.metadata.extraction_method = "text";
        Ok(doc)
    }

    fn supported_types(&self) -> &[FileType] {
        &[FileType::PlainText, FileType::Markdown]
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_file(suffix: &str, bytes: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(bytes).unwrap();
        file
    }

    #[test]
    fn test_file_type_detection() {
        assert_eq!(FileType::from_extension("pdf"), FileType::Pdf);
        assert_eq!(FileType::from_extension("PDF"), FileType::Pdf);
        assert_eq!(FileType::from_extension("docx"), FileType::Docx);
        assert_eq!(FileType::from_extension("md"), FileType::Markdown);
        assert_eq!(FileType::from_extension("txt"), FileType::PlainText);
        assert_eq!(FileType::from_extension("xlsx"), FileType::Unknown);
    }

    #[test]
    fn test_parse_utf8_text() {
        let file = temp_file(".txt", "Mehrwertsteuer 19 %".as_bytes());
        let registry = ParserRegistry::with_defaults();

        let doc = registry.parse(file.path()).unwrap();
        assert_eq!(doc.file_type, FileType::PlainText);
        assert_eq!(doc.content, "Mehrwertsteuer 19 %");
        assert_eq!(doc.metadata.encoding.as_deref(), Some("utf-8"));
        assert_eq!(doc.metadata.word_count, Some(3));
    }

    #[test]
    fn test_latin1_fallback() {
        // "Taxa é 17%" in Latin-1
        let file = temp_file(".txt", b"Taxa \xe9 17%");
        let doc = ParserRegistry::with_defaults().parse(file.path()).unwrap();

        assert_eq!(doc.content, "Taxa é 17%");
        assert_eq!(doc.metadata.encoding.as_deref(), Some("latin-1"));
    }

    #[test]
    fn test_markdown_keeps_file_type() {
        let file = temp_file(".md", b"# VAT\n\nStandard rate 20%");
        let doc = ParserRegistry::with_defaults().parse(file.path()).unwrap();
        assert_eq!(doc.file_type, FileType::Markdown);
    }

    #[test]
    fn test_unsupported_extension() {
        let file = temp_file(".xlsx", b"data");
        let result = ParserRegistry::with_defaults().parse(file.path());
        assert!(matches!(result, Err(ParserError::UnsupportedFormat(ext)) if ext == "xlsx"));
    }

    #[test]
    fn test_empty_document() {
        let file = temp_file(".txt", b"  \n\t ");
        let result = ParserRegistry::with_defaults().parse(file.path());
        assert!(matches!(result, Err(ParserError::EmptyDocument(_))));
    }

    #[test]
    fn test_file_too_large() {
        let file = temp_file(".txt", &vec![b'a'; 2 * 1024 * 1024]);
        let registry = ParserRegistry::with_defaults().with_max_file_size_mb(1);

        let result = registry.parse(file.path());
        assert!(matches!(
            result,
            Err(ParserError::FileTooLarge { limit_bytes, .. }) if limit_bytes == 1024 * 1024
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = ParserRegistry::with_defaults().parse(Path::new("/nonexistent/law.txt"));
        assert!(matches!(result, Err(ParserError::IoError { .. })));
    }
}
