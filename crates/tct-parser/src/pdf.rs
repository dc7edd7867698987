//! PDF document parser using pdf-extract
//!
//! Extracts text page by page. Pages are separated by form feeds in the
//! extracted text; each non-empty page is prefixed with a page marker so
//! the model can cite page numbers.

use std::path::Path;

use crate::{read_bytes, DocumentParser, FileType, ParsedDocument, ParserError, Result};

/// PDF document parser
pub struct PdfParser {
    /// Whether to prefix each page with a `--- Page N ---` marker
    pub page_markers: bool,
}

impl PdfParser {
    /// Create a new PDF parser with default settings
    pub fn new() -> Self {
        Self { page_markers: true }
    }

    /// Enable or disable page markers
    pub fn with_page_markers(mut self, enabled: bool) -> Self {
        self.page_markers = enabled;
        self
    }

    /// Join extracted pages, skipping blank ones
    fn assemble_pages(&self, text: &str) -> (String, u32) {
        let pages: Vec<&str> = text.split('\x0C').collect();
        let page_count = pages.len() as u32;

        let content = pages
            .iter()
            .enumerate()
            .filter(|(_, page)| !page.trim().is_empty())
            .map(|(i, page)| {
                if self.page_markers {
                    format!("--- Page {} ---\n{}", i + 1, page.trim())
                } else {
                    page.trim().to_string()
                }
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        (content, page_count)
    }
}

impl Default for PdfParser {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentParser for PdfParser {
    fn parse(&self, path: &Path) -> Result<ParsedDocument> {
        let bytes = read_bytes(path)?;

        let text = pdf_extract::extract_text_from_mem(&bytes)
            .map_err(|e| ParserError::PdfError(e.to_string()))?;

        let (content, page_count) = self.assemble_pages(&text);

        let mut doc = ParsedDocument::new(path.display().to_string(), FileType::Pdf)
            .with_content(content);
        doc.metadata.page_count = Some(page_count);
        doc.metadata.extraction_method = "pdf-extract";
        Ok(doc)
    }

    fn supported_types(&self) -> &[FileType] {
        &[FileType::Pdf]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_assembly_skips_blank_pages() {
        let parser = PdfParser::new();
        let (content, pages) = parser.assemble_pages("First page\x0C   \x0CThird page\n");

        assert_eq!(pages, 3);
        assert_eq!(
            content,
            "--- Page 1 ---\nFirst page\n\n--- Page 3 ---\nThird page"
        );
    }

    #[test]
    fn test_page_assembly_without_markers() {
        let parser = PdfParser::new().with_page_markers(false);
        let (content, pages) = parser.assemble_pages("only page");

        assert_eq!(pages, 1);
        assert_eq!(content, "only page");
    }

    #[test]
    fn test_invalid_pdf_bytes() {
        let mut file = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
        std::io::Write::write_all(&mut file, b"not a pdf").unwrap();

        let result = PdfParser::new().parse(file.path());
        assert!(matches!(result, Err(ParserError::PdfError(_))));
    }

    #[test]
    fn test_supported_types() {
        let parser = PdfParser::new();
        assert!(parser.can_parse(FileType::Pdf));
        assert!(!parser.can_parse(FileType::Docx));
    }
}
