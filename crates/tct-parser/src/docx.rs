//! DOCX document parser using docx-rs
//!
//! Extracts paragraph text and table rows in document order. Table rows
//! become a single line of non-empty cells separated by `" | "`.

use std::path::Path;

use docx_rs::{
    read_docx, DocumentChild, Paragraph, ParagraphChild, RunChild, TableCellContent, TableChild,
    TableRowChild,
};

use crate::{read_bytes, DocumentParser, FileType, ParsedDocument, ParserError, Result};

/// DOCX document parser
pub struct DocxParser {
    /// Whether table rows are included in the output
    pub include_tables: bool,
}

impl DocxParser {
    /// Create a new DOCX parser with default settings
    pub fn new() -> Self {
        Self {
            include_tables: true,
        }
    }

    /// Enable or disable table extraction
    pub fn with_tables(mut self, enabled: bool) -> Self {
        self.include_tables = enabled;
        self
    }
}

impl Default for DocxParser {
    fn default() -> Self {
        Self::new()
    }
}

fn paragraph_text(para: &Paragraph) -> String {
    let mut text = String::new();
    for child in &para.children {
        if let ParagraphChild::Run(run) = child {
            for run_child in &run.children {
                if let RunChild::Text(t) = run_child {
                    text.push_str(&t.text);
                }
            }
        }
    }
    text
}

impl DocumentParser for DocxParser {
    fn parse(&self, path: &Path) -> Result<ParsedDocument> {
        let buf = read_bytes(path)?;
        let docx = read_docx(&buf).map_err(|e| ParserError::DocxError(e.to_string()))?;

        let mut parts: Vec<String> = Vec::new();

        for child in &docx.document.children {
            match child {
                DocumentChild::Paragraph(para) => {
                    let text = paragraph_text(para);
                    if !text.trim().is_empty() {
                        parts.push(text);
                    }
                }
                DocumentChild::Table(tbl) if self.include_tables => {
                    for row in &tbl.rows {
                        let TableChild::TableRow(tr) = row;
                        let cells: Vec<String> = tr
                            .cells
                            .iter()
                            .map(|cell| {
                                let TableRowChild::TableCell(tc) = cell;
                                tc.children
                                    .iter()
                                    .filter_map(|content| match content {
                                        TableCellContent::Paragraph(p) => Some(paragraph_text(p)),
                                        _ => None,
                                    })
                                    .collect::<String>()
                                    .trim()
                                    .to_string()
                            })
                            .filter(|cell| !cell.is_empty())
                            .collect();

                        if !cells.is_empty() {
                            parts.push(cells.join(" | "));
                        }
                    }
                }
                _ => {}
            }
        }

        let mut doc = ParsedDocument::new(path.display().to_string(), FileType::Docx)
            .with_content(parts.join("\n\n"));
        doc.metadata.extraction_method = "docx-rs";
        Ok(doc)
    }

    fn supported_types(&self) -> &[FileType] {
        &[FileType::Docx]
    }
}
