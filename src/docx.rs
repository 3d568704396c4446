use docx_rust::{document::BodyContent, DocxFile};
use std::io::Cursor;

use crate::error::{MailDigestError, Result};
use crate::extractor::TextExtractor;

/// Paragraph text from Word documents; empty paragraphs are skipped.
pub struct DocxExtractor;

impl DocxExtractor {
    fn paragraphs(bytes: &[u8]) -> Result<Vec<String>> {
        let reader = Cursor::new(bytes);

        let docx_file = DocxFile::from_reader(reader).map_err(|e| {
            MailDigestError::Extraction(format!("Failed to read DOCX file: {}", e))
        })?;
        let doc = docx_file.parse().map_err(|e| {
            MailDigestError::Extraction(format!("Failed to parse DOCX file: {}", e))
        })?;

        let mut paragraphs = Vec::new();
        for content in doc.document.body.content {
            if let BodyContent::Paragraph(paragraph) = content {
                let mut text = String::new();
                for t in paragraph.iter_text() {
                    text.push_str(&t.to_string());
                }
                if !text.trim().is_empty() {
                    paragraphs.push(text);
                }
            }
        }
        Ok(paragraphs)
    }
}

impl TextExtractor for DocxExtractor {
    fn extract_text(&self, content: &[u8]) -> Result<String> {
        let paragraphs = Self::paragraphs(content)?;
        Ok(paragraphs.join("\n").trim().to_string())
    }
}
