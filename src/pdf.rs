use crate::error::{MailDigestError, Result};
use crate::extractor::TextExtractor;

/// Page-by-page PDF text extraction.
pub struct PdfExtractor;

impl PdfExtractor {
    /// Extract the text of each page, in page order.
    fn extract_text_by_page(bytes: &[u8]) -> Result<Vec<String>> {
        pdf_extract::extract_text_from_mem_by_pages(bytes).map_err(|e| {
            MailDigestError::Extraction(format!("Failed to extract text from PDF: {}", e))
        })
    }
}

impl TextExtractor for PdfExtractor {
    /// Pages without text (blank or scanned) are skipped; the rest are
    /// joined with newlines.
    fn extract_text(&self, content: &[u8]) -> Result<String> {
        let pages = Self::extract_text_by_page(content)?;
        Ok(pages
            .iter()
            .map(|page| page.trim())
            .filter(|page| !page.is_empty())
            .collect::<Vec<_>>()
            .join("\n"))
    }
}
