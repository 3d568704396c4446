//! Attachment text extraction.
//!
//! A fixed table maps content types onto [`AttachmentFormat`]s, each backed
//! by one [`TextExtractor`]. Content types outside the table get a lenient
//! UTF-8 decode. Attachments that produce no text are dropped rather than
//! represented by an empty document.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::docx::DocxExtractor;
use crate::error::{MailDigestError, Result};
use crate::image::{ImageExtractor, OcrEngine, TesseractOcr};
use crate::model::{AttachmentRecord, ExtractedDocument};
use crate::pdf::PdfExtractor;
use crate::text::{decode_utf8_lossy, PlainTextExtractor};

pub const PDF_CONTENT_TYPE: &str = "application/pdf";
pub const DOCX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Formats with a dedicated extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentFormat {
    Pdf,
    Docx,
    /// JPEG, PNG or TIFF, read through OCR
    Image,
    PlainText,
}

impl AttachmentFormat {
    /// Look up a content type in the dispatch table. Parameters such as
    /// `; charset=utf-8` are ignored.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match essence.as_str() {
            PDF_CONTENT_TYPE => Some(AttachmentFormat::Pdf),
            DOCX_CONTENT_TYPE => Some(AttachmentFormat::Docx),
            "image/jpeg" | "image/jpg" | "image/png" | "image/tiff" => {
                Some(AttachmentFormat::Image)
            }
            "text/plain" => Some(AttachmentFormat::PlainText),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AttachmentFormat::Pdf => "pdf",
            AttachmentFormat::Docx => "docx",
            AttachmentFormat::Image => "image",
            AttachmentFormat::PlainText => "text",
        }
    }
}

/// Turns raw attachment bytes of one format into text.
pub trait TextExtractor: Send + Sync {
    fn extract_text(&self, content: &[u8]) -> Result<String>;
}

/// Dispatches attachments to the extractor registered for their format.
#[derive(Clone)]
pub struct AttachmentExtractor {
    pdf: Arc<dyn TextExtractor>,
    docx: Arc<dyn TextExtractor>,
    image: Arc<dyn TextExtractor>,
    text: Arc<dyn TextExtractor>,
    timeout: Duration,
}

impl AttachmentExtractor {
    /// Extractor set with OCR through the `tesseract` binary.
    pub fn new() -> Self {
        Self::with_ocr(Arc::new(TesseractOcr::default()))
    }

    pub fn with_ocr(ocr: Arc<dyn OcrEngine>) -> Self {
        Self {
            pdf: Arc::new(PdfExtractor),
            docx: Arc::new(DocxExtractor),
            image: Arc::new(ImageExtractor::new(ocr)),
            text: Arc::new(PlainTextExtractor),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Replace the extractor used for one format.
    pub fn with_extractor(
        mut self,
        format: AttachmentFormat,
        extractor: Arc<dyn TextExtractor>,
    ) -> Self {
        match format {
            AttachmentFormat::Pdf => self.pdf = extractor,
            AttachmentFormat::Docx => self.docx = extractor,
            AttachmentFormat::Image => self.image = extractor,
            AttachmentFormat::PlainText => self.text = extractor,
        }
        self
    }

    /// Wall-clock budget for one attachment in [`extract_all`](Self::extract_all).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn extractor_for(&self, format: AttachmentFormat) -> Arc<dyn TextExtractor> {
        match format {
            AttachmentFormat::Pdf => self.pdf.clone(),
            AttachmentFormat::Docx => self.docx.clone(),
            AttachmentFormat::Image => self.image.clone(),
            AttachmentFormat::PlainText => self.text.clone(),
        }
    }

    /// Extract one attachment on the current thread. Failures, including
    /// panics inside a decoder, yield `None`.
    pub fn extract(&self, attachment: &AttachmentRecord) -> Option<ExtractedDocument> {
        let text = match AttachmentFormat::from_content_type(&attachment.content_type) {
            Some(format) => {
                let extractor = self.extractor_for(format);
                let result = catch_unwind(AssertUnwindSafe(|| {
                    extractor.extract_text(&attachment.content)
                }))
                .unwrap_or_else(|_| {
                    Err(MailDigestError::Extraction(format!(
                        "{} extractor panicked",
                        format.name()
                    )))
                });
                text_or_empty(attachment, result)
            }
            None => decode_utf8_lossy(&attachment.content),
        };
        finish(attachment, text)
    }

    /// Extract every attachment in order, each on the blocking pool under
    /// the configured timeout. An attachment that fails, panics or times
    /// out is dropped and the rest are still processed.
    pub async fn extract_all(&self, attachments: &[AttachmentRecord]) -> Vec<ExtractedDocument> {
        let mut documents = Vec::with_capacity(attachments.len());
        for attachment in attachments {
            if let Some(document) = self.extract_bounded(attachment).await {
                documents.push(document);
            }
        }
        documents
    }

    async fn extract_bounded(&self, attachment: &AttachmentRecord) -> Option<ExtractedDocument> {
        let Some(format) = AttachmentFormat::from_content_type(&attachment.content_type) else {
            return finish(attachment, decode_utf8_lossy(&attachment.content));
        };

        let extractor = self.extractor_for(format);
        let content = attachment.content.clone();
        let task = tokio::task::spawn_blocking(move || extractor.extract_text(&content));

        let result = match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(MailDigestError::Extraction(format!(
                "{} extractor panicked: {}",
                format.name(),
                join_error
            ))),
            Err(_) => Err(MailDigestError::Timeout(self.timeout)),
        };
        finish(attachment, text_or_empty(attachment, result))
    }
}

impl Default for AttachmentExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn text_or_empty(attachment: &AttachmentRecord, result: Result<String>) -> String {
    result.unwrap_or_else(|e| {
        warn!(
            file = %attachment.filename,
            content_type = %attachment.content_type,
            error = %e,
            "Extraction failed"
        );
        String::new()
    })
}

fn finish(attachment: &AttachmentRecord, text: String) -> Option<ExtractedDocument> {
    if text.trim().is_empty() {
        info!(file = %attachment.filename, "No text extracted, dropping attachment");
        return None;
    }
    debug!(file = %attachment.filename, chars = text.len(), "Extracted attachment text");
    Some(ExtractedDocument::new(attachment, text))
}
