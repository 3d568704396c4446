use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Default content type for attachments that declare none and whose
/// filename gives no hint.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Default filename for attachments without a name.
pub const DEFAULT_ATTACHMENT_NAME: &str = "unknown_attachment";

/// An attachment as enumerated from a parsed message
#[derive(Debug, Clone, PartialEq)]
pub struct AttachmentRecord {
    pub filename: String,
    /// Raw (transfer-decoded) payload
    pub content: Bytes,
    /// MIME type, possibly guessed from the filename
    pub content_type: String,
}

impl AttachmentRecord {
    pub fn new(
        filename: impl Into<String>,
        content: impl Into<Bytes>,
        content_type: impl Into<String>,
    ) -> Self {
        Self {
            filename: filename.into(),
            content: content.into(),
            content_type: content_type.into(),
        }
    }
}

/// One ingested message with every field normalized to a defined value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmailRecord {
    pub sender: String,
    pub subject: String,
    /// Raw `Date` header value, not parsed
    pub date: String,
    /// Comma-joined addresses
    pub recipients: String,
    pub cc: String,
    /// Plain text, HTML already reduced
    pub body: String,
    pub attachments: Vec<AttachmentRecord>,
    pub source_filename: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Byte length of the raw attachment content
    pub size: usize,
    #[serde(rename = "type")]
    pub content_type: String,
}

/// Text recovered from one attachment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedDocument {
    pub filename: String,
    pub content_type: String,
    pub extracted_text: String,
    pub metadata: DocumentMetadata,
}

impl ExtractedDocument {
    pub fn new(attachment: &AttachmentRecord, extracted_text: String) -> Self {
        Self {
            filename: attachment.filename.clone(),
            content_type: attachment.content_type.clone(),
            extracted_text,
            metadata: DocumentMetadata {
                size: attachment.content.len(),
                content_type: attachment.content_type.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailMetadata {
    pub sender: String,
    pub subject: String,
    pub date: String,
    pub filename: String,
}

impl From<&EmailRecord> for EmailMetadata {
    fn from(email: &EmailRecord) -> Self {
        Self {
            sender: email.sender.clone(),
            subject: email.subject.clone(),
            date: email.date.clone(),
            filename: email.source_filename.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub filename: String,
    pub content_type: String,
    pub summary: String,
    /// Whitespace-delimited word count of the extracted text (not the summary)
    pub word_count: usize,
}

/// The per-email output artifact. The schema is the same whichever
/// summarization path produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub email_metadata: EmailMetadata,
    pub email_summary: String,
    pub document_summaries: Vec<DocumentSummary>,
    pub key_entities: Vec<String>,
    pub total_attachments: usize,
    pub processed_documents: usize,
}

/// One entry of the aggregate `processing_results.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub email_filename: String,
    pub summary: SummaryRecord,
    /// File name of the summary inside the output folder
    pub output_file: String,
}
