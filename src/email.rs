//! Email (EML/MSG) ingestion.
//!
//! Each file is parsed with `mail-parser`; if that fails outright the raw
//! bytes are handed to the lower-level `mailparse` object model, which redoes
//! body and attachment extraction independently. Either way the result is an
//! [`EmailRecord`] whose fields are always defined.

use std::fs;
use std::path::{Path, PathBuf};

use base64::prelude::*;
use bytes::Bytes;
use mail_parser::{Message, MessageParser, MessagePart, MimeHeaders, PartType};
use mailparse::{DispositionType, MailHeaderMap, ParsedMail};
use tracing::{debug, info, warn};

use crate::error::{MailDigestError, Result};
use crate::html::{html_to_text, is_html};
use crate::model::{AttachmentRecord, EmailRecord, DEFAULT_ATTACHMENT_NAME, DEFAULT_CONTENT_TYPE};
use crate::normalize::FieldValue;

/// File extensions picked up when none are configured.
pub const DEFAULT_EXTENSIONS: [&str; 2] = [".eml", ".msg"];

/// The body of a parsed message, classified by what the parser found.
///
/// Body text is taken from the first non-empty shape in this order:
/// plain-text parts, HTML parts, then the parser's generic body.
#[derive(Debug, Clone, PartialEq)]
pub enum BodyShape {
    Plain(Vec<String>),
    Html(Vec<String>),
    Generic(Option<String>),
}

impl BodyShape {
    /// Classify a message body. `generic` is only consulted when there are
    /// no usable plain or HTML parts.
    pub fn classify(
        plain: Vec<String>,
        html: Vec<String>,
        generic: impl FnOnce() -> Option<String>,
    ) -> Self {
        let plain: Vec<String> = plain
            .into_iter()
            .map(|part| part.trim().to_string())
            .filter(|part| !part.is_empty())
            .collect();

        if !plain.is_empty() {
            BodyShape::Plain(plain)
        } else if !html.is_empty() {
            BodyShape::Html(html)
        } else {
            BodyShape::Generic(generic())
        }
    }

    /// Render the body as plain text, parts separated by a blank line.
    pub fn into_text(self) -> String {
        let parts: Vec<String> = match self {
            BodyShape::Plain(parts) => parts,
            BodyShape::Html(parts) => parts
                .iter()
                .map(|html| html_to_text(html))
                .filter(|text| !text.is_empty())
                .collect(),
            BodyShape::Generic(Some(body)) if is_html(&body) => vec![html_to_text(&body)],
            BodyShape::Generic(Some(body)) => vec![body],
            BodyShape::Generic(None) => Vec::new(),
        };
        parts.join("\n\n").trim().to_string()
    }
}

/// An attachment payload before it is turned into raw bytes.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Text that may still carry its base64 transfer encoding
    Text(String),
    Binary(Bytes),
}

/// Turn a payload into raw bytes. Text is base64-decoded when it decodes
/// cleanly; otherwise its UTF-8 encoding is used as-is.
pub fn decode_payload(payload: Payload) -> Bytes {
    match payload {
        Payload::Binary(bytes) => bytes,
        Payload::Text(text) => {
            let compact: String = text.chars().filter(|c| *c != '\r' && *c != '\n').collect();
            let compact = compact.trim();
            if compact.is_empty() {
                return Bytes::from(text.into_bytes());
            }
            match BASE64_STANDARD.decode(compact) {
                Ok(decoded) => Bytes::from(decoded),
                Err(_) => Bytes::from(text.into_bytes()),
            }
        }
    }
}

/// Scans a folder for message files and turns each into an [`EmailRecord`].
#[derive(Debug, Clone)]
pub struct EmailIngestor {
    extensions: Vec<String>,
}

impl EmailIngestor {
    pub fn new() -> Self {
        Self::with_extensions(DEFAULT_EXTENSIONS.iter().map(|ext| ext.to_string()))
    }

    pub fn with_extensions<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|ext| ext.into().to_lowercase())
                .collect(),
        }
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Whether the file name ends with one of the recognized extensions.
    pub fn is_supported(&self, path: &Path) -> bool {
        let Some(name) = path.file_name() else {
            return false;
        };
        let name = name.to_string_lossy().to_lowercase();
        self.extensions.iter().any(|ext| name.ends_with(ext.as_str()))
    }

    /// Parse every recognized file in `dir`, in file name order.
    ///
    /// A missing folder is created and yields nothing. Files that cannot be
    /// parsed by either parser are logged and skipped.
    pub fn ingest_folder(&self, dir: &Path) -> Vec<EmailRecord> {
        if !dir.exists() {
            warn!(dir = %dir.display(), "Email folder does not exist, creating it");
            if let Err(e) = fs::create_dir_all(dir) {
                warn!(dir = %dir.display(), error = %e, "Failed to create email folder");
            }
            return Vec::new();
        }

        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Failed to read email folder");
                return Vec::new();
            }
        };

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| self.is_supported(path))
            .collect();
        paths.sort();

        let mut emails = Vec::with_capacity(paths.len());
        for path in paths {
            match self.ingest_file(&path) {
                Ok(email) => {
                    info!(file = %email.source_filename, "Parsed email");
                    emails.push(email);
                }
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "Skipping unparsable email");
                }
            }
        }
        emails
    }

    pub fn ingest_file(&self, path: &Path) -> Result<EmailRecord> {
        let bytes = fs::read(path).map_err(|e| MailDigestError::io(path, e))?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self::parse_bytes(&filename, &bytes)
    }

    /// Parse raw message bytes, falling back to the secondary parser when
    /// the primary one fails.
    pub fn parse_bytes(filename: &str, bytes: &[u8]) -> Result<EmailRecord> {
        match parse_primary(filename, bytes) {
            Ok(email) => Ok(email),
            Err(primary) => {
                warn!(file = %filename, error = %primary, "Primary parser failed, trying fallback");
                parse_secondary(filename, bytes).map_err(|secondary| {
                    MailDigestError::Parse(format!(
                        "both parsers failed for {}: {}; {}",
                        filename, primary, secondary
                    ))
                })
            }
        }
    }
}

impl Default for EmailIngestor {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_primary(filename: &str, bytes: &[u8]) -> Result<EmailRecord> {
    let message = MessageParser::default()
        .parse(bytes)
        .ok_or_else(|| MailDigestError::Parse("Failed to parse email".to_string()))?;

    let dates: Vec<String> = message
        .headers_raw()
        .filter(|(name, _)| name.eq_ignore_ascii_case("Date"))
        .map(|(_, value)| value.trim().to_string())
        .collect();

    Ok(EmailRecord {
        sender: FieldValue::from(message.from()).normalize(),
        subject: FieldValue::from(message.subject()).normalize(),
        date: FieldValue::texts(dates).normalize(),
        recipients: FieldValue::from(message.to()).normalize(),
        cc: FieldValue::from(message.cc()).normalize(),
        body: primary_body(&message).into_text(),
        attachments: primary_attachments(&message),
        source_filename: filename.to_string(),
    })
}

fn primary_body(message: &Message<'_>) -> BodyShape {
    let plain = message
        .text_bodies()
        .filter_map(|part| match &part.body {
            PartType::Text(text) => Some(text.to_string()),
            _ => None,
        })
        .collect();

    let html = message
        .html_bodies()
        .filter_map(|part| match &part.body {
            PartType::Html(html) => Some(html.to_string()),
            _ => None,
        })
        .collect();

    BodyShape::classify(plain, html, || {
        let root = message.root_part();
        let body = match &root.body {
            PartType::Multipart(_) | PartType::Message(_) => None,
            _ => Some(String::from_utf8_lossy(root.contents()).into_owned()),
        };
        body.filter(|body| !body.trim().is_empty())
    })
}

fn primary_attachments(message: &Message<'_>) -> Vec<AttachmentRecord> {
    message
        .attachments()
        .map(|part| {
            let filename = part
                .attachment_name()
                .map(String::from)
                .unwrap_or_else(|| DEFAULT_ATTACHMENT_NAME.to_string());

            let content_type = part
                .content_type()
                .map(|ct| match ct.subtype() {
                    Some(sub) => format!("{}/{}", ct.ctype(), sub),
                    None => ct.ctype().to_string(),
                })
                .unwrap_or_else(|| guess_content_type(&filename));

            let payload = match &part.body {
                PartType::Text(text) | PartType::Html(text) if still_base64(part) => {
                    Payload::Text(text.to_string())
                }
                _ => Payload::Binary(Bytes::copy_from_slice(part.contents())),
            };

            AttachmentRecord {
                filename,
                content: decode_payload(payload),
                content_type: content_type.to_lowercase(),
            }
        })
        .collect()
}

/// mail-parser has already undone the transfer encoding unless it reported a
/// problem, in which case a base64 part may still hold its encoded text.
fn still_base64(part: &MessagePart<'_>) -> bool {
    part.is_encoding_problem
        && part
            .content_transfer_encoding()
            .is_some_and(|encoding| encoding.eq_ignore_ascii_case("base64"))
}

fn parse_secondary(filename: &str, bytes: &[u8]) -> Result<EmailRecord> {
    let parsed = mailparse::parse_mail(bytes)
        .map_err(|e| MailDigestError::Parse(format!("Fallback parser failed: {}", e)))?;
    let headers = &parsed.headers;

    Ok(EmailRecord {
        sender: FieldValue::from(headers.get_first_value("From")).normalize(),
        subject: FieldValue::from(headers.get_first_value("Subject")).normalize(),
        date: FieldValue::texts(headers.get_all_values("Date")).normalize(),
        recipients: FieldValue::from(headers.get_first_value("To")).normalize(),
        cc: FieldValue::from(headers.get_first_value("Cc")).normalize(),
        body: secondary_body(&parsed).into_text(),
        attachments: secondary_attachments(&parsed),
        source_filename: filename.to_string(),
    })
}

fn is_attachment(part: &ParsedMail<'_>) -> bool {
    part.get_content_disposition().disposition == DispositionType::Attachment
}

fn secondary_body(parsed: &ParsedMail<'_>) -> BodyShape {
    let mut plain = Vec::new();
    let mut html = Vec::new();

    for part in parsed.parts().filter(|part| !is_attachment(part)) {
        let target = match part.ctype.mimetype.as_str() {
            "text/plain" => &mut plain,
            "text/html" => &mut html,
            _ => continue,
        };
        match part.get_body() {
            Ok(text) => target.push(text),
            Err(e) => debug!(error = %e, "Skipping undecodable body part"),
        }
    }

    BodyShape::classify(plain, html, || {
        if parsed.ctype.mimetype.starts_with("multipart/") {
            None
        } else {
            parsed.get_body().ok().filter(|body| !body.trim().is_empty())
        }
    })
}

fn secondary_attachments(parsed: &ParsedMail<'_>) -> Vec<AttachmentRecord> {
    let mut attachments = Vec::new();

    for part in parsed.parts().filter(|part| is_attachment(part)) {
        let disposition = part.get_content_disposition();
        let filename = disposition
            .params
            .get("filename")
            .or_else(|| part.ctype.params.get("name"))
            .cloned()
            .unwrap_or_else(|| DEFAULT_ATTACHMENT_NAME.to_string());

        let content = match part.get_body_raw() {
            Ok(content) if !content.is_empty() => content,
            Ok(_) => continue,
            Err(e) => {
                debug!(file = %filename, error = %e, "Skipping undecodable attachment");
                continue;
            }
        };

        let content_type = if part.ctype.mimetype.is_empty() {
            guess_content_type(&filename)
        } else {
            part.ctype.mimetype.to_lowercase()
        };

        attachments.push(AttachmentRecord {
            filename,
            content: Bytes::from(content),
            content_type,
        });
    }

    attachments
}

/// Guess a content type from the file name, defaulting to octet-stream.
fn guess_content_type(filename: &str) -> String {
    mime_guess::from_path(filename)
        .first()
        .map(|mime| mime.essence_str().to_string())
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string())
}
