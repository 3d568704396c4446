//! Fixtures shared by the integration tests. Everything is built in code.
#![allow(dead_code)]

use std::sync::Arc;

use base64::prelude::*;
use docx_rust::{document::Paragraph, Docx};
use maildigest::error::Result;
use maildigest::extractor::AttachmentExtractor;
use maildigest::OcrEngine;
use tempfile::TempDir;

/// Minimal PNG signature; enough for content sniffing.
pub const PNG_HEADER: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52,
];

/// OCR stand-in returning fixed text.
pub struct FixedOcr(pub &'static str);

impl OcrEngine for FixedOcr {
    fn recognize(&self, _image: &[u8], _extension: &str) -> Result<String> {
        Ok(self.0.to_string())
    }
}

/// Extractor set that never shells out to tesseract.
pub fn extractor_with_ocr(text: &'static str) -> AttachmentExtractor {
    AttachmentExtractor::with_ocr(Arc::new(FixedOcr(text)))
}

/// A one-page PDF with no content stream, like a blank scan.
pub fn blank_pdf() -> Vec<u8> {
    build_pdf(vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Resources << >> >>".to_string(),
    ])
}

/// A PDF with one Helvetica text line per page; empty strings give pages
/// with an empty content stream.
pub fn text_pdf(pages: &[&str]) -> Vec<u8> {
    let kids: Vec<String> = (0..pages.len())
        .map(|i| format!("{} 0 R", 4 + 2 * i))
        .collect();

    let mut objects = vec![
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            kids.join(" "),
            pages.len()
        ),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
    ];
    for (i, text) in pages.iter().enumerate() {
        let stream = if text.is_empty() {
            String::new()
        } else {
            format!("BT /F1 24 Tf 72 720 Td ({}) Tj ET", text)
        };
        objects.push(format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
/Resources << /Font << /F1 3 0 R >> >> /Contents {} 0 R >>",
            5 + 2 * i
        ));
        objects.push(format!(
            "<< /Length {} >>\nstream\n{}\nendstream",
            stream.len(),
            stream
        ));
    }
    build_pdf(objects)
}

/// Number the objects from 1 and append a matching xref table.
fn build_pdf(objects: Vec<String>) -> Vec<u8> {
    let mut pdf = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }

    let xref = pdf.len();
    pdf.extend_from_slice(
        format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes(),
    );
    for offset in offsets {
        pdf.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    pdf.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref
        )
        .as_bytes(),
    );
    pdf
}

/// A DOCX with the given paragraphs; empty strings become empty paragraphs.
pub fn docx_bytes(paragraphs: &[&str]) -> Vec<u8> {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("fixture.docx");

    let mut docx = Docx::default();
    for text in paragraphs {
        let paragraph = if text.is_empty() {
            Paragraph::default()
        } else {
            Paragraph::default().push_text(*text)
        };
        docx.document.push(paragraph);
    }
    docx.write_file(&path).expect("write docx");

    std::fs::read(&path).expect("read docx")
}

/// A multipart/mixed message with a plain body and base64 attachments.
pub fn email_with_attachments(
    subject: &str,
    body: &str,
    attachments: &[(&str, &str, &[u8])],
) -> String {
    let mut raw = format!(
        "From: \"Ops Desk\" <ops@example.com>\r\n\
To: team@example.com\r\n\
Subject: {}\r\n\
Date: Thu, 4 Jan 2024 08:15:00 +0000\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/mixed; boundary=\"BOUNDARY\"\r\n\
\r\n\
--BOUNDARY\r\n\
Content-Type: text/plain; charset=utf-8\r\n\
\r\n\
{}\r\n",
        subject, body
    );
    for (content_type, filename, content) in attachments {
        raw.push_str(&format!(
            "--BOUNDARY\r\n\
Content-Type: {}; name=\"{}\"\r\n\
Content-Disposition: attachment; filename=\"{}\"\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
{}\r\n",
            content_type,
            filename,
            filename,
            BASE64_STANDARD.encode(content)
        ));
    }
    raw.push_str("--BOUNDARY--\r\n");
    raw
}
