//! OCR-based text extraction for JPEG, PNG and TIFF attachments.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::sync::Arc;
use std::time::Duration;

use tokio::process::Command;
use tokio::runtime::Handle;

use crate::error::{MailDigestError, Result};
use crate::extractor::TextExtractor;

/// Image types handed to OCR.
const OCR_MIME_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/tiff"];

const DEFAULT_OCR_TIMEOUT: Duration = Duration::from_secs(60);

/// Recognizes text in an encoded image.
pub trait OcrEngine: Send + Sync {
    /// `extension` names the image encoding (`jpg`, `png`, `tif`).
    fn recognize(&self, image: &[u8], extension: &str) -> Result<String>;
}

/// OCR through the `tesseract` command-line binary.
///
/// The child process is killed when it outlives `timeout`.
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    binary: PathBuf,
    language: Option<String>,
    timeout: Duration,
}

impl TesseractOcr {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            language: None,
            timeout: DEFAULT_OCR_TIMEOUT,
        }
    }

    /// Tesseract language code(s), e.g. `eng` or `eng+deu`.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn run(&self, image_path: &Path) -> Result<Output> {
        let mut command = Command::new(&self.binary);
        command
            .arg(image_path)
            .arg("stdout")
            .stdin(Stdio::null())
            .kill_on_drop(true);
        if let Some(language) = &self.language {
            command.arg("-l").arg(language);
        }

        // Dropping the pending output on timeout kills the child
        tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| MailDigestError::Timeout(self.timeout))?
            .map_err(|e| {
                MailDigestError::Extraction(format!(
                    "Failed to run {}: {}",
                    self.binary.display(),
                    e
                ))
            })
    }
}

impl Default for TesseractOcr {
    fn default() -> Self {
        Self::new("tesseract")
    }
}

impl OcrEngine for TesseractOcr {
    fn recognize(&self, image: &[u8], extension: &str) -> Result<String> {
        let mut file = tempfile::Builder::new()
            .prefix("maildigest-ocr-")
            .suffix(&format!(".{}", extension))
            .tempfile()?;
        file.write_all(image)?;
        file.flush()?;

        // Called from the blocking pool inside a runtime, or from plain
        // synchronous code with no runtime at all
        let output = match Handle::try_current() {
            Ok(handle) => handle.block_on(self.run(file.path()))?,
            Err(_) => tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?
                .block_on(self.run(file.path()))?,
        };

        if !output.status.success() {
            return Err(MailDigestError::Extraction(format!(
                "tesseract exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

pub struct ImageExtractor {
    ocr: Arc<dyn OcrEngine>,
}

impl ImageExtractor {
    pub fn new(ocr: Arc<dyn OcrEngine>) -> Self {
        Self { ocr }
    }
}

impl TextExtractor for ImageExtractor {
    fn extract_text(&self, content: &[u8]) -> Result<String> {
        // Sniff the bytes rather than trusting the declared type.
        let kind = infer::get(content)
            .filter(|kind| OCR_MIME_TYPES.contains(&kind.mime_type()))
            .ok_or_else(|| {
                MailDigestError::Extraction("Not a decodable JPEG, PNG or TIFF image".to_string())
            })?;

        let text = self.ocr.recognize(content, kind.extension())?;
        Ok(text.trim().to_string())
    }
}
