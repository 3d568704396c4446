pub mod config;
pub mod docx;
pub mod email;
pub mod error;
pub mod extractor;
pub mod html;
pub mod image;
pub mod llm;
pub mod model;
pub mod normalize;
pub mod pdf;
pub mod prompts;
pub mod summarize;
pub mod text;
pub mod tokenizer;

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use config::Config;
use email::EmailIngestor;
use error::{MailDigestError, Result};
use extractor::AttachmentExtractor;

// Re-export key types
pub use extractor::{AttachmentFormat, TextExtractor};
pub use image::{OcrEngine, TesseractOcr};
pub use llm::{
    EmbeddingModel, GenerationParams, LlmConfig, LlmWrapper, MockBehavior, MockEmbedder,
    MockModel, Seq2SeqModel,
};
pub use model::{
    AttachmentRecord, DocumentSummary, EmailMetadata, EmailRecord, ExtractedDocument,
    ProcessingResult, SummaryRecord,
};
pub use summarize::{ModelHandles, SummaryEngine};
pub use tokenizer::{Encoding, Tokenizer, WordTokenizer};

/// Name of the aggregate results file written by [`MailDigest::process_folder`].
pub const RESULTS_FILE: &str = "processing_results.json";

/// File name of one email's summary.
pub fn summary_file_name(source_filename: &str) -> String {
    format!("summary_{}.json", source_filename)
}

/// Main interface: ingest a folder of emails, extract their attachments and
/// summarize each email.
pub struct MailDigest {
    ingestor: EmailIngestor,
    extractor: AttachmentExtractor,
    engine: SummaryEngine,
    pretty: bool,
}

impl MailDigest {
    /// Build every component from configuration. Model construction happens
    /// here, once; an unavailable model leaves the engine heuristic-only.
    pub fn new(config: &Config) -> Self {
        Self {
            ingestor: EmailIngestor::with_extensions(config.ingest.extensions.iter().cloned()),
            extractor: AttachmentExtractor::with_ocr(Arc::new(
                TesseractOcr::default().with_timeout(config.limits.extraction_timeout()),
            ))
            .with_timeout(config.limits.extraction_timeout()),
            engine: SummaryEngine::from_config(config),
            pretty: config.output.pretty,
        }
    }

    /// Assemble from prebuilt components (custom OCR, test models).
    pub fn with_components(
        ingestor: EmailIngestor,
        extractor: AttachmentExtractor,
        engine: SummaryEngine,
    ) -> Self {
        Self {
            ingestor,
            extractor,
            engine,
            pretty: true,
        }
    }

    /// Indent the JSON output.
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    pub fn ingestor(&self) -> &EmailIngestor {
        &self.ingestor
    }

    pub fn extractor(&self) -> &AttachmentExtractor {
        &self.extractor
    }

    pub fn engine(&self) -> &SummaryEngine {
        &self.engine
    }

    /// Extract the attachments of one email and summarize it. Never fails:
    /// problems surface as dropped attachments or fallback summaries.
    pub async fn process_email(&self, email: &EmailRecord) -> SummaryRecord {
        let documents = self.extractor.extract_all(&email.attachments).await;
        info!(
            file = %email.source_filename,
            attachments = email.attachments.len(),
            documents = documents.len(),
            "Extracted attachments"
        );
        self.engine.summarize(email, &documents).await
    }

    /// Process every email in `email_dir` in order, writing one
    /// `summary_<file>.json` per email and [`RESULTS_FILE`] to `output_dir`.
    ///
    /// A missing `email_dir` is created and yields no results. Only failure
    /// to create `output_dir` or to write the aggregate file is an error; an
    /// email whose summary cannot be written is logged and left out.
    pub async fn process_folder(
        &self,
        email_dir: &Path,
        output_dir: &Path,
    ) -> Result<Vec<ProcessingResult>> {
        fs::create_dir_all(output_dir).map_err(|e| MailDigestError::io(output_dir, e))?;

        let emails = self.ingestor.ingest_folder(email_dir);
        if emails.is_empty() {
            warn!(dir = %email_dir.display(), "No emails found");
        }

        let mut results = Vec::with_capacity(emails.len());
        for (index, email) in emails.iter().enumerate() {
            info!(
                file = %email.source_filename,
                progress = %format!("{}/{}", index + 1, emails.len()),
                "Processing email"
            );
            let summary = self.process_email(email).await;

            let output_file = summary_file_name(&email.source_filename);
            if let Err(e) = self.write_json(&output_dir.join(&output_file), &summary) {
                error!(file = %email.source_filename, error = %e, "Failed to write summary");
                continue;
            }

            results.push(ProcessingResult {
                email_filename: email.source_filename.clone(),
                summary,
                output_file,
            });
        }

        let results_file = output_dir.join(RESULTS_FILE);
        self.write_json(&results_file, &results)?;
        info!(
            processed = results.len(),
            results = %results_file.display(),
            "Finished processing folder"
        );

        Ok(results)
    }

    fn write_json<T: Serialize + ?Sized>(&self, path: &Path, value: &T) -> Result<()> {
        let json = if self.pretty {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        };
        fs::write(path, json).map_err(|e| MailDigestError::io(path, e))
    }
}
