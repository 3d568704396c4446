//! Summarization engine.
//!
//! Every email gets a [`SummaryRecord`]. When a generative model is available
//! the email and each document are summarized abstractively; otherwise, or
//! when a call fails or panics, the first sentences of the text are used
//! instead. The engine never returns an error: a panic escaping the record
//! is answered with a placeholder record of the same shape.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use rig::client::{CompletionClient, EmbeddingsClient};
use rig::providers::{openai, openrouter};
use tracing::{debug, error, info, warn};

use crate::config::{Config, LimitsConfig, ModelConfig};
use crate::error::{MailDigestError, Result};
use crate::llm::{
    GenerationParams, LlmConfig, LlmWrapper, RigEmbedder, SharedEmbeddingModel,
    SharedSeq2SeqModel,
};
use crate::model::{DocumentSummary, EmailMetadata, EmailRecord, ExtractedDocument, SummaryRecord};
use crate::prompts::SUMMARY_PREFIX;
use crate::tokenizer::{Tokenizer, WordTokenizer};

pub const MINIMAL_EMAIL_SUMMARY: &str = "Email contains minimal content or could not be processed.";
pub const MINIMAL_DOCUMENT_SUMMARY: &str =
    "Document contains minimal text or could not be processed.";
pub const NO_CONTENT_SUMMARY: &str = "No meaningful content to summarize.";
pub const NO_ENTITIES: &str = "No entities found";
pub const NO_KEYWORDS: &str = "No significant keywords found";

pub const FALLBACK_EMAIL_SUMMARY: &str =
    "Basic email information extracted (AI processing unavailable)";
pub const FALLBACK_DOCUMENT_SUMMARY: &str = "Document processed (AI summary unavailable)";
pub const FALLBACK_ENTITIES: &str = "Processing completed with basic extraction";

/// Texts shorter than this (trimmed, in characters) are not summarized.
const MIN_CONTENT_CHARS: usize = 10;
/// Character budget of the heuristic summary.
const HEURISTIC_CHAR_BUDGET: usize = 200;
const HEURISTIC_MAX_SENTENCES: usize = 3;
const MAX_ENTITIES: usize = 10;
const DEFAULT_MODEL_TIMEOUT: Duration = Duration::from_secs(120);

/// The optional model capabilities. Each is built at most once; a handle
/// that could not be built stays `None` for the engine's lifetime.
#[derive(Clone, Default)]
pub struct ModelHandles {
    pub tokenizer: Option<Arc<dyn Tokenizer>>,
    pub generator: Option<SharedSeq2SeqModel>,
    pub embedder: Option<SharedEmbeddingModel>,
}

impl ModelHandles {
    /// No models: heuristic summaries only.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn new(tokenizer: Arc<dyn Tokenizer>, generator: SharedSeq2SeqModel) -> Self {
        Self {
            tokenizer: Some(tokenizer),
            generator: Some(generator),
            embedder: None,
        }
    }

    pub fn with_embedder(mut self, embedder: SharedEmbeddingModel) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Build the handles for the configured provider. API keys are read
    /// from `OPENAI_API_KEY` / `OPENROUTER_API_KEY`; a missing key or an
    /// unknown provider is logged and leaves the engine heuristic-only.
    pub fn from_config(config: &ModelConfig) -> Self {
        let llm_config = LlmConfig::default().with_temperature(config.temperature);

        match config.provider.trim().to_ascii_lowercase().as_str() {
            "" | "none" => {
                info!("No model provider configured, using heuristic summaries");
                Self::none()
            }
            "openai" => {
                let Some(api_key) = api_key("OPENAI_API_KEY") else {
                    return Self::none();
                };
                let client = openai::Client::new(&api_key);
                let model = client.completion_model(&config.model);
                let generator = LlmWrapper::with_config(model, llm_config).with_name(&config.model);

                let mut handles = Self::new(Arc::new(WordTokenizer), Arc::new(generator));
                if let Some(name) = &config.embedding_model {
                    let embedder = RigEmbedder::new(client.embedding_model(name));
                    handles = handles.with_embedder(Arc::new(embedder));
                }
                handles
            }
            "openrouter" => {
                let Some(api_key) = api_key("OPENROUTER_API_KEY") else {
                    return Self::none();
                };
                let client = match std::env::var("OPENROUTER_ENDPOINT") {
                    Ok(endpoint) if !endpoint.trim().is_empty() => {
                        openrouter::Client::builder(&api_key)
                            .base_url(endpoint.trim_end_matches('/'))
                            .build()
                    }
                    _ => openrouter::Client::builder(&api_key).build(),
                };
                let model = client.completion_model(&config.model);
                let generator = LlmWrapper::with_config(model, llm_config).with_name(&config.model);

                if config.embedding_model.is_some() {
                    warn!("OpenRouter has no embedding endpoint, embeddings disabled");
                }
                Self::new(Arc::new(WordTokenizer), Arc::new(generator))
            }
            other => {
                warn!(provider = %other, "Unknown model provider, using heuristic summaries");
                Self::none()
            }
        }
    }
}

fn api_key(var: &str) -> Option<String> {
    match std::env::var(var) {
        Ok(key) if !key.trim().is_empty() => Some(key),
        _ => {
            warn!(variable = var, "API key not set, using heuristic summaries");
            None
        }
    }
}

/// Produces one [`SummaryRecord`] per email.
pub struct SummaryEngine {
    handles: ModelHandles,
    limits: LimitsConfig,
    model_timeout: Duration,
}

impl SummaryEngine {
    pub fn new(handles: ModelHandles, limits: LimitsConfig) -> Self {
        info!(
            generative = handles.generator.is_some() && handles.tokenizer.is_some(),
            embeddings = handles.embedder.is_some(),
            "Summarization engine ready"
        );
        Self {
            handles,
            limits,
            model_timeout: DEFAULT_MODEL_TIMEOUT,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(ModelHandles::from_config(&config.model), config.limits.clone())
            .with_model_timeout(config.model.timeout())
    }

    /// Heuristic summaries only.
    pub fn heuristic(limits: LimitsConfig) -> Self {
        Self::new(ModelHandles::none(), limits)
    }

    /// Wall-clock budget for one generation call.
    pub fn with_model_timeout(mut self, timeout: Duration) -> Self {
        self.model_timeout = timeout;
        self
    }

    pub fn is_generative(&self) -> bool {
        self.handles.tokenizer.is_some() && self.handles.generator.is_some()
    }

    pub fn has_embeddings(&self) -> bool {
        self.handles.embedder.is_some()
    }

    pub fn limits(&self) -> &LimitsConfig {
        &self.limits
    }

    /// Summarize one email and its extracted documents. Never fails.
    pub async fn summarize(
        &self,
        email: &EmailRecord,
        documents: &[ExtractedDocument],
    ) -> SummaryRecord {
        match AssertUnwindSafe(self.build_record(email, documents))
            .catch_unwind()
            .await
        {
            Ok(record) => record,
            Err(panic) => {
                error!(
                    file = %email.source_filename,
                    error = %panic_message(&*panic),
                    "Summarization failed, using fallback summary"
                );
                fallback_record(email, documents)
            }
        }
    }

    async fn build_record(
        &self,
        email: &EmailRecord,
        documents: &[ExtractedDocument],
    ) -> SummaryRecord {
        let email_summary = self.summarize_email(email).await;
        let document_summaries = self.summarize_documents(documents).await;
        let key_entities = extract_entities(email, documents);

        SummaryRecord {
            email_metadata: EmailMetadata::from(email),
            email_summary,
            document_summaries,
            key_entities,
            total_attachments: email.attachments.len(),
            processed_documents: documents.len(),
        }
    }

    /// Summary of subject and body.
    ///
    /// Only the subject and body themselves count towards the minimal
    /// content check, not the `Subject:`/`Body:` labels.
    pub async fn summarize_email(&self, email: &EmailRecord) -> String {
        let content_chars =
            email.subject.trim().chars().count() + email.body.trim().chars().count();
        if content_chars < MIN_CONTENT_CHARS {
            return MINIMAL_EMAIL_SUMMARY.to_string();
        }

        let text = format!("Subject: {}\n\nBody: {}", email.subject, email.body);
        self.summarize_text(
            &text,
            self.limits.email_min_length,
            self.limits.email_max_length,
        )
        .await
    }

    /// One entry per document, in order.
    pub async fn summarize_documents(
        &self,
        documents: &[ExtractedDocument],
    ) -> Vec<DocumentSummary> {
        let mut summaries = Vec::with_capacity(documents.len());
        for document in documents {
            let text = &document.extracted_text;
            let significant = text.chars().filter(|c| !c.is_whitespace()).count();

            let summary = if significant > MIN_CONTENT_CHARS {
                self.summarize_text(
                    text,
                    self.limits.document_min_length,
                    self.limits.document_max_length,
                )
                .await
            } else {
                MINIMAL_DOCUMENT_SUMMARY.to_string()
            };

            summaries.push(DocumentSummary {
                filename: document.filename.clone(),
                content_type: document.content_type.clone(),
                summary,
                word_count: text.split_whitespace().count(),
            });
        }
        summaries
    }

    /// Generative summary when a model is available, heuristic otherwise.
    /// A failed, panicking, timed out or empty generation falls back to the
    /// heuristic summary of the same text.
    pub async fn summarize_text(&self, text: &str, min_length: usize, max_length: usize) -> String {
        let (Some(tokenizer), Some(generator)) = (&self.handles.tokenizer, &self.handles.generator)
        else {
            return heuristic_summary(text);
        };

        let generated = AssertUnwindSafe(self.generate(
            tokenizer.as_ref(),
            generator,
            text,
            min_length,
            max_length,
        ))
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| {
            Err(MailDigestError::Model(format!(
                "generation panicked: {}",
                panic_message(&*panic)
            )))
        });

        match generated {
            Ok(summary) if !summary.trim().is_empty() => summary.trim().to_string(),
            Ok(_) => {
                debug!(
                    model = generator.name(),
                    "Model returned an empty summary, using heuristic"
                );
                heuristic_summary(text)
            }
            Err(e) => {
                warn!(
                    model = generator.name(),
                    error = %e,
                    "Generation failed, using heuristic summary"
                );
                heuristic_summary(text)
            }
        }
    }

    async fn generate(
        &self,
        tokenizer: &dyn Tokenizer,
        generator: &SharedSeq2SeqModel,
        text: &str,
        min_length: usize,
        max_length: usize,
    ) -> Result<String> {
        let input = format!(
            "{}{}",
            SUMMARY_PREFIX,
            truncate_chars(text, self.limits.max_input_chars)
        );
        let encoding = tokenizer.encode(&input, self.limits.max_input_tokens)?;
        let params =
            GenerationParams::reconcile(encoding.len(), min_length, max_length, &self.limits);
        debug!(
            input_tokens = encoding.len(),
            min_length = params.min_length,
            max_length = params.max_length,
            "Generating summary"
        );

        tokio::time::timeout(self.model_timeout, generator.generate(&encoding, &params))
            .await
            .map_err(|_| MailDigestError::Timeout(self.model_timeout))?
    }
}

/// Keep at most `max_chars` characters, marking a cut with `...`.
fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Extractive summary: the first three non-empty sentences, stopping early
/// once they exceed 200 characters, or a 200 character prefix when the text
/// has no sentences.
pub fn heuristic_summary(text: &str) -> String {
    if text.trim().chars().count() < MIN_CONTENT_CHARS {
        return NO_CONTENT_SUMMARY.to_string();
    }

    let mut sentences: Vec<&str> = Vec::with_capacity(HEURISTIC_MAX_SENTENCES);
    for sentence in text.split('.') {
        if sentences.len() == HEURISTIC_MAX_SENTENCES {
            break;
        }
        let sentence = sentence.trim();
        if !sentence.is_empty() {
            sentences.push(sentence);
        }
        if sentences.join(" ").chars().count() > HEURISTIC_CHAR_BUDGET {
            break;
        }
    }

    if !sentences.is_empty() {
        return format!("{}.", sentences.join(". "));
    }

    match text.char_indices().nth(HEURISTIC_CHAR_BUDGET) {
        Some((cut, _)) => format!("{}...", text[..cut].trim()),
        None => text.trim().to_string(),
    }
}

/// The ten most frequent keywords of the body and all document texts.
///
/// Keywords are lower-cased whitespace tokens longer than three characters
/// made only of letters. Ties keep the order of first appearance. There is
/// no stop-word list, so common words such as `this` or `with` rank high.
/// Empty input yields `["No entities found"]` and input without a single
/// keyword `["No significant keywords found"]`, never an empty list.
pub fn extract_entities(email: &EmailRecord, documents: &[ExtractedDocument]) -> Vec<String> {
    let mut all_text = String::new();
    for text in std::iter::once(&email.body).chain(documents.iter().map(|d| &d.extracted_text)) {
        if !text.is_empty() {
            all_text.push_str(text);
            all_text.push(' ');
        }
    }

    if all_text.trim().is_empty() {
        return vec![NO_ENTITIES.to_string()];
    }

    let lowered = all_text.to_lowercase();
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for word in lowered.split_whitespace() {
        if word.chars().count() <= 3 || !word.chars().all(char::is_alphabetic) {
            continue;
        }
        match positions.get(word) {
            Some(&index) => counts[index].1 += 1,
            None => {
                positions.insert(word, counts.len());
                counts.push((word, 1));
            }
        }
    }

    if counts.is_empty() {
        return vec![NO_KEYWORDS.to_string()];
    }

    // Stable: equal counts stay in encounter order
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
        .into_iter()
        .take(MAX_ENTITIES)
        .map(|(word, _)| word.to_string())
        .collect()
}

/// Placeholder record with the regular schema, used when summarization
/// itself broke down.
pub fn fallback_record(email: &EmailRecord, documents: &[ExtractedDocument]) -> SummaryRecord {
    SummaryRecord {
        email_metadata: EmailMetadata::from(email),
        email_summary: FALLBACK_EMAIL_SUMMARY.to_string(),
        document_summaries: documents
            .iter()
            .map(|document| DocumentSummary {
                filename: document.filename.clone(),
                content_type: document.content_type.clone(),
                summary: FALLBACK_DOCUMENT_SUMMARY.to_string(),
                word_count: document.extracted_text.split_whitespace().count(),
            })
            .collect(),
        key_entities: vec![FALLBACK_ENTITIES.to_string()],
        total_attachments: email.attachments.len(),
        processed_documents: documents.len(),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
