//! Model abstractions for generative summarization.
//!
//! The summarization engine talks to two capabilities, both optional:
//! a [`Seq2SeqModel`] that turns a tokenized input into a summary, and an
//! [`EmbeddingModel`]. [`LlmWrapper`] and [`RigEmbedder`] provide both over
//! ANY rig-core provider (OpenAI, OpenRouter, Anthropic, a local gateway).
//!
//! # Example
//! ```ignore
//! use rig::client::CompletionClient;
//! use rig::providers::openrouter;
//! use maildigest::llm::{LlmWrapper, LlmConfig};
//!
//! let client = openrouter::Client::builder(&api_key).build();
//! let model = client.completion_model("mistralai/mistral-7b-instruct");
//! let llm = LlmWrapper::with_config(model, LlmConfig::default().with_temperature(0.0));
//! ```

use async_trait::async_trait;
use rig::{
    completion::{AssistantContent, CompletionModel},
    embeddings::EmbeddingModel as RigEmbeddingModel,
    OneOrMany,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::LimitsConfig;
use crate::error::{MailDigestError, Result};
use crate::prompts::{render_summary_prompt, DEFAULT_SUMMARY_PROMPT};
use crate::tokenizer::Encoding;

/// Decoding settings for one generation call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub min_length: usize,
    pub max_length: usize,
    pub num_beams: usize,
    pub early_stopping: bool,
    /// Values above 1.0 favour shorter outputs under beam search.
    pub length_penalty: f64,
    pub do_sample: bool,
}

impl GenerationParams {
    /// Derive generation bounds from the actual tokenized input length.
    ///
    /// A fixed `(min, max)` pair breaks as soon as the input is shorter than
    /// the requested minimum, so the minimum shrinks to a third of the input
    /// (at least 1) and the maximum grows to the input length plus 20.
    /// The result always has `min_length <= max_length`.
    pub fn reconcile(
        input_len: usize,
        requested_min: usize,
        requested_max: usize,
        limits: &LimitsConfig,
    ) -> Self {
        Self {
            min_length: requested_min.min((input_len / 3).max(1)),
            max_length: requested_max.max(input_len + 20),
            num_beams: limits.num_beams,
            early_stopping: true,
            length_penalty: limits.length_penalty,
            do_sample: false,
        }
    }
}

/// A sequence-to-sequence summarizer.
#[async_trait]
pub trait Seq2SeqModel: Send + Sync {
    /// Generate a summary for `input`. The returned text has special tokens
    /// removed but is otherwise undecorated; it may be empty.
    async fn generate(&self, input: &Encoding, params: &GenerationParams) -> Result<String>;

    /// Identifier for logs.
    fn name(&self) -> &str {
        "seq2seq"
    }
}

/// A text embedding model.
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f64>>;

    fn dimensions(&self) -> usize;
}

/// Configuration for LLM-backed generation.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// System prompt template; see [`render_summary_prompt`]
    pub summary_prompt: String,
    /// Only used when a call asks for sampling; greedy/beam calls run at 0.0
    pub temperature: f64,
    /// Upper bound on `max_tokens` regardless of the reconciled maximum
    pub max_tokens_cap: Option<u64>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            summary_prompt: DEFAULT_SUMMARY_PROMPT.to_string(),
            temperature: 0.0,
            max_tokens_cap: None,
        }
    }
}

impl LlmConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_summary_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.summary_prompt = prompt.into();
        self
    }

    pub fn with_temperature(mut self, temp: f64) -> Self {
        self.temperature = temp;
        self
    }

    pub fn with_max_tokens_cap(mut self, tokens: Option<u64>) -> Self {
        self.max_tokens_cap = tokens;
        self
    }
}

/// Summarizer over any rig-core `CompletionModel`.
///
/// The reconciled bounds are passed both as `max_tokens` and in the system
/// prompt, since chat models have no notion of a minimum length.
pub struct LlmWrapper<M: CompletionModel> {
    model: Arc<M>,
    name: String,
    config: LlmConfig,
}

impl<M: CompletionModel> LlmWrapper<M> {
    pub fn new(model: M) -> Self {
        Self::with_config(model, LlmConfig::default())
    }

    pub fn with_config(model: M, config: LlmConfig) -> Self {
        Self {
            model: Arc::new(model),
            name: "llm".to_string(),
            config,
        }
    }

    /// Name reported in logs, typically the provider model id.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    fn max_tokens(&self, params: &GenerationParams) -> u64 {
        let requested = params.max_length as u64;
        match self.config.max_tokens_cap {
            Some(cap) => requested.min(cap),
            None => requested,
        }
    }
}

#[async_trait]
impl<M: CompletionModel + Send + Sync + 'static> Seq2SeqModel for LlmWrapper<M> {
    async fn generate(&self, input: &Encoding, params: &GenerationParams) -> Result<String> {
        let preamble = render_summary_prompt(
            &self.config.summary_prompt,
            params.min_length,
            params.max_length,
        );
        let temperature = if params.do_sample {
            self.config.temperature
        } else {
            0.0
        };

        let request = self
            .model
            .completion_request(input.text())
            .preamble(preamble)
            .temperature(temperature)
            .max_tokens(self.max_tokens(params))
            .build();

        let response = self
            .model
            .completion(request)
            .await
            .map(|r| extract_text_from_response(&r.choice))
            .map_err(|e| MailDigestError::Model(format!("LLM error: {}", e)))?;

        Ok(detect_and_truncate_repetition(&response))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Embeddings over any rig-core `EmbeddingModel`.
pub struct RigEmbedder<E: RigEmbeddingModel> {
    model: E,
}

impl<E: RigEmbeddingModel> RigEmbedder<E> {
    pub fn new(model: E) -> Self {
        Self { model }
    }
}

#[async_trait]
impl<E: RigEmbeddingModel + 'static> EmbeddingModel for RigEmbedder<E> {
    async fn embed(&self, text: &str) -> Result<Vec<f64>> {
        let embedding = self
            .model
            .embed_text(text)
            .await
            .map_err(|e| MailDigestError::Model(format!("Embedding error: {}", e)))?;
        Ok(embedding.vec)
    }

    fn dimensions(&self) -> usize {
        self.model.ndims()
    }
}

/// Extract text content from assistant response
fn extract_text_from_response(content: &OneOrMany<AssistantContent>) -> String {
    content
        .iter()
        .filter_map(|c| match c {
            AssistantContent::Text(text) => Some(text.text.clone()),
            AssistantContent::Reasoning(_) => None,
            AssistantContent::ToolCall(_) => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Cut degenerate output where the model got stuck repeating itself.
///
/// Summaries are short, so a 20+ character chunk occurring three times or a
/// sentence repeated back to back is treated as a loop and only its first
/// occurrence is kept.
fn detect_and_truncate_repetition(text: &str) -> String {
    let text = text.trim();
    if text.len() < 120 {
        return text.to_string();
    }

    // Helper to find nearest char boundary at or before position
    fn find_char_boundary(s: &str, pos: usize) -> usize {
        if pos >= s.len() {
            return s.len();
        }
        let mut idx = pos;
        while idx > 0 && !s.is_char_boundary(idx) {
            idx -= 1;
        }
        idx
    }

    // Strategy 1: sample fixed-size windows and count their occurrences
    for &window_size in &[20, 40, 60] {
        if text.len() <= window_size * 3 {
            continue;
        }
        let sample_count = 8.min(text.len() / window_size);
        for i in 0..sample_count {
            let start = find_char_boundary(text, (text.len() / sample_count) * i);
            let end = find_char_boundary(text, start + window_size);
            if start >= end {
                continue;
            }
            let sample = &text[start..end];
            if sample.chars().filter(|c| !c.is_whitespace()).count() < sample.len() / 3 {
                continue;
            }
            if text.matches(sample).count() >= 3 {
                // Keep one period of the loop: cut where the second copy starts
                if let Some(first_pos) = text.find(sample) {
                    let after_first = first_pos + sample.len();
                    if let Some(offset) = text[after_first..].find(sample) {
                        return text[..after_first + offset].trim_end().to_string();
                    }
                }
            }
        }
    }

    // Strategy 2: the same sentence twice in a row
    let sentences: Vec<&str> = text.split_inclusive('.').collect();
    let mut kept: Vec<&str> = Vec::with_capacity(sentences.len());
    for sentence in sentences {
        if let Some(last) = kept.last() {
            if last.trim() == sentence.trim() && sentence.trim().len() >= 10 {
                return kept.concat().trim_end().to_string();
            }
        }
        kept.push(sentence);
    }

    text.to_string()
}

/// What a [`MockModel`] does when asked to generate.
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Return this text
    Fixed(String),
    /// Return only whitespace
    Empty,
    /// Return an error
    Fail,
    /// Panic inside the call
    Panic,
    /// Never complete within a reasonable timeout
    Hang,
}

/// A scripted summarizer for tests. Records every call it receives.
pub struct MockModel {
    behavior: MockBehavior,
    calls: Mutex<Vec<(String, GenerationParams)>>,
}

impl MockModel {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn fixed(response: impl Into<String>) -> Self {
        Self::new(MockBehavior::Fixed(response.into()))
    }

    /// Input text and parameters of every call so far.
    pub fn calls(&self) -> Vec<(String, GenerationParams)> {
        match self.calls.lock() {
            Ok(calls) => calls.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn record(&self, input: &Encoding, params: &GenerationParams) {
        let mut calls = match self.calls.lock() {
            Ok(calls) => calls,
            Err(poisoned) => poisoned.into_inner(),
        };
        calls.push((input.text().to_string(), params.clone()));
    }
}

impl Default for MockModel {
    fn default() -> Self {
        Self::fixed("A mock summary.")
    }
}

#[async_trait]
impl Seq2SeqModel for MockModel {
    async fn generate(&self, input: &Encoding, params: &GenerationParams) -> Result<String> {
        self.record(input, params);
        match &self.behavior {
            MockBehavior::Fixed(response) => Ok(response.clone()),
            MockBehavior::Empty => Ok("  \n ".to_string()),
            MockBehavior::Fail => Err(MailDigestError::Model("mock failure".to_string())),
            MockBehavior::Panic => panic!("mock model panicked"),
            MockBehavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(String::new())
            }
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Constant-vector embedder for tests.
pub struct MockEmbedder {
    pub dimensions: usize,
}

#[async_trait]
impl EmbeddingModel for MockEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f64>> {
        Ok(vec![0.0; self.dimensions])
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Type alias for a summarizer that can be shared across threads
pub type SharedSeq2SeqModel = Arc<dyn Seq2SeqModel>;

/// Type alias for an embedder that can be shared across threads
pub type SharedEmbeddingModel = Arc<dyn EmbeddingModel>;
