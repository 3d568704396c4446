use std::sync::LazyLock;

use regex::Regex;

use crate::error::Result;

/// End-of-sequence marker appended to every encoding.
pub const EOS_TOKEN: &str = "</s>";

static PRE_TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+|[^\w\s]").unwrap());

/// A tokenized model input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoding {
    tokens: Vec<String>,
    text: String,
}

impl Encoding {
    pub fn new(tokens: Vec<String>, text: impl Into<String>) -> Self {
        Self {
            tokens,
            text: text.into(),
        }
    }

    /// Sequence length, special tokens included
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// The part of the input covered by the kept tokens.
    pub fn text(&self) -> &str {
        &self.text
    }
}

pub trait Tokenizer: Send + Sync {
    /// Encode `text`, truncating to at most `max_tokens` tokens.
    fn encode(&self, text: &str, max_tokens: usize) -> Result<Encoding>;
}

/// Splits on word runs and single punctuation marks, then appends
/// [`EOS_TOKEN`]. Close enough to subword counts for bounding generation
/// lengths against remote models that tokenize server-side.
#[derive(Debug, Clone, Copy, Default)]
pub struct WordTokenizer;

impl Tokenizer for WordTokenizer {
    fn encode(&self, text: &str, max_tokens: usize) -> Result<Encoding> {
        if max_tokens == 0 {
            return Ok(Encoding::new(Vec::new(), ""));
        }

        let mut tokens = Vec::new();
        let mut covered = 0;
        for found in PRE_TOKEN.find_iter(text).take(max_tokens - 1) {
            tokens.push(found.as_str().to_string());
            covered = found.end();
        }
        tokens.push(EOS_TOKEN.to_string());

        Ok(Encoding::new(tokens, &text[..covered]))
    }
}
