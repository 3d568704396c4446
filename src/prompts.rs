//! Prompts for generative summarization.
//!
//! Seq2seq summarizers expect a task prefix on the input; chat-style models
//! additionally get a system prompt that pins the output to plain prose of a
//! bounded length.

/// Task prefix prepended to every text before tokenization.
pub const SUMMARY_PREFIX: &str = "summarize: ";

/// Default system prompt for abstractive summaries.
///
/// `{min_length}` and `{max_length}` are replaced with the reconciled
/// generation bounds (in tokens) before the request is sent.
pub const DEFAULT_SUMMARY_PROMPT: &str = r#"You are a summarization model. The user message is a task prefix followed by the text of an email or an email attachment.
Write an abstractive summary of that text:

- Between {min_length} and {max_length} tokens long; shorter is better when nothing is lost
- Plain prose only: no headings, lists, markdown or quotes
- Keep names, dates, amounts, reference numbers and requested actions
- Do not add information that is not in the text
- Do not mention that you are summarizing

Output ONLY the summary."#;

/// Fill the generation bounds into a summary prompt template.
pub fn render_summary_prompt(template: &str, min_length: usize, max_length: usize) -> String {
    template
        .replace("{min_length}", &min_length.to_string())
        .replace("{max_length}", &max_length.to_string())
}
