//! HTML to plain text reduction for message bodies and attachments.

use std::io::Cursor;
use std::sync::LazyLock;

use html2text::render::TrivialDecorator;
use regex::Regex;
use tracing::warn;

use crate::error::{MailDigestError, Result};

/// Line width handed to html2text; lines are re-joined afterwards so this
/// only needs to be wide enough to avoid splitting words.
const RENDER_WIDTH: usize = 400;

static TAG_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());

static LAZY_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<.*?>").unwrap());

static SCRIPT_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>").unwrap());

static STYLE_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<style\b[^>]*>.*?</style\s*>").unwrap());

const ENTITIES: [(&str, &str); 5] = [
    ("&nbsp;", " "),
    ("&amp;", "&"),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
];

/// Whether the text contains anything that looks like a markup tag.
pub fn is_html(text: &str) -> bool {
    TAG_PATTERN.is_match(text)
}

/// Reduce HTML to readable plain text. Never fails: if the structural
/// parser errors, tags are stripped with a regex instead.
pub fn html_to_text(html: &str) -> String {
    match render_text(html) {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "HTML parsing failed, stripping tags instead");
            strip_tags(html)
        }
    }
}

fn render_text(html: &str) -> Result<String> {
    let without_scripts = SCRIPT_BLOCK.replace_all(html, "");
    let cleaned = STYLE_BLOCK.replace_all(&without_scripts, "");

    // No heading, bullet or link decorations, and no link footnotes
    let rendered = html2text::from_read_with_decorator(
        Cursor::new(cleaned.as_bytes()),
        RENDER_WIDTH,
        TrivialDecorator::new(),
    )
    .map_err(|e| MailDigestError::Parse(format!("Failed to render HTML: {}", e)))?;

    Ok(collapse_layout(&rendered))
}

/// Flatten rendered layout into a single line: lines are trimmed, split on
/// double-space runs, and the non-empty fragments joined with one space.
fn collapse_layout(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .flat_map(|line| line.split("  "))
        .map(str::trim)
        .filter(|chunk| !chunk.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Regex fallback: drop tags, unescape a few common entities, collapse whitespace.
pub fn strip_tags(html: &str) -> String {
    let mut text = LAZY_TAG.replace_all(html, "").into_owned();
    for (entity, replacement) in ENTITIES {
        text = text.replace(entity, replacement);
    }
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
