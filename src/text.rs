use crate::error::Result;
use crate::extractor::TextExtractor;

/// Decode UTF-8, silently dropping invalid byte sequences.
pub fn decode_utf8_lossy(bytes: &[u8]) -> String {
    bytes.utf8_chunks().map(|chunk| chunk.valid()).collect()
}

pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract_text(&self, content: &[u8]) -> Result<String> {
        Ok(decode_utf8_lossy(content).trim().to_string())
    }
}
