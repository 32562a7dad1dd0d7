use anyhow::{Context, Result};
use regex::Regex;

use super::normalize::collapse_whitespace;
use super::types::Chunk;

#[derive(Debug)]
pub struct ReferenceExtractor {
    cross_reference: Regex,
}

impl ReferenceExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            cross_reference: Regex::new(
                r"(?i)\b(?:see|refer\s+to)\s+(?:section|clause)\s+(?:\d+[a-z]?|[a-z]{1,3}-?\d+|[ivx]{1,5}|[a-z])(?:[.\-][0-9a-z]+)*\b",
            )
            .context("failed to compile cross-reference regex")?,
        })
    }

    pub fn references(&self, text: &str) -> Vec<String> {
        self.cross_reference
            .find_iter(text)
            .map(|found| collapse_whitespace(found.as_str()))
            .collect()
    }

    /// Replaces `metadata.references` on every chunk. Chunks without a match
    /// end up with an empty list.
    pub fn apply(&self, chunks: &mut [Chunk]) -> usize {
        let mut total = 0usize;
        for chunk in chunks.iter_mut() {
            chunk.metadata.references = self.references(&chunk.chunk_text);
            total += chunk.metadata.references.len();
        }
        total
    }
}
