//! Offline embedder based on the hashing trick.
//!
//! Used when no HuggingFace key is configured. Quality is far below a
//! sentence-transformer but it is deterministic, needs no network and shares
//! vocabulary-level similarity between queries and product descriptions.

use super::EmbeddingProvider;
use crate::error::Result;
use async_trait::async_trait;

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "for", "i", "in", "is", "it", "me", "my", "need", "of", "on", "or",
    "the", "to", "under", "want", "with",
];

#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        for token in tokenize(text) {
            let hash = crc32fast::hash(token.as_bytes());
            let bucket = hash as usize % self.dimension;
            // High bit picks the sign so collisions tend to cancel out
            let sign = if hash & 0x8000_0000 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        normalize(&mut vector);
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    async fn encode(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "hashing"
    }
}

/// Lowercase, split on non-alphanumeric, drop stop words and one-letter tokens.
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 1 && !STOP_WORDS.contains(w))
        .map(|w| w.to_string())
        .collect()
}

fn normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}
