//! Deterministic token-hash embedding provider.
//!
//! Produces dense vectors by splitting text into identifier sub-tokens,
//! hashing each into a fixed-dimension bucket, and weighting by term
//! frequency. Not as semantically rich as a neural model, but reproducible
//! everywhere and dependency-free, which makes it the provider of choice for
//! tests and air-gapped runs.

use std::collections::HashMap;

use super::{ensure_embeddable, Embedder, EmbeddingError};

pub struct TokenHashEmbedder {
    dimensions: usize,
}

impl TokenHashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    /// Hash a token into a bucket index using FNV-1a.
    fn bucket(token: &str, dims: usize) -> usize {
        let mut h: u64 = 0xcbf29ce484222325;
        for b in token.as_bytes() {
            h ^= *b as u64;
            h = h.wrapping_mul(0x100000001b3);
        }
        (h as usize) % dims
    }

    /// Splits text into lowercase sub-tokens. Underscores and punctuation
    /// both separate tokens, so `user_id` and `user id` embed identically.
    /// SQL aliases are mostly snake_case and should match the words inside
    /// the code they name.
    fn tokenize(text: &str) -> Vec<String> {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_lowercase())
            .collect()
    }

    fn vector(&self, text: &str) -> Vec<f32> {
        let tokens = Self::tokenize(text);
        if tokens.is_empty() {
            return vec![0.0; self.dimensions];
        }

        let mut tf: HashMap<String, f32> = HashMap::new();
        for token in &tokens {
            *tf.entry(token.clone()).or_default() += 1.0;
        }

        let total = tokens.len() as f32;
        let mut vec = vec![0.0f32; self.dimensions];

        for (token, count) in &tf {
            let freq = count / total;
            // Longer tokens carry more meaning than short ones like "id".
            let weight = 1.0 + (token.len() as f32).ln();
            vec[Self::bucket(token, self.dimensions)] += freq * weight;
        }

        // L2 normalize.
        let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for v in &mut vec {
                *v /= norm;
            }
        }

        vec
    }
}

impl Embedder for TokenHashEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        ensure_embeddable(text)?;
        Ok(self.vector(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "token-hash"
    }
}
