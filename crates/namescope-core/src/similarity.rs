//! Cosine similarity between embedding vectors.
//!
//! The score contract is raw cosine similarity clipped to [0, 1]: negative
//! cosines (rare for short natural-language-like SQL text) clamp to 0.0, and
//! floating-point overshoot above 1.0 clamps to 1.0. Clamping, not linear
//! rescaling; thresholds downstream are calibrated against this mapping.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SimilarityError {
    /// The two vectors differ in length. Cannot happen with a single
    /// embedder instance, but the contract is explicit rather than assumed.
    #[error("embedding dimension mismatch: {left} vs {right}")]
    DimensionMismatch { left: usize, right: usize },
}

/// Computes the clamped cosine similarity of two vectors.
///
/// Zero vectors (no measurable direction) score 0.0 against everything.
pub fn cosine_score(a: &[f32], b: &[f32]) -> Result<f32, SimilarityError> {
    if a.len() != b.len() {
        return Err(SimilarityError::DimensionMismatch {
            left: a.len(),
            right: b.len(),
        });
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        dot += f64::from(x) * f64::from(y);
        norm_a += f64::from(x) * f64::from(x);
        norm_b += f64::from(y) * f64::from(y);
    }

    if norm_a <= 0.0 || norm_b <= 0.0 {
        return Ok(0.0);
    }

    let cosine = dot / (norm_a.sqrt() * norm_b.sqrt());
    Ok(cosine.clamp(0.0, 1.0) as f32)
}
