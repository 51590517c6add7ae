//! Text-to-vector embedding providers.
//!
//! The pipeline depends on embeddings only through the [`Embedder`] trait:
//! an injectable dependency constructed once by the composition root and
//! passed by reference into the analyzer. There is no process-wide model
//! singleton and no automatic substitution between providers: when a model
//! fails to load, the caller is told which one, and chooses what to do.
//!
//! Embeddings are not cached across calls.

mod hash;
#[cfg(feature = "onnx")]
mod onnx;

pub use hash::TokenHashEmbedder;
#[cfg(feature = "onnx")]
pub use onnx::OnnxEmbedder;

use thiserror::Error;

/// Maps a text string to a fixed-length numeric vector.
///
/// Implementations must be deterministic: for a fixed model and fixed input
/// text the output is bit-for-bit reproducible. The vector length equals
/// [`Embedder::dimensions`] for every successful call.
pub trait Embedder: Send + Sync {
    /// Embeds one text. Empty or whitespace-only input fails with
    /// [`EmbeddingError::EmptyInput`] before any inference runs.
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Fixed output dimensionality of this provider.
    fn dimensions(&self) -> usize;

    /// Short provider name for logs and error messages.
    fn name(&self) -> &str;
}

/// Errors produced by embedding providers.
#[derive(Debug, Clone, Error)]
pub enum EmbeddingError {
    /// Empty or whitespace-only text reached the embedder. Indicates an
    /// extraction bug or pathological input; never retried.
    #[error("cannot embed empty or whitespace-only text")]
    EmptyInput,

    /// The model could not be loaded. Fatal for this provider's embedding
    /// capability; no fallback model is substituted.
    #[error("failed to load embedding model '{model}': {reason}")]
    ModelLoadFailed { model: String, reason: String },

    /// Inference ran but produced no usable vector.
    #[error("embedding inference failed: {reason}")]
    InferenceFailed { reason: String },
}

/// Rejects text the contract forbids before it reaches a model.
pub(crate) fn ensure_embeddable(text: &str) -> Result<(), EmbeddingError> {
    if text.trim().is_empty() {
        return Err(EmbeddingError::EmptyInput);
    }
    Ok(())
}
