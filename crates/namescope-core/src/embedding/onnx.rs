//! ONNX Runtime embedding provider.
//!
//! Loads a sentence-encoder model via the `ort` crate (v2) and produces
//! mean-pooled, L2-normalized vectors. Inference is deterministic for a
//! fixed model file and input text.

use std::path::Path;
use std::sync::Mutex;

use ort::session::Session;
use ort::value::Tensor;
#[cfg(feature = "tracing")]
use tracing::debug;

use super::{ensure_embeddable, Embedder, EmbeddingError};

/// ONNX-backed embedding provider.
///
/// Wraps an `ort` session behind a `Mutex` (`run` needs `&mut`), so a single
/// instance can be shared by reference across threads for read-only
/// inference.
pub struct OnnxEmbedder {
    session: Mutex<Session>,
    dimensions: usize,
    model_name: String,
}

impl std::fmt::Debug for OnnxEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxEmbedder")
            .field("dimensions", &self.dimensions)
            .field("model_name", &self.model_name)
            .finish()
    }
}

impl OnnxEmbedder {
    /// Loads an ONNX model from the given path.
    ///
    /// # Errors
    /// Returns [`EmbeddingError::ModelLoadFailed`] naming the model when the
    /// file is missing or the session cannot be built. No fallback model is
    /// substituted.
    pub fn load(model_path: &str, dimensions: usize) -> Result<Self, EmbeddingError> {
        let path = Path::new(model_path);
        if !path.exists() {
            return Err(EmbeddingError::ModelLoadFailed {
                model: model_path.to_string(),
                reason: "model file not found".to_string(),
            });
        }

        let load_failed = |reason: String| EmbeddingError::ModelLoadFailed {
            model: model_path.to_string(),
            reason,
        };

        let session = Session::builder()
            .map_err(|e| load_failed(e.to_string()))?
            .with_intra_threads(2)
            .map_err(|e| load_failed(e.to_string()))?
            .commit_from_file(model_path)
            .map_err(|e| load_failed(e.to_string()))?;

        let model_name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("onnx-model")
            .to_string();

        #[cfg(feature = "tracing")]
        debug!(model = %model_name, dims = dimensions, "ONNX model loaded");

        Ok(Self {
            session: Mutex::new(session),
            dimensions,
            model_name,
        })
    }

    fn infer(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let token_ids = Self::tokenize(text);
        let seq_len = token_ids.len();

        let input_ids: Vec<i64> = token_ids.iter().map(|&id| id as i64).collect();
        let attention_mask: Vec<i64> = vec![1i64; seq_len];

        let ids_tensor = Tensor::from_array((vec![1i64, seq_len as i64], input_ids))
            .map_err(|e| EmbeddingError::InferenceFailed {
                reason: format!("tensor creation error: {e}"),
            })?;
        let mask_tensor = Tensor::from_array((vec![1i64, seq_len as i64], attention_mask))
            .map_err(|e| EmbeddingError::InferenceFailed {
                reason: format!("tensor creation error: {e}"),
            })?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| EmbeddingError::InferenceFailed {
                reason: format!("session lock poisoned: {e}"),
            })?;

        let outputs = session
            .run(ort::inputs![ids_tensor, mask_tensor])
            .map_err(|e| EmbeddingError::InferenceFailed {
                reason: e.to_string(),
            })?;

        let (_name, output) =
            outputs
                .iter()
                .next()
                .ok_or_else(|| EmbeddingError::InferenceFailed {
                    reason: "no output tensor".to_string(),
                })?;

        let (shape, data) =
            output
                .try_extract_tensor::<f32>()
                .map_err(|e| EmbeddingError::InferenceFailed {
                    reason: format!("tensor extraction failed: {e}"),
                })?;

        // Mean pool across the sequence dimension.
        let mut embedding = if shape.len() == 3 {
            // [batch=1, seq, dims]
            let seq = shape[1] as usize;
            let dims = shape[2] as usize;
            let mut pooled = vec![0.0f32; dims];
            for s in 0..seq {
                for d in 0..dims {
                    pooled[d] += data[s * dims + d];
                }
            }
            for v in &mut pooled {
                *v /= seq as f32;
            }
            pooled
        } else if shape.len() == 2 {
            // [batch=1, dims], already pooled.
            let dims = shape[1] as usize;
            data[..dims].to_vec()
        } else {
            return Err(EmbeddingError::InferenceFailed {
                reason: format!("unexpected output shape: {shape:?}"),
            });
        };

        // L2 normalize.
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for v in &mut embedding {
                *v /= norm;
            }
        }

        embedding.resize(self.dimensions, 0.0);
        Ok(embedding)
    }

    /// Tokenizer for SQL text: identifiers split on underscores so snake_case
    /// aliases share tokens with the words inside their code, each token
    /// hashed into the vocabulary range between [CLS] and [SEP].
    fn tokenize(text: &str) -> Vec<u32> {
        let mut ids = vec![101u32]; // [CLS]
        for word in text.split(|c: char| !c.is_alphanumeric()) {
            if word.is_empty() {
                continue;
            }
            let mut h: u32 = 0x811c9dc5;
            for b in word.to_lowercase().as_bytes() {
                h ^= *b as u32;
                h = h.wrapping_mul(0x01000193);
            }
            ids.push(1 + (h % 29999));
        }
        ids.push(102); // [SEP]
        ids
    }
}

impl Embedder for OnnxEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        ensure_embeddable(text)?;
        self.infer(text)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        &self.model_name
    }
}
