//! Embedding provider trait and vector utilities.
//!
//! Defines the [`Embedder`] trait that all embedding backends implement,
//! plus pure helpers for similarity computation, vector serialization, and
//! validation of provider output.
//!
//! Concrete HTTP providers (Ollama, OpenAI) live in the `scholar-rag` app
//! crate.

use async_trait::async_trait;

use crate::tokenize::Tokenizer;
use crate::{Error, Result};

/// Trait for embedding providers.
///
/// Implementations turn text into fixed-length vectors. They are stateless
/// with respect to any single call and safe to share across tasks.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"bge-m3"`).
    fn model_name(&self) -> &str;

    /// Returns the embedding vector dimensionality (e.g. `1024`).
    fn dims(&self) -> usize;

    /// Largest input, in tokens, the provider accepts.
    fn max_input_tokens(&self) -> usize;

    /// Embed a batch of texts, one vector per input, in input order.
    ///
    /// Implementations must fail with [`Error::EmbeddingProvider`] on
    /// upstream errors or malformed output.
    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_many(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::EmbeddingProvider("empty embedding response".to_string()))
    }
}

/// Reject a chunk that exceeds the provider's token limit before calling it.
pub fn check_chunk_size(tokenizer: &dyn Tokenizer, text: &str, limit: usize) -> Result<()> {
    let tokens = tokenizer.count(text);
    if tokens > limit {
        return Err(Error::ChunkTooLarge { tokens, limit });
    }
    Ok(())
}

/// Check that a provider returned one vector of length `dims` per input.
pub fn validate_embeddings(expected: usize, dims: usize, vectors: &[Vec<f32>]) -> Result<()> {
    if vectors.len() != expected {
        return Err(Error::EmbeddingProvider(format!(
            "expected {} embeddings, got {}",
            expected,
            vectors.len()
        )));
    }
    if let Some(bad) = vectors.iter().find(|v| v.len() != dims) {
        return Err(Error::EmbeddingProvider(format!(
            "expected vectors of length {}, got {}",
            dims,
            bad.len()
        )));
    }
    Ok(())
}

/// Encode a float vector as little-endian `f32` bytes.
///
/// # Example
///
/// ```rust
/// use scholar_rag_core::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12); // 3 × 4 bytes
/// assert_eq!(blob_to_vec(&blob).unwrap(), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode bytes produced by [`vec_to_blob`].
///
/// Returns `None` when the length is not a multiple of 4.
pub fn blob_to_vec(blob: &[u8]) -> Option<Vec<f32>> {
    if blob.len() % 4 != 0 {
        return None;
    }
    Some(
        blob.chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect(),
    )
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`:
/// - `1.0` = identical direction
/// - `0.0` = orthogonal (unrelated)
/// - `-1.0` = opposite direction
///
/// Zero-magnitude, empty, mismatched-length, or non-finite vectors score
/// `0.0`. A degenerate embedding is a data-quality problem, not a
/// programming error, so retrieval treats it as "unrelated". Use
/// [`cosine_similarity_checked`] to surface it instead.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    match cosine_similarity_checked(a, b) {
        Ok(score) if score.is_finite() => score,
        _ => 0.0,
    }
}

/// Strict cosine similarity.
///
/// # Errors
///
/// - [`Error::DimensionMismatch`] when the lengths differ.
/// - [`Error::DegenerateVector`] when either vector has zero magnitude.
pub fn cosine_similarity_checked(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(Error::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Err(Error::DegenerateVector);
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    Ok((dot / denom).clamp(-1.0, 1.0))
}
