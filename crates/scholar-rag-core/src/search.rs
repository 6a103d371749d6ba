//! Brute-force cosine retrieval over a [`Corpus`].
//!
//! # Scoring
//!
//! A long query is chunked like a document, and each query chunk is embedded
//! separately. A document's score is the maximum cosine similarity between
//! any query-chunk vector and any of the document's chunk vectors. Scores are
//! not normalized by chunk count, so documents with many chunks have more
//! chances at a high match.
//!
//! # Ordering
//!
//! 1. Score every document (linear scan).
//! 2. Drop documents below `min_score`, if set.
//! 3. Stable sort by score, descending; ties keep corpus insertion order.
//! 4. Truncate to `top_k`.

use crate::chunk::chunk_text;
use crate::embedding::{cosine_similarity, Embedder};
use crate::models::{Corpus, RetrievalResult, ScoredDocument};
use crate::tokenize::Tokenizer;
use crate::{Error, Result};

/// Retrieval tuning, decoupled from application config.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchParams {
    /// Maximum number of documents to return. Must be > 0.
    pub top_k: usize,
    /// Token window used to split long queries.
    pub max_tokens: usize,
    /// Documents scoring below this are dropped.
    pub min_score: Option<f32>,
}

/// Embed `query` and rank the corpus against it.
///
/// An empty corpus or a blank query returns an empty result without calling
/// the embedder.
///
/// # Errors
///
/// - `InvalidArgument` when `top_k == 0`.
/// - `EmbeddingProvider` from the embedder.
pub async fn search(
    corpus: &Corpus,
    embedder: &dyn Embedder,
    tokenizer: &dyn Tokenizer,
    query: &str,
    params: &SearchParams,
) -> Result<RetrievalResult> {
    check_top_k(params.top_k)?;
    if corpus.is_empty() || query.trim().is_empty() {
        return Ok(Vec::new());
    }

    let query_chunks = chunk_text(tokenizer, query, params.max_tokens)?;
    let query_vectors = embedder.embed_many(&query_chunks).await?;
    if query_vectors.len() != query_chunks.len() {
        return Err(Error::EmbeddingProvider(format!(
            "expected {} query embeddings, got {}",
            query_chunks.len(),
            query_vectors.len()
        )));
    }
    if let Some(v) = query_vectors.iter().find(|v| v.len() != corpus.dims) {
        return Err(Error::DimensionMismatch {
            expected: corpus.dims,
            actual: v.len(),
        });
    }

    let mut results = rank_documents(corpus, &query_vectors, params.top_k)?;
    if let Some(min) = params.min_score {
        results.retain(|r| r.score >= min);
    }
    Ok(results)
}

/// Rank every document against precomputed query vectors.
///
/// This is the pure scoring step of [`search`].
pub fn rank_documents(
    corpus: &Corpus,
    query_vectors: &[Vec<f32>],
    top_k: usize,
) -> Result<RetrievalResult> {
    check_top_k(top_k)?;

    let mut scored: Vec<(f32, usize)> = corpus
        .entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let best = entry
                .chunks
                .iter()
                .flat_map(|ec| {
                    query_vectors
                        .iter()
                        .map(move |q| cosine_similarity(q, &ec.vector))
                })
                .fold(f32::NEG_INFINITY, f32::max);
            // No finite pair (NaN components, or no chunks) ranks as unrelated.
            (if best.is_finite() { best } else { 0.0 }, i)
        })
        .collect();

    // `sort_by` is stable, so equal scores keep insertion order.
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(top_k);

    Ok(scored
        .into_iter()
        .map(|(score, i)| ScoredDocument {
            score,
            document: corpus.entries[i].document.clone(),
        })
        .collect())
}

fn check_top_k(top_k: usize) -> Result<()> {
    if top_k == 0 {
        return Err(Error::InvalidArgument("top_k must be > 0".to_string()));
    }
    Ok(())
}
