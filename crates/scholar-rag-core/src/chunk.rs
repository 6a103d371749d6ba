//! Fixed-window token chunker.
//!
//! Splits text into contiguous, non-overlapping windows of at most
//! `max_tokens` tokens, as counted by the embedding model's [`Tokenizer`],
//! so every chunk fits the embedding provider's input limit.
//!
//! # Algorithm
//!
//! 1. Encode the whole text into token ids.
//! 2. Starting at token 0, take up to `max_tokens` tokens.
//! 3. Decode the window. If it ends inside a multi-byte character the
//!    decode fails, so shrink the window one token at a time until it
//!    decodes. If no prefix decodes (a single character needs more than
//!    `max_tokens` tokens), grow past the limit to the next decodable cut.
//! 4. Emit the decoded text and continue from the cut.
//!
//! Windows carry no overlap and ignore sentence boundaries, so a chunk may
//! end mid-sentence. Concatenating every window reproduces the input exactly.
//!
//! # Example
//!
//! ```rust
//! use scholar_rag_core::chunk::chunk_text;
//! use scholar_rag_core::tokenize::ByteTokenizer;
//!
//! let chunks = chunk_text(&ByteTokenizer, "abcdefgh", 3).unwrap();
//! assert_eq!(chunks, vec!["abc", "def", "gh"]);
//! ```

use sha2::{Digest, Sha256};

use crate::models::{Chunk, Document};
use crate::tokenize::Tokenizer;
use crate::{Error, Result};

/// Split `text` into windows of at most `max_tokens` tokens.
///
/// Empty or whitespace-only input yields no chunks.
///
/// # Errors
///
/// `InvalidArgument` when `max_tokens == 0`, or when the tokenizer cannot
/// decode any window of its own output.
pub fn chunk_text(tokenizer: &dyn Tokenizer, text: &str, max_tokens: usize) -> Result<Vec<String>> {
    if max_tokens == 0 {
        return Err(Error::InvalidArgument("max_tokens must be > 0".to_string()));
    }
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let tokens = tokenizer.encode(text);
    let mut windows = Vec::new();
    let mut start = 0;

    while start < tokens.len() {
        let limit = (start + max_tokens).min(tokens.len());
        let (end, piece) = next_cut(tokenizer, &tokens, start, limit)?;
        windows.push(piece);
        start = end;
    }

    Ok(windows)
}

/// Find the largest decodable window `tokens[start..end]` with `end <= limit`,
/// falling back to the smallest decodable window beyond `limit`.
fn next_cut(
    tokenizer: &dyn Tokenizer,
    tokens: &[u32],
    start: usize,
    limit: usize,
) -> Result<(usize, String)> {
    for end in (start + 1..=limit).rev() {
        if let Some(piece) = tokenizer.decode(&tokens[start..end]) {
            return Ok((end, piece));
        }
    }
    for end in limit + 1..=tokens.len() {
        if let Some(piece) = tokenizer.decode(&tokens[start..end]) {
            return Ok((end, piece));
        }
    }
    Err(Error::InvalidArgument(format!(
        "tokenizer '{}' cannot decode tokens starting at {}",
        tokenizer.name(),
        start
    )))
}

/// Chunk a document, attaching parent id, ordinal and content hash.
pub fn chunk_document(
    tokenizer: &dyn Tokenizer,
    document: &Document,
    max_tokens: usize,
) -> Result<Vec<Chunk>> {
    let windows = chunk_text(tokenizer, &document.text, max_tokens)?;
    Ok(windows
        .into_iter()
        .enumerate()
        .map(|(ordinal, text)| make_chunk(&document.id, ordinal, text))
        .collect())
}

/// SHA-256 of a chunk's text, hex encoded.
pub fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn make_chunk(parent_id: &str, ordinal: usize, text: String) -> Chunk {
    Chunk {
        parent_id: parent_id.to_string(),
        ordinal,
        hash: hash_text(&text),
        text,
    }
}
