//! Error taxonomy shared by every stage of the pipeline.
//!
//! Provider failures (`EmbeddingProvider`, `GenerationProvider`) are never
//! retried or recovered inside the core; they propagate to whatever front door
//! invoked the pipeline. `CorpusNotFound` is recoverable by running a full
//! build. Everything else indicates a caller bug and fails fast.

use thiserror::Error;

/// Result alias used throughout the core crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the core pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// The embedding provider failed or returned malformed output.
    #[error("embedding provider error: {0}")]
    EmbeddingProvider(String),

    /// The generation provider failed or returned malformed output.
    #[error("generation provider error: {0}")]
    GenerationProvider(String),

    /// No persisted corpus exists at the expected location.
    #[error("corpus not found: {0}")]
    CorpusNotFound(String),

    /// A single chunk exceeds the embedding provider's input limit.
    ///
    /// The chunker guarantees this cannot happen for correctly configured
    /// `max_tokens`, so seeing it means the chunking and provider limits
    /// disagree.
    #[error("chunk too large: {tokens} tokens exceeds provider limit of {limit}")]
    ChunkTooLarge { tokens: usize, limit: usize },

    /// An argument was outside its valid domain (e.g. `top_k == 0`).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A vector with zero magnitude was passed to the strict cosine function.
    ///
    /// Retrieval itself scores degenerate vectors as `0.0` instead of raising.
    #[error("degenerate vector: zero magnitude")]
    DegenerateVector,

    /// Two vectors that must share a dimensionality do not.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A persisted snapshot exists but cannot be decoded or fails validation.
    #[error("corrupt corpus snapshot: {0}")]
    CorruptSnapshot(String),

    /// A rebuild was requested while another one is still running.
    #[error("a corpus rebuild is already in progress")]
    RebuildInProgress,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for failures of an external provider (embedding or generation).
    pub fn is_provider_error(&self) -> bool {
        matches!(
            self,
            Error::EmbeddingProvider(_) | Error::GenerationProvider(_)
        )
    }
}
