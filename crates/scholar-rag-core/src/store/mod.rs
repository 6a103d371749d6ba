//! Corpus persistence abstraction.
//!
//! The [`CorpusStore`] trait is the boundary between the in-memory
//! [`Corpus`] and its single durable copy. Implementations must make
//! [`persist`](CorpusStore::persist) all-or-nothing: a failure partway
//! through leaves the previously persisted corpus untouched.
//!
//! | Implementation | Where |
//! |----------------|-------|
//! | [`memory::InMemoryCorpusStore`] | this crate, for tests |
//! | `FileCorpusStore` | `scholar-rag` app crate, JSON snapshot on disk |

pub mod memory;

use crate::models::Corpus;
use crate::Result;

/// Durable storage for a whole [`Corpus`].
pub trait CorpusStore: Send + Sync {
    /// Load the persisted corpus.
    ///
    /// # Errors
    ///
    /// [`Error::CorpusNotFound`](crate::Error::CorpusNotFound) when nothing
    /// has been persisted yet; the caller falls back to a full build.
    fn load(&self) -> Result<Corpus>;

    /// Persist `corpus`, fully replacing any prior version.
    fn persist(&self, corpus: &Corpus) -> Result<()>;

    /// Whether a persisted corpus currently exists.
    fn exists(&self) -> bool;
}
