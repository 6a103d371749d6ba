//! Generation provider trait.
//!
//! A [`Generator`] makes a single blocking (from the caller's point of view)
//! call to an external text-generation API and returns the full response
//! text. Failures surface as [`Error::GenerationProvider`](crate::Error) and
//! are never retried here.

use async_trait::async_trait;

use crate::Result;

#[async_trait]
pub trait Generator: Send + Sync {
    /// Returns the model identifier (e.g. `"llama3.2"`).
    fn model_name(&self) -> &str;

    /// Generate a completion for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String>;
}
