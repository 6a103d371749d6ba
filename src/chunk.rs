//! Tokenizer selection for the chunker.
//!
//! The core chunker works against the [`Tokenizer`] trait; this module
//! supplies the real BPE tokenizer used by OpenAI-style embedding models
//! (`cl100k_base`, via `tiktoken-rs`) and picks one from configuration.
//!
//! The Ollama `bge-m3` model uses a different vocabulary, but `cl100k_base`
//! counts are close enough to keep windows under its 8192-token input limit
//! at the default `max_tokens = 7000`.

use anyhow::{anyhow, bail, Result};
use std::sync::Arc;
use tiktoken_rs::{cl100k_base, CoreBPE};

use scholar_rag_core::tokenize::{ByteTokenizer, Tokenizer};

use crate::config::Config;

/// `cl100k_base` BPE tokenizer.
pub struct TiktokenTokenizer {
    bpe: CoreBPE,
}

impl TiktokenTokenizer {
    pub fn cl100k() -> Result<Self> {
        let bpe = cl100k_base().map_err(|e| anyhow!("Failed to load cl100k_base: {}", e))?;
        Ok(Self { bpe })
    }
}

impl Tokenizer for TiktokenTokenizer {
    fn name(&self) -> &str {
        "cl100k_base"
    }

    fn encode(&self, text: &str) -> Vec<u32> {
        self.bpe.encode_ordinary(text).into_iter().map(|t| t as u32).collect()
    }

    fn decode(&self, tokens: &[u32]) -> Option<String> {
        self.bpe.decode(tokens.iter().map(|&t| t as _).collect()).ok()
    }
}

/// Build the tokenizer named by `chunking.tokenizer`.
pub fn create_tokenizer(config: &Config) -> Result<Arc<dyn Tokenizer>> {
    match config.chunking.tokenizer.as_str() {
        "cl100k_base" => Ok(Arc::new(TiktokenTokenizer::cl100k()?)),
        "bytes" => Ok(Arc::new(ByteTokenizer)),
        other => bail!("Unknown tokenizer: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scholar_rag_core::chunk::chunk_text;

    #[test]
    fn cl100k_roundtrip_and_count() {
        let tok = TiktokenTokenizer::cl100k().unwrap();
        let text = "The quick brown fox jumps over the lazy dog.";
        let tokens = tok.encode(text);
        assert!(!tokens.is_empty());
        assert!(tokens.len() < text.len());
        assert_eq!(tok.decode(&tokens).as_deref(), Some(text));
    }

    #[test]
    fn cl100k_chunks_reconstruct_text() {
        let tok = TiktokenTokenizer::cl100k().unwrap();
        let text = "Closures capture their environment. Iterators are lazy. ".repeat(20);
        let total = tok.count(&text);
        let chunks = chunk_text(&tok, &text, 16).unwrap();
        assert_eq!(chunks.len(), total.div_ceil(16));
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn cl100k_never_splits_multibyte_text() {
        let tok = TiktokenTokenizer::cl100k().unwrap();
        let text = "آخری معجزہ کے بارے میں سوال";
        for n in 1..=4 {
            let chunks = chunk_text(&tok, text, n).unwrap();
            assert_eq!(chunks.concat(), text, "window size {}", n);
        }
    }
}
