//! Tokenizer abstraction used by the chunker and the embedding size check.
//!
//! The application plugs in the embedding model's real tokenizer (tiktoken
//! `cl100k_base`); [`ByteTokenizer`] is a dependency-free fallback where each
//! UTF-8 byte is one token.

/// A reversible mapping between text and token ids.
pub trait Tokenizer: Send + Sync {
    /// Identifier for logs and snapshot metadata (e.g. `"cl100k_base"`).
    fn name(&self) -> &str;

    /// Encode text into token ids.
    fn encode(&self, text: &str) -> Vec<u32>;

    /// Decode a token window back into text.
    ///
    /// Returns `None` when the window does not decode to valid UTF-8, which
    /// happens when it starts or ends inside a multi-byte character.
    fn decode(&self, tokens: &[u32]) -> Option<String>;

    /// Number of tokens `text` encodes to.
    fn count(&self, text: &str) -> usize {
        self.encode(text).len()
    }
}

/// One token per UTF-8 byte.
#[derive(Debug, Clone, Copy, Default)]
pub struct ByteTokenizer;

impl Tokenizer for ByteTokenizer {
    fn name(&self) -> &str {
        "bytes"
    }

    fn encode(&self, text: &str) -> Vec<u32> {
        text.bytes().map(u32::from).collect()
    }

    fn decode(&self, tokens: &[u32]) -> Option<String> {
        let bytes: Option<Vec<u8>> = tokens.iter().map(|&t| u8::try_from(t).ok()).collect();
        String::from_utf8(bytes?).ok()
    }

    fn count(&self, text: &str) -> usize {
        text.len()
    }
}
