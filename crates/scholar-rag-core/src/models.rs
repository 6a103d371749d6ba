//! Core data models that flow through ingestion and retrieval.
//!
//! A [`Document`] is split into [`Chunk`]s, each chunk is embedded into an
//! [`EmbeddedChunk`], and the embedded chunks are grouped back under their
//! document in a [`CorpusEntry`]. The [`Corpus`] is the ordered collection of
//! entries; its order is the insertion order used to break ranking ties.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Arbitrary provenance fields attached to a document (timestamps, file
/// name, lecture number, ...). Keys are kept sorted for stable output.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// One ingested unit of source text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Unique within a corpus.
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub source_metadata: Metadata,
}

impl Document {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            source_metadata: Metadata::new(),
        }
    }

    /// Builder-style helper for attaching a provenance field.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.source_metadata.insert(key.into(), value);
        self
    }

    /// Documents with empty or whitespace-only text are never embedded.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// A token-bounded slice of a document's text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub parent_id: String,
    /// Position within the parent, contiguous from 0.
    pub ordinal: usize,
    pub text: String,
    /// SHA-256 of `text`, hex encoded.
    pub hash: String,
}

/// A chunk together with its embedding vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedChunk {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

/// A document and all of its embedded chunks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusEntry {
    pub document: Document,
    pub chunks: Vec<EmbeddedChunk>,
}

/// The full set of embedded documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Corpus {
    /// Embedding model that produced every vector.
    pub model: String,
    /// Shared vector length. `0` only for an empty corpus.
    pub dims: usize,
    pub entries: Vec<CorpusEntry>,
}

impl Corpus {
    pub fn empty(model: impl Into<String>, dims: usize) -> Self {
        Self {
            model: model.into(),
            dims,
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn chunk_count(&self) -> usize {
        self.entries.iter().map(|e| e.chunks.len()).sum()
    }

    /// Every vector must have length `dims` and every entry at least one chunk.
    pub fn validate(&self) -> crate::Result<()> {
        for entry in &self.entries {
            if entry.chunks.is_empty() {
                return Err(crate::Error::CorruptSnapshot(format!(
                    "document '{}' has no chunks",
                    entry.document.id
                )));
            }
            for ec in &entry.chunks {
                if ec.vector.len() != self.dims {
                    return Err(crate::Error::DimensionMismatch {
                        expected: self.dims,
                        actual: ec.vector.len(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// A document paired with its retrieval score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredDocument {
    /// Cosine similarity in `[-1, 1]`.
    pub score: f32,
    pub document: Document,
}

/// Ranked retrieval output: descending score, insertion order on ties.
pub type RetrievalResult = Vec<ScoredDocument>;

/// Provenance of a document used to produce an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    pub identifier: String,
    pub provenance: Metadata,
}

impl From<&Document> for SourceRef {
    fn from(doc: &Document) -> Self {
        Self {
            identifier: doc.id.clone(),
            provenance: doc.source_metadata.clone(),
        }
    }
}

/// The front-door response: generated text plus the sources it drew on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub answer_text: String,
    pub sources: Vec<SourceRef>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(id: &str, vectors: Vec<Vec<f32>>) -> CorpusEntry {
        CorpusEntry {
            document: Document::new(id, "text"),
            chunks: vectors
                .into_iter()
                .enumerate()
                .map(|(i, v)| EmbeddedChunk {
                    chunk: Chunk {
                        parent_id: id.to_string(),
                        ordinal: i,
                        text: "text".to_string(),
                        hash: String::new(),
                    },
                    vector: v,
                })
                .collect(),
        }
    }

    #[test]
    fn blank_documents_detected() {
        assert!(Document::new("a", "").is_blank());
        assert!(Document::new("a", " \n\t ").is_blank());
        assert!(!Document::new("a", " x ").is_blank());
    }

    #[test]
    fn metadata_keys_sorted() {
        let doc = Document::new("a", "t")
            .with_metadata("start", json!(1.5))
            .with_metadata("end", json!(3.0))
            .with_metadata("name", json!("intro"));
        let keys: Vec<&str> = doc.source_metadata.keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["end", "name", "start"]);
    }

    #[test]
    fn validate_rejects_wrong_arity() {
        let corpus = Corpus {
            model: "m".into(),
            dims: 2,
            entries: vec![entry("a", vec![vec![1.0, 0.0]]), entry("b", vec![vec![1.0]])],
        };
        assert!(matches!(
            corpus.validate(),
            Err(crate::Error::DimensionMismatch {
                expected: 2,
                actual: 1
            })
        ));
    }

    #[test]
    fn validate_rejects_chunkless_entry() {
        let corpus = Corpus {
            model: "m".into(),
            dims: 2,
            entries: vec![entry("a", vec![])],
        };
        assert!(corpus.validate().is_err());
    }

    #[test]
    fn counts() {
        let corpus = Corpus {
            model: "m".into(),
            dims: 2,
            entries: vec![
                entry("a", vec![vec![1.0, 0.0], vec![0.0, 1.0]]),
                entry("b", vec![vec![1.0, 1.0]]),
            ],
        };
        assert_eq!(corpus.len(), 2);
        assert_eq!(corpus.chunk_count(), 3);
        assert!(corpus.validate().is_ok());
    }
}
