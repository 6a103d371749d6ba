//! On-disk corpus snapshot.
//!
//! [`FileCorpusStore`] persists a whole [`Corpus`] as one JSON file:
//!
//! ```json
//! {
//!   "format_version": 1,
//!   "model": "bge-m3",
//!   "dims": 1024,
//!   "built_at": "2024-05-01T12:00:00Z",
//!   "documents": [
//!     { "document": { "id": "...", "text": "...", "source_metadata": {} },
//!       "chunks": [ { "ordinal": 0, "text": "...", "hash": "...", "vector": "<base64>" } ] }
//!   ]
//! }
//! ```
//!
//! Vectors are base64 of little-endian `f32` bytes, so they round-trip
//! bit-exactly. Writes go to a temporary file in the target directory which
//! is then renamed over the destination; a crash or failed build leaves the
//! previous snapshot intact.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

use scholar_rag_core::embedding::{blob_to_vec, vec_to_blob};
use scholar_rag_core::models::{Chunk, Corpus, CorpusEntry, Document, EmbeddedChunk};
use scholar_rag_core::store::CorpusStore;
use scholar_rag_core::{Error, Result};

pub const FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct Snapshot {
    format_version: u32,
    model: String,
    dims: usize,
    built_at: DateTime<Utc>,
    documents: Vec<SnapshotEntry>,
}

#[derive(Serialize, Deserialize)]
struct SnapshotEntry {
    document: Document,
    chunks: Vec<SnapshotChunk>,
}

#[derive(Serialize, Deserialize)]
struct SnapshotChunk {
    ordinal: usize,
    text: String,
    hash: String,
    vector: String,
}

/// Header fields of a snapshot, for `stats`.
#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotInfo {
    pub format_version: u32,
    pub model: String,
    pub dims: usize,
    pub built_at: DateTime<Utc>,
}

/// JSON snapshot at a fixed path.
pub struct FileCorpusStore {
    path: PathBuf,
}

impl FileCorpusStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read only the header fields of the snapshot.
    pub fn info(&self) -> Result<SnapshotInfo> {
        let bytes = self.read()?;
        serde_json::from_slice(&bytes).map_err(|e| Error::CorruptSnapshot(e.to_string()))
    }

    fn read(&self) -> Result<Vec<u8>> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::CorpusNotFound(
                self.path.display().to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    fn write_atomic(&self, bytes: &[u8]) -> Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }
}

impl CorpusStore for FileCorpusStore {
    fn load(&self) -> Result<Corpus> {
        let bytes = self.read()?;
        let snapshot: Snapshot =
            serde_json::from_slice(&bytes).map_err(|e| Error::CorruptSnapshot(e.to_string()))?;
        let corpus = from_snapshot(snapshot)?;
        tracing::debug!(
            path = %self.path.display(),
            documents = corpus.len(),
            "snapshot loaded"
        );
        Ok(corpus)
    }

    fn persist(&self, corpus: &Corpus) -> Result<()> {
        let snapshot = to_snapshot(corpus, Utc::now());
        let bytes = serde_json::to_vec(&snapshot)
            .map_err(|e| Error::CorruptSnapshot(format!("serialize: {}", e)))?;
        self.write_atomic(&bytes)?;
        tracing::info!(
            path = %self.path.display(),
            documents = corpus.len(),
            chunks = corpus.chunk_count(),
            "snapshot written"
        );
        Ok(())
    }

    fn exists(&self) -> bool {
        self.path.is_file()
    }
}

fn to_snapshot(corpus: &Corpus, built_at: DateTime<Utc>) -> Snapshot {
    Snapshot {
        format_version: FORMAT_VERSION,
        model: corpus.model.clone(),
        dims: corpus.dims,
        built_at,
        documents: corpus
            .entries
            .iter()
            .map(|entry| SnapshotEntry {
                document: entry.document.clone(),
                chunks: entry
                    .chunks
                    .iter()
                    .map(|ec| SnapshotChunk {
                        ordinal: ec.chunk.ordinal,
                        text: ec.chunk.text.clone(),
                        hash: ec.chunk.hash.clone(),
                        vector: STANDARD.encode(vec_to_blob(&ec.vector)),
                    })
                    .collect(),
            })
            .collect(),
    }
}

fn from_snapshot(snapshot: Snapshot) -> Result<Corpus> {
    if snapshot.format_version != FORMAT_VERSION {
        return Err(Error::CorruptSnapshot(format!(
            "unsupported format_version {}",
            snapshot.format_version
        )));
    }

    let mut entries = Vec::with_capacity(snapshot.documents.len());
    for entry in snapshot.documents {
        let parent_id = entry.document.id.clone();
        let mut chunks = Vec::with_capacity(entry.chunks.len());
        for (expected, c) in entry.chunks.into_iter().enumerate() {
            if c.ordinal != expected {
                return Err(Error::CorruptSnapshot(format!(
                    "document '{}' chunk ordinal {} out of sequence",
                    parent_id, c.ordinal
                )));
            }
            let vector = STANDARD
                .decode(&c.vector)
                .ok()
                .and_then(|bytes| blob_to_vec(&bytes))
                .ok_or_else(|| {
                    Error::CorruptSnapshot(format!(
                        "document '{}' chunk {} has an undecodable vector",
                        parent_id, c.ordinal
                    ))
                })?;
            chunks.push(EmbeddedChunk {
                chunk: Chunk {
                    parent_id: parent_id.clone(),
                    ordinal: c.ordinal,
                    text: c.text,
                    hash: c.hash,
                },
                vector,
            });
        }
        entries.push(CorpusEntry {
            document: entry.document,
            chunks,
        });
    }

    let corpus = Corpus {
        model: snapshot.model,
        dims: snapshot.dims,
        entries,
    };
    corpus.validate().map_err(|e| match e {
        Error::DimensionMismatch { expected, actual } => Error::CorruptSnapshot(format!(
            "vector length {} does not match dims {}",
            actual, expected
        )),
        other => other,
    })?;
    Ok(corpus)
}

#[cfg(test)]
mod tests {
    use super::*;
    use scholar_rag_core::chunk::hash_text;
    use serde_json::json;
    use tempfile::TempDir;

    fn sample_corpus(n: usize) -> Corpus {
        let entries = (0..n)
            .map(|i| {
                let text = format!("document number {}", i);
                let document = Document::new(format!("doc-{}", i), text.clone())
                    .with_metadata("start", json!(i as f64 * 1.5))
                    .with_metadata("name", json!(format!("Lecture {}", i)));
                let vector = vec![i as f32 * 0.1, -0.333_333_34, f32::MIN_POSITIVE, 1e-7];
                CorpusEntry {
                    chunks: vec![EmbeddedChunk {
                        chunk: Chunk {
                            parent_id: document.id.clone(),
                            ordinal: 0,
                            hash: hash_text(&text),
                            text,
                        },
                        vector,
                    }],
                    document,
                }
            })
            .collect();
        Corpus {
            model: "bge-m3".to_string(),
            dims: 4,
            entries,
        }
    }

    #[test]
    fn ten_document_roundtrip_is_exact() {
        let tmp = TempDir::new().unwrap();
        let store = FileCorpusStore::new(tmp.path().join("corpus.json"));
        let corpus = sample_corpus(10);
        store.persist(&corpus).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded, corpus);
        for (a, b) in loaded.entries.iter().zip(&corpus.entries) {
            let bits_a: Vec<u32> = a.chunks[0].vector.iter().map(|v| v.to_bits()).collect();
            let bits_b: Vec<u32> = b.chunks[0].vector.iter().map(|v| v.to_bits()).collect();
            assert_eq!(bits_a, bits_b);
        }
    }

    #[test]
    fn missing_file_is_corpus_not_found() {
        let tmp = TempDir::new().unwrap();
        let store = FileCorpusStore::new(tmp.path().join("absent.json"));
        assert!(!store.exists());
        assert!(matches!(store.load(), Err(Error::CorpusNotFound(_))));
    }

    #[test]
    fn persist_creates_parent_dirs_and_overwrites() {
        let tmp = TempDir::new().unwrap();
        let store = FileCorpusStore::new(tmp.path().join("nested/dir/corpus.json"));
        store.persist(&sample_corpus(3)).unwrap();
        store.persist(&sample_corpus(1)).unwrap();
        assert_eq!(store.load().unwrap().len(), 1);
        let leftovers: Vec<_> = std::fs::read_dir(tmp.path().join("nested/dir"))
            .unwrap()
            .collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn failed_write_leaves_previous_snapshot() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("corpus.json");
        let store = FileCorpusStore::new(&path);
        store.persist(&sample_corpus(2)).unwrap();
        let before = std::fs::read(&path).unwrap();

        // A directory at the destination makes the final rename fail.
        let blocked = FileCorpusStore::new(tmp.path().join("blocked"));
        std::fs::create_dir(tmp.path().join("blocked")).unwrap();
        std::fs::write(tmp.path().join("blocked/keep"), "x").unwrap();
        assert!(blocked.persist(&sample_corpus(5)).is_err());

        assert_eq!(std::fs::read(&path).unwrap(), before);
        assert_eq!(store.load().unwrap().len(), 2);
    }

    #[test]
    fn garbage_file_is_corrupt() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("corpus.json");
        std::fs::write(&path, "not json").unwrap();
        let store = FileCorpusStore::new(&path);
        assert!(store.exists());
        assert!(matches!(store.load(), Err(Error::CorruptSnapshot(_))));
    }

    #[test]
    fn wrong_version_and_wrong_arity_are_corrupt() {
        let corpus = sample_corpus(2);

        let mut snapshot = to_snapshot(&corpus, Utc::now());
        snapshot.format_version = 99;
        assert!(matches!(from_snapshot(snapshot), Err(Error::CorruptSnapshot(_))));

        let mut snapshot = to_snapshot(&corpus, Utc::now());
        snapshot.dims = 3;
        assert!(matches!(from_snapshot(snapshot), Err(Error::CorruptSnapshot(_))));

        let mut snapshot = to_snapshot(&corpus, Utc::now());
        snapshot.documents[0].chunks[0].vector = "!!!".to_string();
        assert!(matches!(from_snapshot(snapshot), Err(Error::CorruptSnapshot(_))));
    }

    #[test]
    fn info_reads_header() {
        let tmp = TempDir::new().unwrap();
        let store = FileCorpusStore::new(tmp.path().join("corpus.json"));
        store.persist(&sample_corpus(1)).unwrap();
        let info = store.info().unwrap();
        assert_eq!(info.format_version, FORMAT_VERSION);
        assert_eq!(info.model, "bge-m3");
        assert_eq!(info.dims, 4);
    }
}
