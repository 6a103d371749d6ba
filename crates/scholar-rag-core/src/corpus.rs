//! Corpus construction: chunk, embed, and group documents.
//!
//! [`build_corpus`] turns a list of [`Document`]s into a [`Corpus`] entirely in
//! memory. Callers persist it through a [`CorpusStore`] only once every step
//! has succeeded, so a failed build never replaces a good snapshot;
//! [`reusable_snapshot`] reads the previous one back for vector reuse.
//!
//! # Vector reuse
//!
//! When the previous corpus was produced by the same model with the same
//! dimensionality, chunks whose SHA-256 hash is unchanged take their vector
//! from it instead of being sent to the provider again.

use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::chunk::chunk_document;
use crate::embedding::{check_chunk_size, validate_embeddings, Embedder};
use crate::models::{Chunk, Corpus, CorpusEntry, Document, EmbeddedChunk};
use crate::store::CorpusStore;
use crate::tokenize::Tokenizer;
use crate::{Error, Result};

/// Chunking and batching knobs for a build.
#[derive(Debug, Clone, Copy)]
pub struct BuildOptions {
    /// Token window size handed to the chunker.
    pub max_tokens: usize,
    /// Texts per embedding request.
    pub batch_size: usize,
}

/// Progress event emitted after every embedding batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildProgress {
    pub embedded_chunks: usize,
    pub total_chunks: usize,
}

/// Counts describing what a build did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    pub documents_seen: usize,
    pub documents_indexed: usize,
    pub documents_skipped_blank: usize,
    pub chunks: usize,
    pub chunks_embedded: usize,
    pub chunks_reused: usize,
}

/// Build a corpus in memory.
///
/// Blank documents are skipped. Every chunk is checked against the
/// embedder's input limit before any provider call is made.
///
/// # Errors
///
/// - `InvalidArgument` for duplicate document ids or zero batch size.
/// - `ChunkTooLarge` when chunking and provider limits disagree.
/// - `EmbeddingProvider` from the embedder, or when it returns the wrong
///   number of vectors or vectors of the wrong length.
pub async fn build_corpus(
    documents: &[Document],
    tokenizer: &dyn Tokenizer,
    embedder: &dyn Embedder,
    options: BuildOptions,
    previous: Option<&Corpus>,
    on_progress: &(dyn Fn(BuildProgress) + Sync),
) -> Result<(Corpus, BuildReport)> {
    if options.batch_size == 0 {
        return Err(Error::InvalidArgument("batch_size must be > 0".to_string()));
    }

    let mut seen = HashSet::new();
    for doc in documents {
        if !seen.insert(doc.id.as_str()) {
            return Err(Error::InvalidArgument(format!(
                "duplicate document id: {}",
                doc.id
            )));
        }
    }

    let mut report = BuildReport {
        documents_seen: documents.len(),
        ..BuildReport::default()
    };

    let mut chunked: Vec<(&Document, Vec<Chunk>)> = Vec::new();
    for doc in documents {
        if doc.is_blank() {
            report.documents_skipped_blank += 1;
            continue;
        }
        let chunks = chunk_document(tokenizer, doc, options.max_tokens)?;
        for chunk in &chunks {
            check_chunk_size(tokenizer, &chunk.text, embedder.max_input_tokens())?;
        }
        chunked.push((doc, chunks));
    }

    let reusable = reusable_vectors(previous, embedder);

    let mut vectors: Vec<Vec<Option<Vec<f32>>>> = Vec::with_capacity(chunked.len());
    let mut pending: Vec<(usize, usize)> = Vec::new();
    for (d, (_, chunks)) in chunked.iter().enumerate() {
        let mut slots = Vec::with_capacity(chunks.len());
        for (c, chunk) in chunks.iter().enumerate() {
            match reusable.get(chunk.hash.as_str()) {
                Some(v) => {
                    slots.push(Some((*v).clone()));
                    report.chunks_reused += 1;
                }
                None => {
                    slots.push(None);
                    pending.push((d, c));
                }
            }
        }
        vectors.push(slots);
    }

    let total = pending.len();
    let dims = embedder.dims();
    for batch in pending.chunks(options.batch_size) {
        let texts: Vec<String> = batch
            .iter()
            .map(|&(d, c)| chunked[d].1[c].text.clone())
            .collect();
        let embedded = embedder.embed_many(&texts).await?;
        validate_embeddings(texts.len(), dims, &embedded)?;
        for (&(d, c), v) in batch.iter().zip(embedded) {
            vectors[d][c] = Some(v);
        }
        report.chunks_embedded += batch.len();
        on_progress(BuildProgress {
            embedded_chunks: report.chunks_embedded,
            total_chunks: total,
        });
    }

    let mut entries = Vec::with_capacity(chunked.len());
    for ((doc, chunks), slots) in chunked.into_iter().zip(vectors) {
        let mut embedded_chunks = Vec::with_capacity(chunks.len());
        for (chunk, slot) in chunks.into_iter().zip(slots) {
            let vector = slot.ok_or_else(|| {
                Error::EmbeddingProvider(format!(
                    "no vector produced for chunk {} of '{}'",
                    chunk.ordinal, chunk.parent_id
                ))
            })?;
            embedded_chunks.push(EmbeddedChunk { chunk, vector });
        }
        report.chunks += embedded_chunks.len();
        entries.push(CorpusEntry {
            document: doc.clone(),
            chunks: embedded_chunks,
        });
    }
    report.documents_indexed = entries.len();

    let corpus = Corpus {
        model: embedder.model_name().to_string(),
        dims,
        entries,
    };
    Ok((corpus, report))
}

/// Load the snapshot a rebuild may take vectors from.
///
/// A missing snapshot, or one that is unreadable or inconsistent, yields
/// `None`: it is about to be replaced anyway. Other store errors propagate.
pub fn reusable_snapshot(store: &dyn CorpusStore) -> Result<Option<Corpus>> {
    match store.load() {
        Ok(c) => Ok(Some(c)),
        Err(Error::CorpusNotFound(_))
        | Err(Error::CorruptSnapshot(_))
        | Err(Error::DimensionMismatch { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

fn reusable_vectors<'a>(
    previous: Option<&'a Corpus>,
    embedder: &dyn Embedder,
) -> HashMap<&'a str, &'a Vec<f32>> {
    let mut map = HashMap::new();
    if let Some(prev) = previous {
        if prev.model == embedder.model_name() && prev.dims == embedder.dims() {
            for ec in prev.entries.iter().flat_map(|e| e.chunks.iter()) {
                if ec.vector.len() == prev.dims {
                    map.entry(ec.chunk.hash.as_str()).or_insert(&ec.vector);
                }
            }
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryCorpusStore;
    use crate::tokenize::ByteTokenizer;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Embeds text as `[len, vowel count]`, counting every text it sees.
    struct CountingEmbedder {
        calls: AtomicUsize,
        texts: AtomicUsize,
        max_input: usize,
    }

    impl CountingEmbedder {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                texts: AtomicUsize::new(0),
                max_input: 1000,
            }
        }
    }

    #[async_trait]
    impl Embedder for CountingEmbedder {
        fn model_name(&self) -> &str {
            "counting"
        }
        fn dims(&self) -> usize {
            2
        }
        fn max_input_tokens(&self) -> usize {
            self.max_input
        }
        async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.texts.fetch_add(texts.len(), Ordering::SeqCst);
            Ok(texts
                .iter()
                .map(|t| {
                    let vowels = t.chars().filter(|c| "aeiou".contains(*c)).count();
                    vec![t.len() as f32, vowels as f32]
                })
                .collect())
        }
    }

    /// Always returns one vector too few.
    struct ShortEmbedder;

    #[async_trait]
    impl Embedder for ShortEmbedder {
        fn model_name(&self) -> &str {
            "short"
        }
        fn dims(&self) -> usize {
            2
        }
        fn max_input_tokens(&self) -> usize {
            1000
        }
        async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(vec![vec![1.0, 0.0]; texts.len().saturating_sub(1)])
        }
    }

    fn opts(max_tokens: usize, batch_size: usize) -> BuildOptions {
        BuildOptions {
            max_tokens,
            batch_size,
        }
    }

    fn no_progress(_: BuildProgress) {}

    #[tokio::test]
    async fn blank_documents_excluded() {
        let docs = vec![
            Document::new("a", "hello world"),
            Document::new("b", "   "),
            Document::new("c", ""),
            Document::new("d", "goodbye"),
        ];
        let embedder = CountingEmbedder::new();
        let (corpus, report) =
            build_corpus(&docs, &ByteTokenizer, &embedder, opts(100, 8), None, &no_progress)
                .await
                .unwrap();
        let ids: Vec<&str> = corpus.entries.iter().map(|e| e.document.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "d"]);
        assert_eq!(report.documents_skipped_blank, 2);
        assert_eq!(report.documents_indexed, 2);
        assert_eq!(corpus.dims, 2);
        assert_eq!(corpus.model, "counting");
    }

    #[tokio::test]
    async fn long_documents_get_multiple_chunks_and_batches() {
        let docs = vec![Document::new("a", "abcdefghij"), Document::new("b", "klmno")];
        let embedder = CountingEmbedder::new();
        let events = std::sync::Mutex::new(Vec::new());
        let record = |p: BuildProgress| events.lock().unwrap().push(p);
        let (corpus, report) =
            build_corpus(&docs, &ByteTokenizer, &embedder, opts(4, 2), None, &record)
                .await
                .unwrap();
        assert_eq!(corpus.entries[0].chunks.len(), 3);
        assert_eq!(corpus.entries[1].chunks.len(), 2);
        assert_eq!(report.chunks, 5);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 3);
        let events = events.into_inner().unwrap();
        assert_eq!(events.last().unwrap().embedded_chunks, 5);
        assert_eq!(events.last().unwrap().total_chunks, 5);
        assert!(corpus.validate().is_ok());
    }

    #[tokio::test]
    async fn duplicate_ids_rejected() {
        let docs = vec![Document::new("a", "x"), Document::new("a", "y")];
        let err = build_corpus(
            &docs,
            &ByteTokenizer,
            &CountingEmbedder::new(),
            opts(10, 4),
            None,
            &no_progress,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn oversized_chunk_rejected_before_call() {
        let mut embedder = CountingEmbedder::new();
        embedder.max_input = 3;
        let docs = vec![Document::new("a", "abcdef")];
        let err = build_corpus(&docs, &ByteTokenizer, &embedder, opts(5, 4), None, &no_progress)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ChunkTooLarge { tokens: 5, limit: 3 }));
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn malformed_provider_output_fails() {
        let docs = vec![Document::new("a", "one"), Document::new("b", "two")];
        let err = build_corpus(&docs, &ByteTokenizer, &ShortEmbedder, opts(10, 4), None, &no_progress)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EmbeddingProvider(_)));
    }

    #[tokio::test]
    async fn unchanged_chunks_reuse_previous_vectors() {
        let embedder = CountingEmbedder::new();
        let docs = vec![Document::new("a", "alpha"), Document::new("b", "beta")];
        let (first, _) =
            build_corpus(&docs, &ByteTokenizer, &embedder, opts(100, 8), None, &no_progress)
                .await
                .unwrap();
        assert_eq!(embedder.texts.load(Ordering::SeqCst), 2);

        let docs2 = vec![
            Document::new("a", "alpha"),
            Document::new("b", "beta"),
            Document::new("c", "gamma"),
        ];
        let (second, report) = build_corpus(
            &docs2,
            &ByteTokenizer,
            &embedder,
            opts(100, 8),
            Some(&first),
            &no_progress,
        )
        .await
        .unwrap();
        assert_eq!(report.chunks_reused, 2);
        assert_eq!(report.chunks_embedded, 1);
        assert_eq!(embedder.texts.load(Ordering::SeqCst), 3);
        assert_eq!(second.entries[0], first.entries[0]);
    }

    #[tokio::test]
    async fn reusable_snapshot_tolerates_missing_store() {
        let store = InMemoryCorpusStore::new();
        assert!(reusable_snapshot(&store).unwrap().is_none());

        let docs = vec![Document::new("a", "alpha")];
        let (corpus, _) = build_corpus(
            &docs,
            &ByteTokenizer,
            &CountingEmbedder::new(),
            opts(100, 8),
            None,
            &no_progress,
        )
        .await
        .unwrap();
        store.persist(&corpus).unwrap();
        assert_eq!(reusable_snapshot(&store).unwrap(), Some(corpus));
    }
}
