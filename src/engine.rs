//! Corpus lifecycle and query entry point.
//!
//! A [`RagEngine`] owns the configured providers, the snapshot store and
//! the current [`Corpus`]. The CLI and the HTTP server both go through it.
//!
//! # Concurrency
//!
//! The corpus sits behind `RwLock<Arc<Corpus>>`. Queries clone the `Arc`
//! and search without holding the lock. Rebuilds are serialized by an async
//! mutex; a rebuild requested while another is running fails immediately
//! with [`Error::RebuildInProgress`]. A rebuild builds the new corpus off to
//! the side, persists it, and only then swaps it in, so queries never see a
//! partial corpus.

use anyhow::{Context, Result};
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;

use scholar_rag_core::corpus::{build_corpus, reusable_snapshot, BuildOptions, BuildReport};
use scholar_rag_core::embedding::Embedder;
use scholar_rag_core::generation::Generator;
use scholar_rag_core::models::{Answer, Corpus, RetrievalResult};
use scholar_rag_core::pipeline::{Pipeline, Prepared};
use scholar_rag_core::prompt::PromptTemplate;
use scholar_rag_core::search::SearchParams;
use scholar_rag_core::store::CorpusStore;
use scholar_rag_core::tokenize::Tokenizer;
use scholar_rag_core::Error;

use crate::chunk::create_tokenizer;
use crate::config::Config;
use crate::embedding::create_embedder;
use crate::generation::create_generator;
use crate::loader::load_documents;
use crate::progress::{BuildProgressEvent, BuildProgressReporter};
use crate::snapshot::FileCorpusStore;

/// Provider and storage handles an engine is assembled from.
pub struct Components {
    pub tokenizer: Arc<dyn Tokenizer>,
    pub embedder: Arc<dyn Embedder>,
    pub generator: Arc<dyn Generator>,
    pub store: Arc<dyn CorpusStore>,
}

impl Components {
    /// Build every component from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            tokenizer: create_tokenizer(config)?,
            embedder: create_embedder(&config.embedding)?,
            generator: create_generator(&config.generation)?,
            store: Arc::new(FileCorpusStore::new(&config.corpus.path)),
        })
    }
}

pub struct RagEngine {
    config: Config,
    template: PromptTemplate,
    components: Components,
    corpus: RwLock<Arc<Corpus>>,
    rebuild_lock: Mutex<()>,
}

impl RagEngine {
    /// Create an engine from configuration, loading the snapshot or building
    /// it once if none exists.
    pub async fn open(config: Config, reporter: &dyn BuildProgressReporter) -> Result<Self> {
        let components = Components::from_config(&config)?;
        Self::open_with(config, components, reporter).await
    }

    /// Like [`open`](Self::open) with caller-supplied components.
    pub async fn open_with(
        config: Config,
        components: Components,
        reporter: &dyn BuildProgressReporter,
    ) -> Result<Self> {
        let engine = Self::new(config, components)?;
        match engine.components.store.load() {
            Ok(corpus) => {
                tracing::info!(
                    documents = corpus.len(),
                    chunks = corpus.chunk_count(),
                    model = %corpus.model,
                    "corpus loaded"
                );
                let embedder = &engine.components.embedder;
                if corpus.model != embedder.model_name() || corpus.dims != embedder.dims() {
                    tracing::warn!(
                        snapshot_model = %corpus.model,
                        configured_model = %embedder.model_name(),
                        "snapshot was built with a different embedding model; run `scholar build --force`"
                    );
                }
                engine.swap(corpus);
            }
            Err(Error::CorpusNotFound(path)) => {
                tracing::info!(path = %path, "no corpus snapshot, building");
                engine.rebuild(false, reporter).await?;
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!(
                        "Failed to load corpus snapshot {} (run `scholar build --force` to replace it)",
                        engine.config.corpus.path.display()
                    )
                })
            }
        }
        Ok(engine)
    }

    /// Assemble an engine with an empty corpus and no I/O.
    pub fn new(config: Config, components: Components) -> Result<Self> {
        let template = config.prompt.resolve()?;
        let empty = Corpus::empty(components.embedder.model_name(), components.embedder.dims());
        Ok(Self {
            config,
            template,
            components,
            corpus: RwLock::new(Arc::new(empty)),
            rebuild_lock: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Snapshot of the current corpus.
    pub fn corpus(&self) -> Arc<Corpus> {
        self.corpus
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn swap(&self, corpus: Corpus) {
        *self.corpus.write().unwrap_or_else(|e| e.into_inner()) = Arc::new(corpus);
    }

    fn pipeline(&self, top_k: Option<usize>) -> Pipeline<'_> {
        Pipeline {
            embedder: self.components.embedder.as_ref(),
            tokenizer: self.components.tokenizer.as_ref(),
            generator: self.components.generator.as_ref(),
            template: &self.template,
            params: SearchParams {
                top_k: top_k.unwrap_or(self.config.retrieval.top_k),
                max_tokens: self.config.chunking.max_tokens,
                min_score: self.config.retrieval.min_score,
            },
        }
    }

    /// Rank documents for `query`. `top_k` defaults to `retrieval.top_k`.
    pub async fn search(
        &self,
        query: &str,
        top_k: Option<usize>,
    ) -> scholar_rag_core::Result<RetrievalResult> {
        let corpus = self.corpus();
        Ok(self.pipeline(top_k).prepare(&corpus, query).await?.results)
    }

    /// Retrieve and build the prompt without generating.
    pub async fn prepare(
        &self,
        question: &str,
        top_k: Option<usize>,
    ) -> scholar_rag_core::Result<Prepared> {
        let corpus = self.corpus();
        self.pipeline(top_k).prepare(&corpus, question).await
    }

    /// Generate an answer for a prepared request.
    pub async fn complete(&self, prepared: Prepared) -> scholar_rag_core::Result<Answer> {
        self.pipeline(None).complete(prepared).await
    }

    /// Answer `question` from the current corpus.
    pub async fn answer(&self, question: &str) -> scholar_rag_core::Result<Answer> {
        let corpus = self.corpus();
        let started = std::time::Instant::now();
        let answer = self.pipeline(None).answer(&corpus, question).await?;
        tracing::info!(
            sources = answer.sources.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "answered question"
        );
        Ok(answer)
    }

    /// Reload documents, rebuild the corpus, persist it, and swap it in.
    ///
    /// With `force`, no vectors are reused from the previous snapshot.
    ///
    /// # Errors
    ///
    /// [`Error::RebuildInProgress`] when another rebuild holds the lock. On
    /// any failure the current corpus and snapshot are left unchanged.
    pub async fn rebuild(
        &self,
        force: bool,
        reporter: &dyn BuildProgressReporter,
    ) -> Result<BuildReport> {
        let _guard = self
            .rebuild_lock
            .try_lock()
            .map_err(|_| Error::RebuildInProgress)?;

        // Filesystem work stays off the async workers.
        let corpus_config = self.config.corpus.clone();
        let documents = tokio::task::spawn_blocking(move || load_documents(&corpus_config))
            .await
            .context("document loading task failed")??;
        reporter.report(BuildProgressEvent::Loaded {
            documents: documents.len() as u64,
        });

        let c = &self.components;
        let previous = if force {
            None
        } else {
            let store = Arc::clone(&c.store);
            tokio::task::spawn_blocking(move || reusable_snapshot(store.as_ref()))
                .await
                .context("snapshot loading task failed")??
        };

        let options = BuildOptions {
            max_tokens: self.config.chunking.max_tokens,
            batch_size: self.config.embedding.batch_size,
        };
        let on_progress = |p: scholar_rag_core::corpus::BuildProgress| {
            reporter.report(BuildProgressEvent::Embedding {
                n: p.embedded_chunks as u64,
                total: p.total_chunks as u64,
            })
        };
        let (corpus, report) = build_corpus(
            &documents,
            c.tokenizer.as_ref(),
            c.embedder.as_ref(),
            options,
            previous.as_ref(),
            &on_progress,
        )
        .await?;

        let store = Arc::clone(&c.store);
        let corpus = tokio::task::spawn_blocking(move || store.persist(&corpus).map(|()| corpus))
            .await
            .context("snapshot write task failed")??;

        tracing::info!(
            documents = report.documents_indexed,
            skipped_blank = report.documents_skipped_blank,
            chunks = report.chunks,
            embedded = report.chunks_embedded,
            reused = report.chunks_reused,
            "corpus rebuilt"
        );
        self.swap(corpus);
        Ok(report)
    }
}
