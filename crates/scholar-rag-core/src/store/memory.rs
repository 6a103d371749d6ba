//! In-memory [`CorpusStore`] for tests and embedding in other programs.

use std::sync::RwLock;

use crate::models::Corpus;
use crate::{Error, Result};

use super::CorpusStore;

/// Keeps the "persisted" corpus behind a `RwLock`.
#[derive(Default)]
pub struct InMemoryCorpusStore {
    corpus: RwLock<Option<Corpus>>,
}

impl InMemoryCorpusStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CorpusStore for InMemoryCorpusStore {
    fn load(&self) -> Result<Corpus> {
        let guard = self.corpus.read().unwrap_or_else(|e| e.into_inner());
        guard
            .clone()
            .ok_or_else(|| Error::CorpusNotFound("in-memory store is empty".to_string()))
    }

    fn persist(&self, corpus: &Corpus) -> Result<()> {
        let mut guard = self.corpus.write().unwrap_or_else(|e| e.into_inner());
        *guard = Some(corpus.clone());
        Ok(())
    }

    fn exists(&self) -> bool {
        self.corpus
            .read()
            .map(|g| g.is_some())
            .unwrap_or(false)
    }
}
