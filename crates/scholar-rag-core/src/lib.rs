//! # Scholar RAG Core
//!
//! Runtime-free logic for Scholar RAG: data models, the error taxonomy,
//! token chunking, the embedding and generation provider traits, corpus
//! construction, the corpus store abstraction, cosine retrieval, prompt
//! building, and the question-answering pipeline.
//!
//! This crate contains no tokio, reqwest, or filesystem I/O. Concrete
//! providers, the on-disk snapshot store, and the front doors live in the
//! `scholar-rag` application crate.

pub mod chunk;
pub mod corpus;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod models;
pub mod pipeline;
pub mod prompt;
pub mod search;
pub mod store;
pub mod tokenize;

pub use error::{Error, Result};
