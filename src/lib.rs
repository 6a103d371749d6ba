//! # Scholar RAG
//!
//! Retrieval-augmented question answering over a local corpus of lecture
//! transcripts, notes, and posts.
//!
//! Documents are split into token-bounded chunks, embedded through an HTTP
//! provider, and kept in a JSON snapshot. A question is embedded the same
//! way, the closest documents are ranked by cosine similarity, and their
//! text is assembled into a prompt for a language model.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌──────────────┐
//! │   Loader    │──▶│ Chunk+Embed │──▶│   Snapshot   │
//! │ json/md/txt │   │  (tiktoken) │   │ (JSON, atomic)│
//! └─────────────┘   └─────────────┘   └──────┬───────┘
//!                                           │
//!                     ┌─────────────────────┤
//!                     ▼                     ▼
//!               ┌───────────┐        ┌────────────┐
//!               │ RagEngine │◀──────▶│  Retrieve  │
//!               └─────┬─────┘        │ + Prompt   │
//!                     │              │ + Generate │
//!            ┌────────┴────────┐     └────────────┘
//!            ▼                 ▼
//!      ┌──────────┐      ┌──────────┐
//!      │   CLI    │      │   HTTP   │
//!      │(scholar) │      │  (axum)  │
//!      └──────────┘      └──────────┘
//! ```
//!
//! The provider-independent pieces (models, chunking, ranking, prompt
//! building, the answer pipeline) live in `scholar-rag-core`; this crate
//! adds configuration, HTTP providers, storage, and the front doors.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`chunk`] | tiktoken tokenizer |
//! | [`embedding`] | Embedding providers (Ollama, OpenAI) |
//! | [`generation`] | Generation providers (Ollama, OpenAI, Gemini) |
//! | [`loader`] | Document discovery and parsing |
//! | [`snapshot`] | JSON corpus snapshot store |
//! | [`engine`] | Corpus lifecycle and queries |
//! | [`ingest`] | `scholar build` |
//! | [`search`] | `scholar search` |
//! | [`ask`] | `scholar ask` and `scholar chat` |
//! | [`stats`] | `scholar stats` |
//! | [`server`] | HTTP front door |
//! | [`progress`] | Build progress reporting |

pub mod ask;
pub mod chunk;
pub mod config;
pub mod embedding;
pub mod engine;
pub mod generation;
pub mod ingest;
pub mod loader;
pub mod progress;
pub mod search;
pub mod server;
pub mod snapshot;
pub mod stats;

pub use scholar_rag_core as core;
