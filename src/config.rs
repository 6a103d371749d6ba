//! Configuration parsing and validation.
//!
//! Scholar RAG is configured with a TOML file (default
//! `config/scholar.toml`). Every section except `[corpus]` has defaults, so a
//! minimal file only names the documents directory:
//!
//! ```toml
//! [corpus]
//! documents = "./data"
//! ```
//!
//! API keys are never read from the file; the OpenAI providers use
//! `OPENAI_API_KEY` and the Gemini generator uses `GEMINI_API_KEY`.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use scholar_rag_core::prompt::{PromptTemplate, PRESETS};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub prompt: PromptConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    /// JSON snapshot location.
    #[serde(default = "default_snapshot_path")]
    pub path: PathBuf,
    /// Directory walked for source documents.
    pub documents: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
}

fn default_snapshot_path() -> PathBuf {
    PathBuf::from("./data/corpus.json")
}

fn default_include_globs() -> Vec<String> {
    vec![
        "**/*.json".to_string(),
        "**/*.md".to_string(),
        "**/*.txt".to_string(),
    ]
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    /// `cl100k_base` or `bytes`.
    #[serde(default = "default_tokenizer")]
    pub tokenizer: String,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            tokenizer: default_tokenizer(),
        }
    }
}

fn default_max_tokens() -> usize {
    7000
}
fn default_tokenizer() -> String {
    "cl100k_base".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL; each provider has its own default.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_input_tokens")]
    pub max_input_tokens: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            max_input_tokens: default_max_input_tokens(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_embedding_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_input_tokens() -> usize {
    8191
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub temperature: Option<f32>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_generation_provider(),
            model: None,
            url: None,
            timeout_secs: default_generation_timeout_secs(),
            temperature: None,
        }
    }
}

impl GenerationConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_generation_provider() -> String {
    "disabled".to_string()
}
fn default_generation_timeout_secs() -> u64 {
    120
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default)]
    pub min_score: Option<f32>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            min_score: None,
        }
    }
}

fn default_top_k() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct PromptConfig {
    #[serde(default = "default_preset")]
    pub preset: String,
    /// Replaces the preset's layout; must contain `{context}` and `{question}`.
    #[serde(default)]
    pub template: Option<String>,
    /// Replaces the preset's `{instructions}` text.
    #[serde(default)]
    pub instructions: Option<String>,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            preset: default_preset(),
            template: None,
            instructions: None,
        }
    }
}

impl PromptConfig {
    /// Resolve the preset and overrides into a template.
    pub fn resolve(&self) -> Result<PromptTemplate> {
        let preset = PromptTemplate::preset(&self.preset).with_context(|| {
            format!(
                "Unknown prompt preset: '{}'. Must be one of: {}",
                self.preset,
                PRESETS.join(", ")
            )
        })?;
        let mut template = match &self.template {
            Some(layout) => PromptTemplate::new(layout.clone(), preset.instructions())
                .context("Invalid prompt.template")?,
            None => preset,
        };
        if let Some(instructions) = &self.instructions {
            template = template.with_instructions(instructions.clone());
        }
        Ok(template)
    }
}

fn default_preset() -> String {
    "default".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content)
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    // Validate chunking
    if config.chunking.max_tokens == 0 {
        bail!("chunking.max_tokens must be > 0");
    }
    match config.chunking.tokenizer.as_str() {
        "cl100k_base" | "bytes" => {}
        other => bail!(
            "Unknown chunking.tokenizer: '{}'. Must be cl100k_base or bytes.",
            other
        ),
    }

    // Validate retrieval
    if config.retrieval.top_k == 0 {
        bail!("retrieval.top_k must be >= 1");
    }
    if let Some(min) = config.retrieval.min_score {
        if !(-1.0..=1.0).contains(&min) {
            bail!("retrieval.min_score must be in [-1.0, 1.0]");
        }
    }

    // Validate embedding
    let embedding = &config.embedding;
    match embedding.provider.as_str() {
        "disabled" | "ollama" | "openai" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, ollama, or openai.",
            other
        ),
    }
    if embedding.is_enabled() {
        if embedding.dims.is_none() || embedding.dims == Some(0) {
            bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                embedding.provider
            );
        }
        if embedding.model.is_none() {
            bail!(
                "embedding.model must be specified when provider is '{}'",
                embedding.provider
            );
        }
    }
    if embedding.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }
    if config.chunking.max_tokens > embedding.max_input_tokens {
        bail!(
            "chunking.max_tokens ({}) exceeds embedding.max_input_tokens ({})",
            config.chunking.max_tokens,
            embedding.max_input_tokens
        );
    }

    // Validate generation
    let generation = &config.generation;
    match generation.provider.as_str() {
        "disabled" | "ollama" | "openai" | "gemini" => {}
        other => bail!(
            "Unknown generation provider: '{}'. Must be disabled, ollama, openai, or gemini.",
            other
        ),
    }
    if generation.is_enabled() && generation.model.is_none() {
        bail!(
            "generation.model must be specified when provider is '{}'",
            generation.provider
        );
    }

    // Validate prompt
    config.prompt.resolve()?;

    Ok(config)
}
