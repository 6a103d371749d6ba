//! HTTP embedding providers.
//!
//! Concrete implementations of the core [`Embedder`] trait:
//! - **[`DisabledEmbedder`]**: always errors; used when embeddings are not configured.
//! - **[`OllamaEmbedder`]**: `POST {url}/api/embed` on a local Ollama instance.
//! - **[`OpenAIEmbedder`]**: `POST {url}/v1/embeddings` on the OpenAI API.
//!
//! Use [`create_embedder`] to pick one from configuration:
//!
//! ```rust
//! # use scholar_rag::config::EmbeddingConfig;
//! # use scholar_rag::embedding::create_embedder;
//! # use scholar_rag::core::embedding::Embedder;
//! let config = EmbeddingConfig::default(); // provider = "disabled"
//! let embedder = create_embedder(&config).unwrap();
//! assert_eq!(embedder.model_name(), "disabled");
//! ```
//!
//! # Retry Strategy
//!
//! Both HTTP providers retry transient failures with exponential backoff:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)
//!
//! Responses are decoded into typed structs; any schema mismatch, count
//! mismatch or wrong vector length fails with
//! [`Error::EmbeddingProvider`](scholar_rag_core::Error::EmbeddingProvider).

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use scholar_rag_core::embedding::{validate_embeddings, Embedder};
use scholar_rag_core::{Error, Result};

use crate::config::EmbeddingConfig;

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const DEFAULT_OPENAI_URL: &str = "https://api.openai.com";

/// Build the embedder named by `embedding.provider`.
pub fn create_embedder(config: &EmbeddingConfig) -> anyhow::Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledEmbedder {
            max_input_tokens: config.max_input_tokens,
        })),
        "ollama" => Ok(Arc::new(OllamaEmbedder::new(config)?)),
        "openai" => Ok(Arc::new(OpenAIEmbedder::new(config)?)),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

// ============ Disabled ============

/// Embedder that refuses every request.
pub struct DisabledEmbedder {
    max_input_tokens: usize,
}

#[async_trait]
impl Embedder for DisabledEmbedder {
    fn model_name(&self) -> &str {
        "disabled"
    }
    fn dims(&self) -> usize {
        0
    }
    fn max_input_tokens(&self) -> usize {
        self.max_input_tokens
    }
    async fn embed_many(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(Error::EmbeddingProvider(
            "embedding provider is disabled; set [embedding] provider in the config".to_string(),
        ))
    }
}

// ============ Shared HTTP plumbing ============

/// Connection settings shared by the HTTP providers.
struct HttpSettings {
    client: reqwest::Client,
    url: String,
    max_retries: u32,
}

impl HttpSettings {
    fn new(config: &EmbeddingConfig, default_url: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| default_url.to_string())
            .trim_end_matches('/')
            .to_string();
        Ok(Self {
            client,
            url,
            max_retries: config.max_retries,
        })
    }
}

/// POST `body` to `url`, retrying 429/5xx/network errors, and decode the
/// success body as `T`.
async fn post_with_retry<B, T>(
    settings: &HttpSettings,
    label: &str,
    path: &str,
    bearer: Option<&str>,
    body: &B,
) -> Result<T>
where
    B: Serialize + ?Sized,
    T: DeserializeOwned,
{
    let endpoint = format!("{}{}", settings.url, path);
    let mut last_err = None;

    for attempt in 0..=settings.max_retries {
        if attempt > 0 {
            let delay = backoff_delay(attempt);
            tracing::warn!(
                provider = label,
                attempt,
                delay_secs = delay.as_secs(),
                "retrying embedding request"
            );
            tokio::time::sleep(delay).await;
        }

        let mut request = settings.client.post(&endpoint).json(body);
        if let Some(key) = bearer {
            request = request.bearer_auth(key);
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status();

                if status.is_success() {
                    return response.json::<T>().await.map_err(|e| {
                        Error::EmbeddingProvider(format!("invalid {} response: {}", label, e))
                    });
                }

                let body_text = response.text().await.unwrap_or_default();
                tracing::debug!(provider = label, %status, body = %body_text, "embedding error body");

                // Rate limited or server error: retry
                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(format!("{} API error {}", label, status));
                    continue;
                }

                return Err(Error::EmbeddingProvider(format!(
                    "{} API error {}",
                    label, status
                )));
            }
            Err(e) => {
                last_err = Some(format!(
                    "{} connection error (is it reachable at {}?): {}",
                    label, settings.url, e
                ));
                continue;
            }
        }
    }

    Err(Error::EmbeddingProvider(last_err.unwrap_or_else(|| {
        format!("{} embedding failed after retries", label)
    })))
}

/// 1s, 2s, 4s, ... capped at 32s.
fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1 << (attempt - 1).min(5))
}

fn required_model_and_dims(config: &EmbeddingConfig, provider: &str) -> anyhow::Result<(String, usize)> {
    let model = config
        .model
        .clone()
        .ok_or_else(|| anyhow!("embedding.model required for {} provider", provider))?;
    let dims = config
        .dims
        .ok_or_else(|| anyhow!("embedding.dims required for {} provider", provider))?;
    Ok((model, dims))
}

// ============ Ollama ============

/// Embedder backed by a local Ollama instance (default `http://localhost:11434`).
///
/// Requires the model to be pulled, e.g. `ollama pull bge-m3`.
pub struct OllamaEmbedder {
    model: String,
    dims: usize,
    max_input_tokens: usize,
    http: HttpSettings,
}

#[derive(Serialize)]
struct OllamaEmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> anyhow::Result<Self> {
        let (model, dims) = required_model_and_dims(config, "Ollama")?;
        Ok(Self {
            model,
            dims,
            max_input_tokens: config.max_input_tokens,
            http: HttpSettings::new(config, DEFAULT_OLLAMA_URL)?,
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
    fn max_input_tokens(&self) -> usize {
        self.max_input_tokens
    }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let request = OllamaEmbedRequest {
            model: &self.model,
            input: texts,
        };
        let response: OllamaEmbedResponse =
            post_with_retry(&self.http, "Ollama", "/api/embed", None, &request).await?;
        validate_embeddings(texts.len(), self.dims, &response.embeddings)?;
        Ok(response.embeddings)
    }
}

// ============ OpenAI ============

/// Embedder backed by the OpenAI embeddings API.
///
/// Requires `OPENAI_API_KEY` in the environment.
pub struct OpenAIEmbedder {
    model: String,
    dims: usize,
    max_input_tokens: usize,
    api_key: String,
    http: HttpSettings,
}

#[derive(Serialize)]
struct OpenAIEmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct OpenAIEmbedResponse {
    data: Vec<OpenAIEmbedding>,
}

#[derive(Deserialize)]
struct OpenAIEmbedding {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAIEmbedder {
    pub fn new(config: &EmbeddingConfig) -> anyhow::Result<Self> {
        let (model, dims) = required_model_and_dims(config, "OpenAI")?;
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow!("OPENAI_API_KEY environment variable not set"))?;
        Ok(Self {
            model,
            dims,
            max_input_tokens: config.max_input_tokens,
            api_key,
            http: HttpSettings::new(config, DEFAULT_OPENAI_URL)?,
        })
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
    fn max_input_tokens(&self) -> usize {
        self.max_input_tokens
    }

    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let request = OpenAIEmbedRequest {
            model: &self.model,
            input: texts,
        };
        let response: OpenAIEmbedResponse = post_with_retry(
            &self.http,
            "OpenAI",
            "/v1/embeddings",
            Some(&self.api_key),
            &request,
        )
        .await?;
        let vectors = order_openai_embeddings(response.data, texts.len())?;
        validate_embeddings(texts.len(), self.dims, &vectors)?;
        Ok(vectors)
    }
}

/// Place each embedding at its `index`; every input slot must be filled once.
fn order_openai_embeddings(data: Vec<OpenAIEmbedding>, expected: usize) -> Result<Vec<Vec<f32>>> {
    let mut slots: Vec<Option<Vec<f32>>> = vec![None; expected];
    for item in data {
        match slots.get_mut(item.index) {
            Some(slot) if slot.is_none() => *slot = Some(item.embedding),
            Some(_) => {
                return Err(Error::EmbeddingProvider(format!(
                    "duplicate embedding index {}",
                    item.index
                )))
            }
            None => {
                return Err(Error::EmbeddingProvider(format!(
                    "embedding index {} out of range for {} inputs",
                    item.index, expected
                )))
            }
        }
    }
    slots
        .into_iter()
        .enumerate()
        .map(|(i, v)| {
            v.ok_or_else(|| Error::EmbeddingProvider(format!("missing embedding for input {}", i)))
        })
        .collect()
}
