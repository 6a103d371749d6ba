//! HTTP generation providers.
//!
//! Implementations of the core [`Generator`] trait:
//! - **[`DisabledGenerator`]**: always errors.
//! - **[`OllamaGenerator`]**: `POST {url}/api/generate` with `stream: false`.
//! - **[`OpenAIGenerator`]**: `POST {url}/v1/chat/completions`, one user message.
//! - **[`GeminiGenerator`]**: `POST {url}/v1beta/models/{model}:generateContent`.
//!
//! Generation is a single call per question. Failures are not retried;
//! they surface as [`Error::GenerationProvider`] and the upstream body is
//! only logged.

use anyhow::{anyhow, bail};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use scholar_rag_core::generation::Generator;
use scholar_rag_core::{Error, Result};

use crate::config::GenerationConfig;

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const DEFAULT_OPENAI_URL: &str = "https://api.openai.com";
const DEFAULT_GEMINI_URL: &str = "https://generativelanguage.googleapis.com";

/// Build the generator named by `generation.provider`.
pub fn create_generator(config: &GenerationConfig) -> anyhow::Result<Arc<dyn Generator>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledGenerator)),
        "ollama" => Ok(Arc::new(OllamaGenerator::new(config)?)),
        "openai" => Ok(Arc::new(OpenAIGenerator::new(config)?)),
        "gemini" => Ok(Arc::new(GeminiGenerator::new(config)?)),
        other => bail!("Unknown generation provider: {}", other),
    }
}

pub struct DisabledGenerator;

#[async_trait]
impl Generator for DisabledGenerator {
    fn model_name(&self) -> &str {
        "disabled"
    }
    async fn generate(&self, _prompt: &str) -> Result<String> {
        Err(Error::GenerationProvider(
            "generation provider is disabled; set [generation] provider in the config".to_string(),
        ))
    }
}

/// Client, base URL and model shared by the HTTP generators.
struct Endpoint {
    client: reqwest::Client,
    url: String,
    model: String,
    temperature: Option<f32>,
}

impl Endpoint {
    fn new(config: &GenerationConfig, provider: &str, default_url: &str) -> anyhow::Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow!("generation.model required for {} provider", provider))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let url = config
            .url
            .as_deref()
            .unwrap_or(default_url)
            .trim_end_matches('/')
            .to_string();
        Ok(Self {
            client,
            url,
            model,
            temperature: config.temperature,
        })
    }

    /// Send one request and decode the success body.
    async fn call<T: DeserializeOwned>(
        &self,
        label: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<T> {
        let response = request.send().await.map_err(|e| {
            Error::GenerationProvider(format!(
                "{} connection error (is it reachable at {}?): {}",
                label, self.url, e
            ))
        })?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(provider = label, %status, body = %body, "generation request failed");
            return Err(Error::GenerationProvider(format!(
                "{} API error {}",
                label, status
            )));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| Error::GenerationProvider(format!("invalid {} response: {}", label, e)))
    }
}

fn non_empty(label: &str, text: String) -> Result<String> {
    if text.trim().is_empty() {
        return Err(Error::GenerationProvider(format!(
            "{} response missing text content",
            label
        )));
    }
    Ok(text)
}

// ============ Ollama ============

pub struct OllamaGenerator {
    endpoint: Endpoint,
}

#[derive(Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

impl OllamaGenerator {
    pub fn new(config: &GenerationConfig) -> anyhow::Result<Self> {
        Ok(Self {
            endpoint: Endpoint::new(config, "Ollama", DEFAULT_OLLAMA_URL)?,
        })
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    fn model_name(&self) -> &str {
        &self.endpoint.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let ep = &self.endpoint;
        let body = OllamaGenerateRequest {
            model: &ep.model,
            prompt,
            stream: false,
            options: ep.temperature.map(|temperature| OllamaOptions { temperature }),
        };
        let request = ep
            .client
            .post(format!("{}/api/generate", ep.url))
            .json(&body);
        let parsed: OllamaGenerateResponse = ep.call("Ollama", request).await?;
        non_empty("Ollama", parsed.response)
    }
}

// ============ OpenAI ============

/// Chat-completions generator. Requires `OPENAI_API_KEY`.
pub struct OpenAIGenerator {
    endpoint: Endpoint,
    api_key: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAIGenerator {
    pub fn new(config: &GenerationConfig) -> anyhow::Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow!("OPENAI_API_KEY environment variable not set"))?;
        Ok(Self {
            endpoint: Endpoint::new(config, "OpenAI", DEFAULT_OPENAI_URL)?,
            api_key,
        })
    }
}

#[async_trait]
impl Generator for OpenAIGenerator {
    fn model_name(&self) -> &str {
        &self.endpoint.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let ep = &self.endpoint;
        let body = ChatRequest {
            model: &ep.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: ep.temperature,
        };
        let request = ep
            .client
            .post(format!("{}/v1/chat/completions", ep.url))
            .bearer_auth(&self.api_key)
            .json(&body);
        let parsed: ChatResponse = ep.call("OpenAI", request).await?;
        non_empty("OpenAI", chat_text(parsed))
    }
}

fn chat_text(response: ChatResponse) -> String {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .unwrap_or_default()
}

// ============ Gemini ============

/// Gemini `generateContent` generator. Requires `GEMINI_API_KEY`.
pub struct GeminiGenerator {
    endpoint: Endpoint,
    api_key: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    contents: Vec<GeminiContent<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Serialize)]
struct GeminiContent<'a> {
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GeminiGenerationConfig {
    temperature: f32,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: GeminiCandidateContent,
}

#[derive(Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiResponsePart>,
}

#[derive(Deserialize)]
struct GeminiResponsePart {
    #[serde(default)]
    text: Option<String>,
}

impl GeminiGenerator {
    pub fn new(config: &GenerationConfig) -> anyhow::Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| anyhow!("GEMINI_API_KEY environment variable not set"))?;
        Ok(Self {
            endpoint: Endpoint::new(config, "Gemini", DEFAULT_GEMINI_URL)?,
            api_key,
        })
    }
}

#[async_trait]
impl Generator for GeminiGenerator {
    fn model_name(&self) -> &str {
        &self.endpoint.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let ep = &self.endpoint;
        let body = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart { text: prompt }],
            }],
            generation_config: ep
                .temperature
                .map(|temperature| GeminiGenerationConfig { temperature }),
        };
        let request = ep
            .client
            .post(format!(
                "{}/v1beta/models/{}:generateContent",
                ep.url, ep.model
            ))
            .header("x-goog-api-key", &self.api_key)
            .json(&body);
        let parsed: GeminiResponse = ep.call("Gemini", request).await?;
        non_empty("Gemini", gemini_text(parsed))
    }
}

/// Concatenate the text parts of the first candidate.
fn gemini_text(response: GeminiResponse) -> String {
    response
        .candidates
        .into_iter()
        .next()
        .map(|c| {
            c.content
                .parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default()
}
