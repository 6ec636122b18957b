//! Text generation backends.
//!
//! A [`Generator`] turns one [`Prompt`] into one completion.
//!
//! | Backend | Prompt shape | Endpoint |
//! |---------|--------------|----------|
//! | [`OpenAIChat`] | system + user messages | `POST {url}/v1/chat/completions` |
//! | [`OllamaGenerate`] | single prompt | `POST {url}/api/generate` |
//! | [`GeminiGenerate`] | single prompt | `POST .../models/{model}:generateContent` |
//!
//! Chat backends send the system and user instructions as separate
//! messages; single-prompt backends send [`Prompt::flatten`]. The backend is
//! picked once by [`create_generator`]. Each call is independent; no
//! conversation state is kept.

use async_trait::async_trait;

use crate::config::GenerationConfig;
use crate::error::{RagError, Result};
use crate::http;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    /// System and user instructions as one text, for single-prompt backends.
    pub fn flatten(&self) -> String {
        format!("{}\n\n{}", self.system, self.user)
    }
}

#[async_trait]
pub trait Generator: Send + Sync {
    /// Backend name as it appears in config (`"openai"`, ...).
    fn name(&self) -> &str;
    fn model(&self) -> &str;

    async fn generate(&self, prompt: &Prompt) -> Result<String>;
}

/// Sampling settings shared by every backend.
#[derive(Debug, Clone)]
struct Sampling {
    temperature: f32,
    max_tokens: u32,
    max_retries: u32,
}

impl From<&GenerationConfig> for Sampling {
    fn from(config: &GenerationConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
        }
    }
}

// ============ OpenAI chat completions ============

/// Chat-style backend for the OpenAI API or any compatible gateway.
pub struct OpenAIChat {
    model: String,
    url: String,
    api_key: String,
    sampling: Sampling,
    client: reqwest::Client,
}

impl OpenAIChat {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| RagError::Config("OPENAI_API_KEY environment variable not set".into()))?;
        Ok(Self {
            model: config.model.clone().unwrap_or_else(|| "gpt-4o-mini".to_string()),
            url: config
                .url
                .clone()
                .unwrap_or_else(|| "https://api.openai.com".to_string()),
            api_key,
            sampling: Sampling::from(config),
            client: http::client(config.timeout_secs).map_err(RagError::Config)?,
        })
    }
}

#[async_trait]
impl Generator for OpenAIChat {
    fn name(&self) -> &str {
        "openai"
    }
    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &Prompt) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": prompt.system },
                { "role": "user", "content": prompt.user },
            ],
            "temperature": self.sampling.temperature,
            "max_tokens": self.sampling.max_tokens,
        });
        let endpoint = format!("{}/v1/chat/completions", self.url.trim_end_matches('/'));

        let json = http::post_json_with_retry(
            || {
                self.client
                    .post(&endpoint)
                    .bearer_auth(&self.api_key)
                    .json(&body)
            },
            self.sampling.max_retries,
            "OpenAI",
        )
        .await
        .map_err(RagError::Generation)?;

        parse_chat_completion(&json)
    }
}

fn parse_chat_completion(json: &serde_json::Value) -> Result<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(|text| text.trim().to_string())
        .ok_or_else(|| RagError::Generation("No message content in chat completion".into()))
}

// ============ Ollama generate ============

/// Single-prompt backend for a local Ollama instance.
pub struct OllamaGenerate {
    model: String,
    url: String,
    sampling: Sampling,
    client: reqwest::Client,
}

impl OllamaGenerate {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| RagError::Config("generation.model required for Ollama".into()))?;
        Ok(Self {
            model,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| "http://localhost:11434".to_string()),
            sampling: Sampling::from(config),
            client: http::client(config.timeout_secs).map_err(RagError::Config)?,
        })
    }
}

#[async_trait]
impl Generator for OllamaGenerate {
    fn name(&self) -> &str {
        "ollama"
    }
    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &Prompt) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt.flatten(),
            "stream": false,
            "options": {
                "temperature": self.sampling.temperature,
                "num_predict": self.sampling.max_tokens,
            },
        });
        let endpoint = format!("{}/api/generate", self.url.trim_end_matches('/'));

        let json = http::post_json_with_retry(
            || self.client.post(&endpoint).json(&body),
            self.sampling.max_retries,
            "Ollama",
        )
        .await
        .map_err(|e| RagError::Generation(format!("{} (is Ollama running at {}?)", e, self.url)))?;

        json.get("response")
            .and_then(|r| r.as_str())
            .map(|text| text.trim().to_string())
            .ok_or_else(|| RagError::Generation("No response text from Ollama".into()))
    }
}

// ============ Gemini generateContent ============

/// Single-prompt backend for the Gemini API.
///
/// The API key is read from `GEMINI_API_KEY` at construction.
pub struct GeminiGenerate {
    model: String,
    url: String,
    api_key: String,
    sampling: Sampling,
    client: reqwest::Client,
}

impl GeminiGenerate {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| RagError::Config("GEMINI_API_KEY environment variable not set".into()))?;
        Ok(Self {
            model: config
                .model
                .clone()
                .unwrap_or_else(|| "gemini-2.0-flash".to_string()),
            url: config
                .url
                .clone()
                .unwrap_or_else(|| "https://generativelanguage.googleapis.com".to_string()),
            api_key,
            sampling: Sampling::from(config),
            client: http::client(config.timeout_secs).map_err(RagError::Config)?,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.url.trim_end_matches('/'),
            self.model
        )
    }
}

#[async_trait]
impl Generator for GeminiGenerate {
    fn name(&self) -> &str {
        "gemini"
    }
    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &Prompt) -> Result<String> {
        let body = serde_json::json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": prompt.flatten() }],
            }],
            "generationConfig": {
                "temperature": self.sampling.temperature,
                "maxOutputTokens": self.sampling.max_tokens,
            },
        });
        let endpoint = self.endpoint();

        let json = http::post_json_with_retry(
            || {
                self.client
                    .post(&endpoint)
                    .header("x-goog-api-key", &self.api_key)
                    .json(&body)
            },
            self.sampling.max_retries,
            "Gemini",
        )
        .await
        .map_err(RagError::Generation)?;

        parse_gemini_response(&json)
    }
}

fn parse_gemini_response(json: &serde_json::Value) -> Result<String> {
    let parts = json
        .pointer("/candidates/0/content/parts")
        .and_then(|p| p.as_array())
        .ok_or_else(|| RagError::Generation("No candidates in Gemini response".into()))?;

    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect();

    if text.trim().is_empty() {
        return Err(RagError::Generation("No text in Gemini response".into()));
    }
    Ok(text.trim().to_string())
}

/// Create the configured [`Generator`].
pub fn create_generator(config: &GenerationConfig) -> Result<Box<dyn Generator>> {
    match config.provider.as_str() {
        "openai" => Ok(Box::new(OpenAIChat::new(config)?)),
        "ollama" => Ok(Box::new(OllamaGenerate::new(config)?)),
        "gemini" => Ok(Box::new(GeminiGenerate::new(config)?)),
        other => Err(RagError::Config(format!(
            "Unknown generation provider: {}",
            other
        ))),
    }
}
