//! Language-model providers implementing [`LanguageModel`].
//!
//! | Config value | Provider | Endpoint |
//! |-------------|----------|----------|
//! | `"disabled"` | [`DisabledModel`] | none, every call fails |
//! | `"openai"` | [`OpenAIChat`] | `POST {url}/chat/completions` |
//! | `"ollama"` | [`OllamaModel`] | `POST {url}/api/generate` |
//! | `"gemini"` | [`GeminiModel`] | `POST {url}/models/{model}:generateContent` |
//!
//! Each call is bounded by `[llm].timeout_secs`. Generation is not
//! retried unless `[llm].max_retries` is set.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use paperqa_core::chain::LanguageModel;

use crate::config::LlmConfig;
use crate::http::{self, RetryPolicy};

const OPENAI_URL: &str = "https://api.openai.com/v1";
const OLLAMA_URL: &str = "http://localhost:11434";
const GEMINI_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

fn required_model(config: &LlmConfig, provider: &str) -> Result<String> {
    config
        .model
        .clone()
        .ok_or_else(|| anyhow!("llm.model required for {} provider", provider))
}

/// Used when `llm.provider = "disabled"`. Every call fails.
pub struct DisabledModel;

#[async_trait]
impl LanguageModel for DisabledModel {
    fn model_name(&self) -> &str {
        "disabled"
    }
    async fn generate(&self, _prompt: &str) -> Result<String> {
        bail!("Language model is disabled; set [llm].provider in the config file")
    }
}

// ============ OpenAI ============

pub struct OpenAIChat {
    model: String,
    url: String,
    api_key: String,
    temperature: f32,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl OpenAIChat {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow!("OPENAI_API_KEY environment variable not set"))?;
        Ok(Self {
            model: required_model(config, "OpenAI")?,
            url: config.url.clone().unwrap_or_else(|| OPENAI_URL.to_string()),
            api_key,
            temperature: config.temperature,
            client: http::client(config.timeout_secs)?,
            retry: RetryPolicy::new(config.max_retries),
        })
    }
}

#[async_trait]
impl LanguageModel for OpenAIChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": self.temperature,
        });
        let endpoint = format!("{}/chat/completions", self.url.trim_end_matches('/'));
        let json = http::send_json("OpenAI", self.retry, || {
            self.client
                .post(&endpoint)
                .bearer_auth(&self.api_key)
                .json(&body)
        })
        .await?;
        parse_openai_chat(&json)
    }
}

fn parse_openai_chat(json: &serde_json::Value) -> Result<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing choices[0].message.content"))
}

// ============ Ollama ============

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

/// A local Ollama instance, non-streaming `/api/generate`.
pub struct OllamaModel {
    model: String,
    url: String,
    temperature: f32,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl OllamaModel {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            model: required_model(config, "Ollama")?,
            url: config.url.clone().unwrap_or_else(|| OLLAMA_URL.to_string()),
            temperature: config.temperature,
            client: http::client(config.timeout_secs)?,
            retry: RetryPolicy::new(config.max_retries),
        })
    }
}

#[async_trait]
impl LanguageModel for OllamaModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let request = OllamaRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: OllamaOptions {
                temperature: self.temperature,
            },
        };
        let endpoint = format!("{}/api/generate", self.url.trim_end_matches('/'));
        let json = http::send_json("Ollama", self.retry, || {
            self.client.post(&endpoint).json(&request)
        })
        .await
        .map_err(|e| anyhow!("{} (is Ollama running at {}?)", e, self.url))?;
        let parsed: OllamaResponse = serde_json::from_value(json)
            .map_err(|e| anyhow!("Invalid Ollama response: {}", e))?;
        Ok(parsed.response)
    }
}

// ============ Gemini ============

/// Google Gemini (`gemini-1.5-flash`). Requires `GEMINI_API_KEY`.
pub struct GeminiModel {
    model: String,
    url: String,
    api_key: String,
    temperature: f32,
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl GeminiModel {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| anyhow!("GEMINI_API_KEY environment variable not set"))?;
        Ok(Self {
            model: required_model(config, "Gemini")?,
            url: config.url.clone().unwrap_or_else(|| GEMINI_URL.to_string()),
            api_key,
            temperature: config.temperature,
            client: http::client(config.timeout_secs)?,
            retry: RetryPolicy::new(config.max_retries),
        })
    }
}

#[async_trait]
impl LanguageModel for GeminiModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": { "temperature": self.temperature },
        });
        let endpoint = format!(
            "{}/models/{}:generateContent",
            self.url.trim_end_matches('/'),
            self.model.trim_start_matches("models/")
        );
        let json = http::send_json("Gemini", self.retry, || {
            self.client
                .post(&endpoint)
                .header("x-goog-api-key", &self.api_key)
                .json(&body)
        })
        .await?;
        parse_gemini_candidates(&json)
    }
}

/// Concatenate the text parts of the first candidate.
fn parse_gemini_candidates(json: &serde_json::Value) -> Result<String> {
    let parts = json
        .pointer("/candidates/0/content/parts")
        .and_then(|p| p.as_array())
        .ok_or_else(|| {
            let reason = json
                .pointer("/promptFeedback/blockReason")
                .and_then(|r| r.as_str())
                .unwrap_or("no candidates");
            anyhow!("Invalid Gemini response: {}", reason)
        })?;
    Ok(parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect::<Vec<_>>()
        .join(""))
}

/// Create the configured language model.
pub fn create_language_model(config: &LlmConfig) -> Result<Box<dyn LanguageModel>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledModel)),
        "openai" => Ok(Box::new(OpenAIChat::new(config)?)),
        "ollama" => Ok(Box::new(OllamaModel::new(config)?)),
        "gemini" => Ok(Box::new(GeminiModel::new(config)?)),
        other => bail!("Unknown llm provider: {}", other),
    }
}
