use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::json;
use std::time::Duration;

use crate::config::{ProviderConfig, ProviderKind};
use crate::error::ProviderError;

/// Text-in, text-out language model.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    async fn generate(&self, model: &str, prompt: String, system: Option<String>) -> Result<String>;
}

pub struct OllamaProvider {
    client: ollama_rs::Ollama,
}

impl OllamaProvider {
    pub fn new(client: ollama_rs::Ollama) -> Self {
        Self { client }
    }

    /// Client for `http(s)://host:port`; falls back to the default local
    /// endpoint when the URL has no host.
    pub fn from_url(url: &str) -> Result<Self> {
        let parsed = reqwest::Url::parse(url).with_context(|| format!("Invalid Ollama URL '{}'", url))?;
        let client = match parsed.host_str() {
            Some(host) => ollama_rs::Ollama::new(
                format!("{}://{}", parsed.scheme(), host),
                parsed.port_or_known_default().unwrap_or(11434),
            ),
            None => ollama_rs::Ollama::default(),
        };
        Ok(Self::new(client))
    }
}

#[async_trait]
impl LLMProvider for OllamaProvider {
    async fn generate(&self, model: &str, prompt: String, system: Option<String>) -> Result<String> {
        use ollama_rs::generation::chat::{request::ChatMessageRequest, ChatMessage};

        let mut messages = Vec::new();
        if let Some(sys) = system {
            messages.push(ChatMessage::system(sys));
        }
        messages.push(ChatMessage::user(prompt));

        let res = self
            .client
            .send_chat_messages(ChatMessageRequest::new(model.to_string(), messages))
            .await
            .map_err(|e| classify_message(e.to_string()))?;

        Ok(res.message.content)
    }
}

pub struct OpenAICompatibleProvider {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    temperature: f32,
}

impl OpenAICompatibleProvider {
    pub fn new(base_url: String, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url,
            api_key,
            temperature: 0.0,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Result<Self> {
        self.client = Client::builder()
            .timeout(Duration::from_secs(secs))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(self)
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

#[async_trait]
impl LLMProvider for OpenAICompatibleProvider {
    async fn generate(&self, model: &str, prompt: String, system: Option<String>) -> Result<String> {
        let mut messages = Vec::new();
        if let Some(sys) = system {
            messages.push(json!({ "role": "system", "content": sys }));
        }
        messages.push(json!({ "role": "user", "content": prompt }));

        let body = json!({
            "model": model,
            "messages": messages,
            "temperature": self.temperature,
        });

        let mut request = self
            .client
            .post(format!("{}/chat/completions", self.base_url.trim_end_matches('/')))
            .json(&body);

        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let res = request.send().await.map_err(classify_reqwest)?;
        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(classify_status(status, text).into());
        }

        let json: serde_json::Value = res.json().await.map_err(classify_reqwest)?;
        let content = json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| ProviderError::Permanent("no content in chat completion response".to_string()))?;

        Ok(content.to_string())
    }
}

/// Provider selected by the configuration.
pub fn from_config(config: &ProviderConfig) -> Result<Box<dyn LLMProvider>> {
    Ok(match config.kind {
        ProviderKind::Ollama => Box::new(OllamaProvider::from_url(&config.url)?),
        ProviderKind::OpenaiCompatible => Box::new(
            OpenAICompatibleProvider::new(config.url.clone(), config.api_key.clone())
                .with_timeout(config.timeout_secs)?,
        ),
    })
}

/// Recover the typed error from a provider failure; anything unclassified is
/// permanent.
pub fn into_provider_error(err: anyhow::Error) -> ProviderError {
    err.downcast::<ProviderError>()
        .unwrap_or_else(|e| ProviderError::Permanent(format!("{:#}", e)))
}

fn classify_status(status: StatusCode, body: String) -> ProviderError {
    let message = format!("HTTP {}: {}", status, body.chars().take(300).collect::<String>());
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        ProviderError::Transient(message)
    } else {
        ProviderError::Permanent(message)
    }
}

fn classify_reqwest(e: reqwest::Error) -> anyhow::Error {
    let transient = e.is_timeout()
        || e.is_connect()
        || e.is_request()
        || e.status().map_or(false, |s| s == StatusCode::TOO_MANY_REQUESTS || s.is_server_error());
    if transient {
        ProviderError::Transient(e.to_string()).into()
    } else {
        ProviderError::Permanent(e.to_string()).into()
    }
}

/// Errors that only come as text are classified by their wording.
fn classify_message(message: String) -> anyhow::Error {
    let lower = message.to_lowercase();
    let transient = ["connect", "timed out", "timeout", "reset", "unavailable", "429", "502", "503", "504"]
        .iter()
        .any(|needle| lower.contains(needle));
    if transient {
        ProviderError::Transient(message).into()
    } else {
        ProviderError::Permanent(message).into()
    }
}
