//! Page-content summarization via an OpenAI-compatible LLM endpoint.
//!
//! The browser session manager takes an optional [`TextSummarizer`]; when
//! present, fetched page content is condensed into markdown before being
//! handed to callers. The manager never depends on it for correctness.

use crate::config::LlmConfig;
use crate::error::LlmError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::debug;

const SUMMARIZE_SYSTEM_PROMPT: &str = "You are given the raw content of a web page. \
Rewrite it as concise, well-structured markdown. Preserve headings, links, and any \
data the reader would need; drop navigation chrome, ads, and boilerplate.";

/// Turns raw page content into a markdown digest.
#[async_trait]
pub trait TextSummarizer: Send + Sync {
    async fn summarize(&self, content: &str) -> Result<String, LlmError>;
}

/// [`TextSummarizer`] backed by an OpenAI-compatible chat completions endpoint.
pub struct ChatSummarizer {
    client: Client,
    config: LlmConfig,
}

impl ChatSummarizer {
    pub fn new(config: LlmConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }
}

#[async_trait]
impl TextSummarizer for ChatSummarizer {
    async fn summarize(&self, content: &str) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.config.base_url);

        let body = json!({
            "model": self.config.model_name,
            "messages": [
                { "role": "system", "content": SUMMARIZE_SYSTEM_PROMPT },
                { "role": "user", "content": content },
            ],
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
            "stream": false,
        });

        debug!(url = %url, model = %self.config.model_name, "Sending summarize request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::ApiRequest {
                message: format!("Request failed: {}", e),
            })?;

        let status = response.status();
        let response_body = response.text().await.map_err(|e| LlmError::ApiRequest {
            message: format!("Failed to read response body: {}", e),
        })?;

        if !status.is_success() {
            return Err(LlmError::ApiRequest {
                message: format!("HTTP {}: {}", status, response_body),
            });
        }

        let parsed: Value =
            serde_json::from_str(&response_body).map_err(|e| LlmError::ResponseParse {
                message: format!("Invalid JSON: {}", e),
            })?;

        parsed["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or(LlmError::EmptyCompletion)
    }
}

/// A scripted summarizer for tests: records inputs, returns a fixed reply.
pub struct MockSummarizer {
    pub calls: std::sync::Mutex<Vec<String>>,
    pub reply: String,
}

impl MockSummarizer {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            calls: std::sync::Mutex::new(Vec::new()),
            reply: reply.into(),
        }
    }
}

#[async_trait]
impl TextSummarizer for MockSummarizer {
    async fn summarize(&self, content: &str) -> Result<String, LlmError> {
        self.calls.lock().unwrap().push(content.to_string());
        Ok(self.reply.clone())
    }
}
