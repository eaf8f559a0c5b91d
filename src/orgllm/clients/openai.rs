//! OpenAI-compatible client wrapper.
//!
//! `OpenAIClient` speaks the `/chat/completions` wire format directly over the
//! shared HTTP transport, which also makes it the delegate for any provider
//! exposing an OpenAI-compatible surface — point
//! [`new_with_base_url`](OpenAIClient::new_with_base_url) at a different host
//! and keep the same [`ClientWrapper`] interface.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use orgllm::orgllm::client_wrapper::{ClientWrapper, Message, Role};
//! use orgllm::orgllm::clients::openai::OpenAIClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let key = std::env::var("OPENAI_API_KEY")?;
//!     let client = OpenAIClient::new_with_model_string(&key, "gpt-4o-mini");
//!     let reply = client
//!         .send_message(&[Message::new(Role::User, "Say hi.")])
//!         .await?;
//!     println!("{}", reply.content);
//!     Ok(())
//! }
//! ```

use crate::orgllm::client_wrapper::{ClientWrapper, Message, Role, TokenUsage};
use crate::orgllm::clients::common::get_shared_http_client;
use async_trait::async_trait;
use serde_json::json;
use std::error::Error;
use std::sync::Arc;
use tokio::sync::Mutex;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Client wrapper for OpenAI-compatible chat endpoints.
pub struct OpenAIClient {
    /// Secret used as the bearer token.
    api_key: String,
    /// Model identifier sent with every request.
    model: String,
    /// Base URL without the `/chat/completions` suffix.
    base_url: String,
    /// Completion token ceiling, `None` leaves the provider default.
    max_tokens: Option<usize>,
    /// Storage for the most recent token usage report.
    token_usage: Mutex<Option<TokenUsage>>,
}

impl OpenAIClient {
    /// Create a client from an API key and explicit model string.
    pub fn new_with_model_string(secret_key: &str, model_name: &str) -> Self {
        Self::new_with_base_url(secret_key, model_name, DEFAULT_BASE_URL)
    }

    /// Create a client pointing at a custom OpenAI-compatible base URL.
    pub fn new_with_base_url(secret_key: &str, model_name: &str, base_url: &str) -> Self {
        OpenAIClient {
            api_key: secret_key.to_string(),
            model: model_name.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            max_tokens: None,
            token_usage: Mutex::new(None),
        }
    }

    /// Cap the number of completion tokens requested per call (builder pattern).
    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    fn build_payload(&self, messages: &[Message]) -> serde_json::Value {
        let wire_messages: Vec<serde_json::Value> = messages
            .iter()
            .map(|m| json!({"role": m.role.as_str(), "content": &*m.content}))
            .collect();
        let mut payload = json!({
            "model": self.model,
            "messages": wire_messages,
        });
        if let Some(max_tokens) = self.max_tokens {
            payload["max_tokens"] = json!(max_tokens);
        }
        payload
    }
}

#[async_trait]
impl ClientWrapper for OpenAIClient {
    async fn send_message(
        &self,
        messages: &[Message],
    ) -> Result<Message, Box<dyn Error + Send + Sync>> {
        let url = format!("{}/chat/completions", self.base_url);
        let response = get_shared_http_client()
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.build_payload(messages))
            .send()
            .await?;

        let status = response.status();
        let body: serde_json::Value = response.json().await?;

        if !status.is_success() {
            let detail = body["error"]["message"]
                .as_str()
                .unwrap_or("unknown provider error");
            if log::log_enabled!(log::Level::Error) {
                log::error!(
                    "OpenAIClient::send_message(...): API error {}: {}",
                    status,
                    detail
                );
            }
            return Err(format!("chat completion failed ({}): {}", status, detail).into());
        }

        let content = body["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string();

        if let Some(usage) = body.get("usage") {
            let input_tokens = usage["prompt_tokens"].as_u64().unwrap_or(0) as usize;
            let output_tokens = usage["completion_tokens"].as_u64().unwrap_or(0) as usize;
            let total_tokens = usage["total_tokens"]
                .as_u64()
                .unwrap_or((input_tokens + output_tokens) as u64) as usize;
            *self.token_usage.lock().await = Some(TokenUsage {
                input_tokens,
                output_tokens,
                total_tokens,
            });
        }

        if log::log_enabled!(log::Level::Debug) {
            log::debug!(
                "OpenAIClient::send_message(...): {} chars from {}",
                content.len(),
                self.model
            );
        }

        Ok(Message {
            role: Role::Assistant,
            content: Arc::from(content.as_str()),
        })
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn usage_slot(&self) -> Option<&Mutex<Option<TokenUsage>>> {
        Some(&self.token_usage)
    }
}
