//! Web fetch tool.
//!
//! A single `web_fetch` tool that GETs a URL over the shared HTTP transport
//! and returns the (truncated) body text. Download-to-disk is gated on the
//! organization's `allow_downloads` flag and deliberately not offered here.

use crate::orgllm::clients::common::get_shared_http_client;
use crate::orgllm::tool_protocol::{
    ToolMetadata, ToolParameter, ToolParameterType, ToolProtocol, ToolResult,
};
use async_trait::async_trait;
use std::error::Error;

/// Bodies longer than this are cut to keep prompts bounded.
const MAX_BODY_CHARS: usize = 8_000;

/// [`ToolProtocol`] exposing `web_fetch`.
pub struct WebToolProtocol {
    user_agent: String,
}

impl WebToolProtocol {
    pub fn new(browser_name: &str) -> Self {
        Self {
            user_agent: format!("Mozilla/5.0 (compatible; {})", browser_name),
        }
    }
}

#[async_trait]
impl ToolProtocol for WebToolProtocol {
    async fn execute(
        &self,
        tool_name: &str,
        parameters: serde_json::Value,
    ) -> Result<ToolResult, Box<dyn Error + Send + Sync>> {
        if tool_name != "web_fetch" {
            return Ok(ToolResult::failure(format!("unknown web tool '{}'", tool_name)));
        }
        let url = match parameters.get("url").and_then(serde_json::Value::as_str) {
            Some(u) => u.to_string(),
            None => return Ok(ToolResult::failure("missing required parameter 'url'".into())),
        };

        let response = get_shared_http_client()
            .get(&url)
            .header("User-Agent", &self.user_agent)
            .send()
            .await;

        match response {
            Ok(resp) => {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                let truncated: String = body.chars().take(MAX_BODY_CHARS).collect();
                if status.is_success() {
                    Ok(ToolResult::success(serde_json::json!(truncated)))
                } else {
                    Ok(ToolResult::failure(format!("GET {} returned {}", url, status)))
                }
            }
            Err(e) => Ok(ToolResult::failure(format!("GET {} failed: {}", url, e))),
        }
    }

    async fn list_tools(&self) -> Result<Vec<ToolMetadata>, Box<dyn Error + Send + Sync>> {
        Ok(vec![ToolMetadata::new(
            "web_fetch",
            "Fetch a web page and return its text",
        )
        .with_parameter(
            ToolParameter::new("url", ToolParameterType::String)
                .with_description("Absolute URL to fetch")
                .required(),
        )])
    }

    fn protocol_name(&self) -> &str {
        "web"
    }
}
