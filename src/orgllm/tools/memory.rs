//! Per-agent long term memory.
//!
//! The core treats memory as an opaque adapter behind the [`MemoryStore`]
//! trait: `add` a text, `get_relevant` texts back. The built-in
//! [`JsonFileMemory`] keeps everything in one `agent_memory.json` file inside
//! the agent's workspace and scores relevance by word overlap — enough for
//! recall prompts without an embedding backend, and trivially swappable for
//! one.

use crate::orgllm::tool_protocol::{
    ToolMetadata, ToolParameter, ToolParameterType, ToolProtocol, ToolResult,
};
use async_trait::async_trait;
use std::collections::HashSet;
use std::error::Error;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Contract the core consumes memory through.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Remember a text.
    async fn add(&self, text: &str) -> io::Result<()>;

    /// Return up to `k` remembered texts most relevant to `text`.
    async fn get_relevant(&self, text: &str, k: usize) -> io::Result<Vec<String>>;
}

/// JSON-file backed memory store (`agent_memory.json`).
pub struct JsonFileMemory {
    path: PathBuf,
    entries: Mutex<Vec<String>>,
}

impl JsonFileMemory {
    /// Open (or create) a memory file.
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            serde_json::from_str(&raw).unwrap_or_default()
        } else {
            Vec::new()
        };
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    fn persist(&self, entries: &[String]) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(entries)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        fs::write(&self.path, json)
    }
}

fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

#[async_trait]
impl MemoryStore for JsonFileMemory {
    async fn add(&self, text: &str) -> io::Result<()> {
        let mut entries = self.entries.lock().await;
        entries.push(text.to_string());
        self.persist(&entries)
    }

    async fn get_relevant(&self, text: &str, k: usize) -> io::Result<Vec<String>> {
        let query = tokenize(text);
        let entries = self.entries.lock().await;

        let mut scored: Vec<(usize, &String)> = entries
            .iter()
            .map(|entry| {
                let words = tokenize(entry);
                (query.intersection(&words).count(), entry)
            })
            .filter(|(score, _)| *score > 0)
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        Ok(scored.into_iter().take(k).map(|(_, e)| e.clone()).collect())
    }
}

/// [`ToolProtocol`] adapter exposing the memory store as tools.
pub struct MemoryToolProtocol {
    store: Arc<dyn MemoryStore>,
}

impl MemoryToolProtocol {
    pub fn new(store: Arc<dyn MemoryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ToolProtocol for MemoryToolProtocol {
    async fn execute(
        &self,
        tool_name: &str,
        parameters: serde_json::Value,
    ) -> Result<ToolResult, Box<dyn Error + Send + Sync>> {
        let text = match parameters.get("text").and_then(serde_json::Value::as_str) {
            Some(t) => t.to_string(),
            None => return Ok(ToolResult::failure("missing required parameter 'text'".into())),
        };
        match tool_name {
            "memory_add" => match self.store.add(&text).await {
                Ok(()) => Ok(ToolResult::success(serde_json::json!("Memory saved."))),
                Err(e) => Ok(ToolResult::failure(e.to_string())),
            },
            "memory_query" => match self.store.get_relevant(&text, 5).await {
                Ok(hits) if hits.is_empty() => {
                    Ok(ToolResult::success(serde_json::json!("No relevant memories.")))
                }
                Ok(hits) => Ok(ToolResult::success(serde_json::json!(hits))),
                Err(e) => Ok(ToolResult::failure(e.to_string())),
            },
            other => Ok(ToolResult::failure(format!("unknown memory tool '{}'", other))),
        }
    }

    async fn list_tools(&self) -> Result<Vec<ToolMetadata>, Box<dyn Error + Send + Sync>> {
        let text_param = || {
            ToolParameter::new("text", ToolParameterType::String)
                .with_description("Text to store or query with")
                .required()
        };
        Ok(vec![
            ToolMetadata::new("memory_add", "Save a note to long term memory")
                .with_parameter(text_param()),
            ToolMetadata::new("memory_query", "Retrieve relevant notes from long term memory")
                .with_parameter(text_param()),
        ])
    }

    fn protocol_name(&self) -> &str {
        "memory"
    }
}
