//! Tool Protocol Abstraction Layer
//!
//! Agents act on the world through tools. This module defines the contract a
//! tool source implements ([`ToolProtocol`]) and the [`ToolRegistry`] that
//! aggregates several sources behind one name-routed execution surface. The
//! catalog is registered when the organization is constructed; the core is
//! agnostic to what the tools actually do — every tool takes JSON parameters
//! and returns a [`ToolResult`] whose rendering becomes the agent's `system`
//! history entry.
//!
//! ```text
//! Agent → CommandBridge → ToolRegistry → [files, web, memory]
//!                          (routing map)     ↓      ↓      ↓
//!                                        workspace GET  agent_memory.json
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// Represents the result of a tool execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether the tool execution was successful
    pub success: bool,
    /// The output data from the tool
    pub output: serde_json::Value,
    /// Optional error message if execution failed
    pub error: Option<String>,
}

impl ToolResult {
    /// Convenience constructor for successful tool execution.
    pub fn success(output: serde_json::Value) -> Self {
        Self {
            success: true,
            output,
            error: None,
        }
    }

    /// Convenience constructor for failed tool execution.
    pub fn failure(error: String) -> Self {
        Self {
            success: false,
            output: serde_json::Value::Null,
            error: Some(error),
        }
    }

    /// Render the result the way it is fed back to the model.
    pub fn render(&self, tool_name: &str) -> String {
        if self.success {
            let body = match &self.output {
                serde_json::Value::String(s) => s.clone(),
                other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
            };
            format!("Command {} returned: {}", tool_name, body)
        } else {
            format!(
                "Command {} failed: {}",
                tool_name,
                self.error.as_deref().unwrap_or("Unknown error")
            )
        }
    }
}

/// Defines the type of a tool parameter
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ToolParameterType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
}

/// Defines a parameter for a tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ToolParameterType,
    pub description: Option<String>,
    pub required: bool,
}

impl ToolParameter {
    /// Define a new tool parameter with the provided name and type.
    pub fn new(name: impl Into<String>, param_type: ToolParameterType) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: None,
            required: false,
        }
    }

    /// Add a human readable description that will surface in generated prompts.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Mark the argument as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// Metadata about a tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolMetadata {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ToolParameter>,
}

impl ToolMetadata {
    /// Create metadata with the supplied identifier and description.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
        }
    }

    /// Append a parameter definition to the tool metadata.
    pub fn with_parameter(mut self, param: ToolParameter) -> Self {
        self.parameters.push(param);
        self
    }
}

/// Trait for implementing tool execution protocols
#[async_trait]
pub trait ToolProtocol: Send + Sync {
    /// Execute a tool with the given parameters
    async fn execute(
        &self,
        tool_name: &str,
        parameters: serde_json::Value,
    ) -> Result<ToolResult, Box<dyn Error + Send + Sync>>;

    /// Get metadata about available tools
    async fn list_tools(&self) -> Result<Vec<ToolMetadata>, Box<dyn Error + Send + Sync>>;

    /// Protocol identifier (e.g., "files", "web", "memory")
    fn protocol_name(&self) -> &str;
}

/// Error types for tool operations
#[derive(Debug, Clone)]
pub enum ToolError {
    /// Requested tool is not registered in the current registry.
    NotFound(String),
    /// Tool execution completed with an application level failure.
    ExecutionFailed(String),
    /// The provided JSON parameters failed validation or deserialization.
    InvalidParameters(String),
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolError::NotFound(name) => write!(f, "Tool not found: {}", name),
            ToolError::ExecutionFailed(msg) => write!(f, "Tool execution failed: {}", msg),
            ToolError::InvalidParameters(msg) => write!(f, "Invalid parameters: {}", msg),
        }
    }
}

impl Error for ToolError {}

/// Aggregates tool protocols and routes execution by tool name.
///
/// Names are discovered when a protocol is added; later registrations shadow
/// earlier ones tool-by-tool, which keeps hot-swapping a protocol cheap.
#[derive(Default)]
pub struct ToolRegistry {
    protocols: HashMap<String, Arc<dyn ToolProtocol>>,
    /// tool name → protocol name
    routing: HashMap<String, String>,
    tools: Vec<ToolMetadata>,
}

impl ToolRegistry {
    /// Create a registry with no protocols.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Register a protocol under `name`, discovering its tools.
    pub async fn add_protocol(
        &mut self,
        name: &str,
        protocol: Arc<dyn ToolProtocol>,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        let discovered = protocol.list_tools().await?;
        for tool in &discovered {
            self.routing.insert(tool.name.clone(), name.to_string());
        }
        self.tools.retain(|t| !discovered.iter().any(|d| d.name == t.name));
        self.tools.extend(discovered);
        self.protocols.insert(name.to_string(), protocol);
        Ok(())
    }

    /// List all tool metadata across registered protocols.
    pub fn list_tools(&self) -> &[ToolMetadata] {
        &self.tools
    }

    /// True if a tool with this name is routable.
    pub fn has_tool(&self, tool_name: &str) -> bool {
        self.routing.contains_key(tool_name)
    }

    /// Execute a tool by name, routing to the protocol that registered it.
    pub async fn execute_tool(
        &self,
        tool_name: &str,
        parameters: serde_json::Value,
    ) -> Result<ToolResult, Box<dyn Error + Send + Sync>> {
        let protocol_name = self
            .routing
            .get(tool_name)
            .ok_or_else(|| ToolError::NotFound(tool_name.to_string()))?;
        let protocol = self
            .protocols
            .get(protocol_name)
            .ok_or_else(|| ToolError::NotFound(tool_name.to_string()))?;
        protocol.execute(tool_name, parameters).await
    }
}
