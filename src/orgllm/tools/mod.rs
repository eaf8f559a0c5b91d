//! Built-in tools agents can act through.
//!
//! Each submodule implements
//! [`ToolProtocol`](crate::orgllm::tool_protocol::ToolProtocol) for one
//! concern: workspace files, web fetching, and the per-agent memory store.

pub mod filesystem;
pub mod http;
pub mod memory;

pub use filesystem::{FileToolProtocol, WorkspaceFiles};
pub use http::WebToolProtocol;
pub use memory::{JsonFileMemory, MemoryStore, MemoryToolProtocol};
