// src/lib.rs

// Import the top-level `orgllm` module.
pub mod orgllm;

// Re-exporting key items for easier external access.
pub use orgllm::client_wrapper::{ClientWrapper, Message, Role, TokenUsage};
pub use orgllm::config::OrgConfig;
pub use orgllm::organization::Organization;
