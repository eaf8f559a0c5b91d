//! Provider client implementations.
//!
//! Every client implements
//! [`ClientWrapper`](crate::orgllm::client_wrapper::ClientWrapper) and shares
//! the pooled HTTP transport in [`common`].

pub mod common;
pub mod openai;
