//! HTTP transport for OpenAI-compatible vision endpoints.

pub mod client;
pub mod types;

pub use client::HttpVisionClient;
