//! Port trait for vision-capable model endpoints.
//!
//! This is the seam between the provider router and the HTTP transport.
//! The production adapter is
//! [`crate::infrastructure::http::HttpVisionClient`]; tests inject scripted
//! fakes so routing, breaking, and retry logic run without a network.

use async_trait::async_trait;

use crate::domain::errors::TransportError;
use crate::domain::models::{OptimizedImage, ProviderConfig};

/// One-shot client for a vision-capable chat-completion endpoint.
///
/// Implementations perform exactly one HTTP round trip per `complete` call:
/// no internal retries and no circuit breaker mutation. Both of those are
/// the router's responsibility, which keeps failure policy in one place.
#[async_trait]
pub trait VisionClient: Send + Sync {
    /// Send one chat-completion request carrying the prompt and image, and
    /// return the raw text of the model's reply.
    async fn complete(
        &self,
        provider: &ProviderConfig,
        image: &OptimizedImage,
        prompt: &str,
        system_prompt: Option<&str>,
    ) -> Result<String, TransportError>;

    /// Lightweight existence probe: does the provider still serve the
    /// configured model? Used only for the emergency tier, where calling a
    /// decommissioned paid model would burn the last fallback for nothing.
    async fn model_exists(&self, provider: &ProviderConfig) -> Result<bool, TransportError>;
}
