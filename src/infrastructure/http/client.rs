//! Reqwest-based adapter for OpenAI-compatible vision endpoints.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client as ReqwestClient, RequestBuilder, Response, StatusCode};
use tracing::{debug, warn};

use super::types::{ChatCompletionRequest, ChatCompletionResponse, ModelList};
use crate::domain::errors::TransportError;
use crate::domain::models::{OptimizedImage, ProviderConfig};
use crate::domain::ports::VisionClient;

/// Production `VisionClient` backed by a pooled reqwest client.
///
/// Timeouts are applied per request from the provider config rather than on
/// the shared client, since each provider carries its own budget. Dropping
/// the future aborts the in-flight request, so pipeline cancellation
/// propagates to the transport.
pub struct HttpVisionClient {
    http_client: ReqwestClient,
}

impl HttpVisionClient {
    /// Build the client with connection pooling enabled.
    pub fn new() -> Result<Self> {
        let http_client = ReqwestClient::builder()
            .pool_max_idle_per_host(4)
            .tcp_nodelay(true)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self { http_client })
    }

    fn apply_provider_headers(
        &self,
        mut builder: RequestBuilder,
        provider: &ProviderConfig,
    ) -> RequestBuilder {
        if let Some(ref api_key) = provider.api_key {
            builder = builder.bearer_auth(api_key);
        }
        for (name, value) in &provider.extra_headers {
            builder = builder.header(name, value);
        }
        builder.timeout(Duration::from_millis(provider.timeout_ms))
    }

    /// Classify a reqwest-level failure (no HTTP status available).
    fn classify_send_error(err: &reqwest::Error, timeout_ms: u64) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout(timeout_ms)
        } else if err.is_connect() {
            TransportError::ConnectionRefused(err.to_string())
        } else {
            TransportError::Unexpected {
                status: 0,
                body: err.to_string(),
            }
        }
    }

    /// Classify a non-success HTTP status into the transport taxonomy.
    async fn classify_status_error(response: Response) -> TransportError {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "unable to read error body".to_string());

        warn!(status = status.as_u16(), "provider returned error status");

        match status {
            StatusCode::TOO_MANY_REQUESTS => TransportError::RateLimited,
            StatusCode::PAYLOAD_TOO_LARGE => TransportError::PayloadTooLarge,
            StatusCode::UNPROCESSABLE_ENTITY => TransportError::Unprocessable(body),
            status if status.is_server_error() => TransportError::ServerError {
                status: status.as_u16(),
                body,
            },
            status => TransportError::Unexpected {
                status: status.as_u16(),
                body,
            },
        }
    }
}

#[async_trait]
impl VisionClient for HttpVisionClient {
    async fn complete(
        &self,
        provider: &ProviderConfig,
        image: &OptimizedImage,
        prompt: &str,
        system_prompt: Option<&str>,
    ) -> Result<String, TransportError> {
        let url = format!("{}/chat/completions", provider.endpoint_url);
        let body = ChatCompletionRequest::for_verification(provider, image, prompt, system_prompt);

        debug!(
            provider = %provider.id,
            model = %provider.model,
            payload_bytes = image.data.len(),
            "POST {url}"
        );

        let builder = self.http_client.post(&url).json(&body);
        let response = self
            .apply_provider_headers(builder, provider)
            .send()
            .await
            .map_err(|e| Self::classify_send_error(&e, provider.timeout_ms))?;

        if !response.status().is_success() {
            return Err(Self::classify_status_error(response).await);
        }

        let completion: ChatCompletionResponse = response.json().await.map_err(|e| {
            TransportError::Unexpected {
                status: 200,
                body: format!("malformed completion body: {e}"),
            }
        })?;

        completion
            .into_reply_text()
            .ok_or_else(|| TransportError::Unexpected {
                status: 200,
                body: "completion contained no message content".to_string(),
            })
    }

    async fn model_exists(&self, provider: &ProviderConfig) -> Result<bool, TransportError> {
        let url = format!("{}/models", provider.endpoint_url);
        debug!(provider = %provider.id, "GET {url}");

        let builder = self.http_client.get(&url);
        let response = self
            .apply_provider_headers(builder, provider)
            .send()
            .await
            .map_err(|e| Self::classify_send_error(&e, provider.timeout_ms))?;

        if !response.status().is_success() {
            return Err(Self::classify_status_error(response).await);
        }

        let listing: ModelList =
            response
                .json()
                .await
                .map_err(|e| TransportError::Unexpected {
                    status: 200,
                    body: format!("malformed model listing: {e}"),
                })?;

        Ok(listing.data.iter().any(|m| m.id == provider.model))
    }
}
