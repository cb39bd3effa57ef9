//! Provider routing with in-place retry and breaker-gated fallback.
//!
//! Providers are tried in ascending priority order. Transient failures
//! (timeouts, 5xx) get a bounded in-place retry with exponential backoff;
//! everything else falls straight through to the next provider. Emergency
//! providers cost money per call, so their model is probed via the listing
//! endpoint before the expensive completion is attempted.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use crate::domain::errors::TransportError;
use crate::domain::models::{OptimizedImage, ProviderConfig, ProviderTier, RetryConfig};
use crate::domain::ports::VisionClient;
use crate::services::circuit_breaker::BreakerRegistry;

/// Exponential backoff schedule for in-place retries.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts per provider, including the first.
    pub max_attempts: u32,
    base_delay_ms: u64,
    max_delay_ms: u64,
}

impl RetryPolicy {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: config.max_delay_ms,
        }
    }

    /// Delay before the retry following the given zero-based attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt);
        let delay = self
            .base_delay_ms
            .saturating_mul(factor)
            .min(self.max_delay_ms);
        Duration::from_millis(delay)
    }
}

/// Terminal outcome of one routing pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// A provider replied; the raw text still needs normalization.
    Replied {
        /// Unparsed reply body.
        raw_text: String,
        /// Id of the provider that answered.
        provider_id: String,
    },
    /// Every provider was skipped or failed.
    Exhausted,
}

/// Walks the provider chain until one replies or all are exhausted.
pub struct ProviderRouter {
    providers: Vec<ProviderConfig>,
    client: Arc<dyn VisionClient>,
    breakers: BreakerRegistry,
    retry: RetryPolicy,
}

impl ProviderRouter {
    /// Build a router. Providers are sorted by ascending priority; input
    /// order does not matter.
    pub fn new(
        mut providers: Vec<ProviderConfig>,
        client: Arc<dyn VisionClient>,
        breakers: BreakerRegistry,
        retry: RetryPolicy,
    ) -> Self {
        providers.sort_by_key(|p| p.priority);
        Self {
            providers,
            client,
            breakers,
            retry,
        }
    }

    /// Route one verification request through the provider chain.
    ///
    /// Exhaustion is an outcome, not an error: the normalizer turns it into
    /// a safe fallback result.
    #[instrument(skip_all)]
    pub async fn route(
        &self,
        image: &OptimizedImage,
        prompt: &str,
        system_prompt: Option<&str>,
    ) -> RouteOutcome {
        for provider in &self.providers {
            if !self.breakers.allow(&provider.id).await {
                continue;
            }

            if provider.tier == ProviderTier::Emergency
                && !self.emergency_model_available(provider).await
            {
                continue;
            }

            match self.call_with_retry(provider, image, prompt, system_prompt).await {
                Ok(raw_text) => {
                    self.breakers.record_success(&provider.id).await;
                    info!(provider = %provider.id, "provider replied");
                    return RouteOutcome::Replied {
                        raw_text,
                        provider_id: provider.id.clone(),
                    };
                }
                Err(e) => {
                    warn!(provider = %provider.id, error = %e, "provider failed, falling through");
                    self.breakers.record_failure(&provider.id).await;
                }
            }
        }

        warn!("all providers exhausted");
        RouteOutcome::Exhausted
    }

    /// Probe the emergency provider's model listing before paying for a
    /// completion. Any probe problem skips the provider.
    async fn emergency_model_available(&self, provider: &ProviderConfig) -> bool {
        match self.client.model_exists(provider).await {
            Ok(true) => true,
            Ok(false) => {
                warn!(
                    provider = %provider.id,
                    model = %provider.model,
                    "emergency model not available, skipping"
                );
                // Counts as a failure so a half-open probe slot consumed by
                // this check is released; otherwise the breaker would stay
                // wedged even after the model returns.
                self.breakers.record_failure(&provider.id).await;
                false
            }
            Err(e) => {
                warn!(provider = %provider.id, error = %e, "emergency model probe failed");
                self.breakers.record_failure(&provider.id).await;
                false
            }
        }
    }

    /// Call one provider, retrying in place on transient errors only.
    async fn call_with_retry(
        &self,
        provider: &ProviderConfig,
        image: &OptimizedImage,
        prompt: &str,
        system_prompt: Option<&str>,
    ) -> Result<String, TransportError> {
        let mut attempt = 0;
        loop {
            match self.client.complete(provider, image, prompt, system_prompt).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    let retries_left = attempt + 1 < self.retry.max_attempts;
                    if e.is_retriable() && retries_left {
                        let delay = self.retry.delay_for(attempt);
                        debug!(
                            provider = %provider.id,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "transient failure, retrying in place"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    } else {
                        return Err(e);
                    }
                }
            }
        }
    }

    /// Breaker state inspection, mainly for diagnostics and tests.
    pub fn breakers(&self) -> &BreakerRegistry {
        &self.breakers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{BreakerConfig, RetryConfig};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Scripted fake: each provider id maps to a queue of canned outcomes.
    struct ScriptedClient {
        replies: Mutex<HashMap<String, Vec<Result<String, TransportError>>>>,
        models_available: AtomicBool,
        calls: AtomicU32,
    }

    impl ScriptedClient {
        fn new(script: Vec<(&str, Result<String, TransportError>)>) -> Self {
            let mut replies: HashMap<String, Vec<_>> = HashMap::new();
            // Scripts are listed in call order; store reversed for pop().
            for (id, outcome) in script.into_iter().rev() {
                replies.entry(id.to_string()).or_default().push(outcome);
            }
            Self {
                replies: Mutex::new(replies),
                models_available: AtomicBool::new(true),
                calls: AtomicU32::new(0),
            }
        }

        fn call_count(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl VisionClient for ScriptedClient {
        async fn complete(
            &self,
            provider: &ProviderConfig,
            _image: &OptimizedImage,
            _prompt: &str,
            _system_prompt: Option<&str>,
        ) -> Result<String, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.replies
                .lock()
                .unwrap()
                .get_mut(&provider.id)
                .and_then(Vec::pop)
                .unwrap_or(Err(TransportError::ConnectionRefused(
                    "no scripted reply".to_string(),
                )))
        }

        async fn model_exists(&self, _provider: &ProviderConfig) -> Result<bool, TransportError> {
            Ok(self.models_available.load(Ordering::SeqCst))
        }
    }

    fn image() -> OptimizedImage {
        OptimizedImage {
            data: vec![1, 2, 3],
            media_type: "image/jpeg".to_string(),
            degraded: false,
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy::new(&RetryConfig {
            max_attempts: 2,
            base_delay_ms: 1,
            max_delay_ms: 4,
        })
    }

    fn router_with(
        providers: Vec<ProviderConfig>,
        client: Arc<ScriptedClient>,
    ) -> ProviderRouter {
        let breakers = BreakerRegistry::new(&providers, &BreakerConfig::default());
        ProviderRouter::new(providers, client, breakers, fast_retry())
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::new(&RetryConfig {
            max_attempts: 5,
            base_delay_ms: 500,
            max_delay_ms: 8_000,
        });
        assert_eq!(policy.delay_for(0), Duration::from_millis(500));
        assert_eq!(policy.delay_for(1), Duration::from_millis(1_000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(2_000));
        assert_eq!(policy.delay_for(10), Duration::from_millis(8_000));
    }

    #[tokio::test]
    async fn test_first_provider_success() {
        let client = Arc::new(ScriptedClient::new(vec![(
            "a",
            Ok("{\"verified\":true}".to_string()),
        )]));
        let router = router_with(
            vec![
                ProviderConfig::new("a", "https://a/v1", "m", 1),
                ProviderConfig::new("b", "https://b/v1", "m", 2),
            ],
            Arc::clone(&client),
        );

        let outcome = router.route(&image(), "check", None).await;
        assert_eq!(
            outcome,
            RouteOutcome::Replied {
                raw_text: "{\"verified\":true}".to_string(),
                provider_id: "a".to_string(),
            }
        );
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn test_timeout_retries_in_place_then_falls_through() {
        let client = Arc::new(ScriptedClient::new(vec![
            ("a", Err(TransportError::Timeout(1_000))),
            ("a", Err(TransportError::Timeout(1_000))),
            ("b", Ok("from b".to_string())),
        ]));
        let router = router_with(
            vec![
                ProviderConfig::new("a", "https://a/v1", "m", 1),
                ProviderConfig::new("b", "https://b/v1", "m", 2),
            ],
            Arc::clone(&client),
        );

        let outcome = router.route(&image(), "check", None).await;
        assert_eq!(
            outcome,
            RouteOutcome::Replied {
                raw_text: "from b".to_string(),
                provider_id: "b".to_string(),
            }
        );
        // Two attempts against a (retry in place), one against b.
        assert_eq!(client.call_count(), 3);
    }

    #[tokio::test]
    async fn test_rate_limit_falls_through_without_retry() {
        let client = Arc::new(ScriptedClient::new(vec![
            ("a", Err(TransportError::RateLimited)),
            ("b", Ok("from b".to_string())),
        ]));
        let router = router_with(
            vec![
                ProviderConfig::new("a", "https://a/v1", "m", 1),
                ProviderConfig::new("b", "https://b/v1", "m", 2),
            ],
            Arc::clone(&client),
        );

        router.route(&image(), "check", None).await;
        // One attempt against a, no in-place retry, then b.
        assert_eq!(client.call_count(), 2);
    }

    #[tokio::test]
    async fn test_all_providers_failing_is_exhausted() {
        let client = Arc::new(ScriptedClient::new(vec![
            ("a", Err(TransportError::RateLimited)),
            ("b", Err(TransportError::ConnectionRefused("down".to_string()))),
        ]));
        let router = router_with(
            vec![
                ProviderConfig::new("a", "https://a/v1", "m", 1),
                ProviderConfig::new("b", "https://b/v1", "m", 2),
            ],
            client,
        );

        assert_eq!(router.route(&image(), "check", None).await, RouteOutcome::Exhausted);
    }

    #[tokio::test]
    async fn test_open_breaker_skips_provider() {
        let client = Arc::new(ScriptedClient::new(vec![("b", Ok("from b".to_string()))]));
        let providers = vec![
            ProviderConfig::new("a", "https://a/v1", "m", 1).with_tier(ProviderTier::Primary),
            ProviderConfig::new("b", "https://b/v1", "m", 2),
        ];
        let breakers = BreakerRegistry::new(&providers, &BreakerConfig::default());
        breakers.record_failure("a").await;
        breakers.record_failure("a").await;

        let router = ProviderRouter::new(providers, Arc::clone(&client) as Arc<dyn VisionClient>, breakers, fast_retry());
        let outcome = router.route(&image(), "check", None).await;

        assert!(matches!(outcome, RouteOutcome::Replied { provider_id, .. } if provider_id == "b"));
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn test_emergency_model_probe_gates_call() {
        let client = Arc::new(ScriptedClient::new(vec![("pay", Ok("expensive".to_string()))]));
        client.models_available.store(false, Ordering::SeqCst);

        let router = router_with(
            vec![ProviderConfig::new("pay", "https://pay/v1", "m", 1)
                .with_tier(ProviderTier::Emergency)],
            Arc::clone(&client),
        );

        assert_eq!(router.route(&image(), "check", None).await, RouteOutcome::Exhausted);
        // The completion endpoint was never hit.
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_emergency_model_releases_the_probe_slot() {
        let client = Arc::new(ScriptedClient::new(vec![("pay", Ok("expensive".to_string()))]));
        client.models_available.store(false, Ordering::SeqCst);

        let providers = vec![ProviderConfig::new("pay", "https://pay/v1", "m", 1)
            .with_tier(ProviderTier::Emergency)];
        let config = BreakerConfig {
            recovery_timeout_ms: 0,
            ..Default::default()
        };
        let breakers = BreakerRegistry::new(&providers, &config);
        for _ in 0..config.emergency_failure_threshold {
            breakers.record_failure("pay").await;
        }

        let router = ProviderRouter::new(providers, Arc::clone(&client) as Arc<dyn VisionClient>, breakers, fast_retry());

        // The open breaker admits a half-open probe; the model listing says
        // the model is gone, which must count as the probe's failure.
        assert_eq!(router.route(&image(), "check", None).await, RouteOutcome::Exhausted);
        assert_eq!(client.call_count(), 0);

        // The model comes back. The next probe must be admitted and the
        // provider must serve traffic again.
        client.models_available.store(true, Ordering::SeqCst);
        let outcome = router.route(&image(), "check", None).await;
        assert!(matches!(outcome, RouteOutcome::Replied { provider_id, .. } if provider_id == "pay"));
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn test_providers_sorted_by_priority() {
        let client = Arc::new(ScriptedClient::new(vec![("first", Ok("hi".to_string()))]));
        // Deliberately out of order.
        let router = router_with(
            vec![
                ProviderConfig::new("second", "https://b/v1", "m", 5),
                ProviderConfig::new("first", "https://a/v1", "m", 1),
            ],
            Arc::clone(&client),
        );

        let outcome = router.route(&image(), "check", None).await;
        assert!(matches!(outcome, RouteOutcome::Replied { provider_id, .. } if provider_id == "first"));
    }
}
