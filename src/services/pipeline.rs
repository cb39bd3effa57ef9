//! The verification pipeline façade.
//!
//! Composes the optimizer, router, normalizer, guard, and cache into one
//! entry point. `analyze_screenshot` is total: once a pipeline is built,
//! every invocation returns a [`VerificationResult`], worst case a safe
//! non-verified fallback.

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, instrument};

use crate::domain::models::{AnalysisRequest, PipelineConfig, VerificationResult};
use crate::domain::ports::VisionClient;
use crate::infrastructure::config::ConfigLoader;
use crate::infrastructure::http::HttpVisionClient;
use crate::services::circuit_breaker::BreakerRegistry;
use crate::services::guard::VerificationGuard;
use crate::services::image_optimizer::ImageOptimizer;
use crate::services::normalizer::ResponseNormalizer;
use crate::services::prompt;
use crate::services::provider_router::{ProviderRouter, RetryPolicy};
use crate::services::result_cache::{CacheKey, ResultCache};

/// End-to-end screenshot verification.
pub struct VerificationPipeline {
    optimizer: ImageOptimizer,
    router: ProviderRouter,
    normalizer: ResponseNormalizer,
    guard: VerificationGuard,
    cache: ResultCache,
}

impl VerificationPipeline {
    /// Build a pipeline with the production HTTP transport.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let client: Arc<dyn VisionClient> = Arc::new(HttpVisionClient::new()?);
        Self::with_client(config, client)
    }

    /// Build a pipeline with an injected transport. This is the seam used
    /// by integration tests and embedders with custom transports.
    pub fn with_client(config: PipelineConfig, client: Arc<dyn VisionClient>) -> Result<Self> {
        ConfigLoader::validate(&config)?;

        let breakers = BreakerRegistry::new(&config.providers, &config.breaker);
        let retry = RetryPolicy::new(&config.retry);

        Ok(Self {
            optimizer: ImageOptimizer::new(config.optimizer),
            router: ProviderRouter::new(config.providers, client, breakers, retry),
            normalizer: ResponseNormalizer::new(config.normalizer),
            guard: VerificationGuard::new(config.guard),
            cache: ResultCache::new(&config.cache),
        })
    }

    /// Verify a screenshot against a natural-language success criterion.
    ///
    /// Never panics and never returns a transport error; failures along the
    /// way degrade into a fallback result with `verified == false`.
    ///
    /// Only non-fallback results are cached: identical inputs within the TTL
    /// are answered without a second provider call once a real verdict has
    /// been obtained, but a fallback (outage, unparseable reply) is retried
    /// on the next invocation rather than pinned for the whole TTL.
    #[instrument(skip_all, fields(criterion = %request.success_criterion))]
    pub async fn analyze_screenshot(&self, request: &AnalysisRequest) -> VerificationResult {
        let key = CacheKey::derive(request);
        if let Some(cached) = self.cache.get(&key) {
            debug!("returning cached verification result");
            return cached;
        }

        let image = self.optimizer.optimize(&request.image_bytes);
        let user_prompt = prompt::user_prompt(&request.success_criterion, &request.context);

        let outcome = self
            .router
            .route(&image, &user_prompt, Some(prompt::SYSTEM_PROMPT))
            .await;

        let mut result = self.normalizer.normalize(outcome);
        self.guard
            .apply(&mut result, &request.success_criterion, &request.context);

        // Fallbacks are transient by nature (outage, bad reply); caching
        // them would pin a failure for the whole TTL.
        if !result.is_fallback {
            self.cache.put(key, result.clone());
        }

        result
    }

    /// Breaker registry, exposed for health inspection.
    pub fn breakers(&self) -> &BreakerRegistry {
        self.router.breakers()
    }

    /// Number of live cache entries.
    pub fn cached_results(&self) -> usize {
        self.cache.len()
    }
}
