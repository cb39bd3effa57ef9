//! Pipeline services: payload optimization, routing, normalization,
//! guarding, and caching, composed by [`VerificationPipeline`].

pub mod circuit_breaker;
pub mod guard;
pub mod image_optimizer;
pub mod normalizer;
pub mod pipeline;
pub mod prompt;
pub mod provider_router;
pub mod result_cache;

pub use circuit_breaker::{BreakerRegistry, CircuitState};
pub use guard::VerificationGuard;
pub use image_optimizer::ImageOptimizer;
pub use normalizer::ResponseNormalizer;
pub use pipeline::VerificationPipeline;
pub use provider_router::{ProviderRouter, RetryPolicy, RouteOutcome};
pub use result_cache::{CacheKey, ResultCache};
