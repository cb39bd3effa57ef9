//! Domain models for the visual verification pipeline.

pub mod config;
pub mod image;
pub mod provider;
pub mod request;
pub mod result;

pub use config::{
    BreakerConfig, CacheConfig, GuardConfig, NormalizerConfig, OptimizerConfig, PipelineConfig,
    RetryConfig,
};
pub use image::OptimizedImage;
pub use provider::{ProviderConfig, ProviderTier};
pub use request::{AnalysisContext, AnalysisRequest};
pub use result::{VerificationResult, VisualEvidence};
