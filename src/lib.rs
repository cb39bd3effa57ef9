//! veriscope: visual verification of automation outcomes.
//!
//! Agents that drive a browser or desktop need to know whether an action
//! actually worked. This crate takes a screenshot and a natural-language
//! success criterion, sends them to a vision-capable model endpoint, and
//! returns a structured, conservative verdict.
//!
//! The pipeline is built from five cooperating services:
//!
//! - an image optimizer that re-encodes screenshots under provider payload
//!   limits,
//! - a provider router that walks a priority-ordered chain of endpoints
//!   with per-provider circuit breakers and bounded in-place retries,
//! - a cascading normalizer that extracts a verdict from well-formed JSON,
//!   embedded JSON, broken JSON, or labeled text,
//! - an anti-hallucination guard that downgrades verified verdicts whose
//!   evidence does not support them,
//! - a bounded TTL cache keyed on the full request content.
//!
//! The public entry point is [`VerificationPipeline::analyze_screenshot`],
//! which is total: it always produces a [`VerificationResult`], degrading
//! to a safe non-verified fallback when providers are unreachable or reply
//! with garbage.
//!
//! ```no_run
//! use veriscope::{AnalysisRequest, ConfigLoader, VerificationPipeline};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = ConfigLoader::load()?;
//! let pipeline = VerificationPipeline::new(config)?;
//!
//! let screenshot = std::fs::read("after_click.png")?;
//! let request = AnalysisRequest::new(screenshot, "the video is playing");
//! let result = pipeline.analyze_screenshot(&request).await;
//!
//! if result.verified {
//!     println!("verified with confidence {}", result.confidence);
//! }
//! # Ok(())
//! # }
//! ```

pub mod domain;
pub mod infrastructure;
pub mod services;

pub use domain::errors::TransportError;
pub use domain::models::{
    AnalysisContext, AnalysisRequest, PipelineConfig, ProviderConfig, ProviderTier,
    VerificationResult, VisualEvidence,
};
pub use domain::ports::VisionClient;
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use infrastructure::http::HttpVisionClient;
pub use services::{CircuitState, RouteOutcome, VerificationPipeline};
