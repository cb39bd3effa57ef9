//! Pipeline configuration.
//!
//! Heuristic constants (thresholds, TTLs, vocabulary lists) live here and
//! are injected into the pipeline constructor, keeping every component
//! testable in isolation with fake providers and short timeouts.

use serde::{Deserialize, Serialize};

use super::provider::ProviderConfig;

/// Top-level configuration for [`crate::services::VerificationPipeline`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Providers in any order; the router sorts by ascending priority.
    pub providers: Vec<ProviderConfig>,
    /// Screenshot payload optimization settings.
    pub optimizer: OptimizerConfig,
    /// In-place retry behavior per provider.
    pub retry: RetryConfig,
    /// Circuit breaker thresholds per tier.
    pub breaker: BreakerConfig,
    /// Confidence defaults for the response normalizer.
    pub normalizer: NormalizerConfig,
    /// Anti-hallucination guard vocabulary and ceiling.
    pub guard: GuardConfig,
    /// Result cache bounds.
    pub cache: CacheConfig,
}

/// Settings for screenshot payload optimization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Inputs at or below this size skip optimization entirely.
    pub passthrough_threshold_bytes: usize,
    /// Longest edge after the first resize pass.
    pub max_dimension: u32,
    /// JPEG quality for the first re-encode pass.
    pub jpeg_quality: u8,
    /// Hard ceiling on the encoded payload. 768 KiB of JPEG keeps the
    /// base64 form around 1 MiB, under common provider request limits.
    pub max_payload_bytes: usize,
    /// How many times to step quality/dimension down chasing the ceiling.
    pub reduction_steps: u32,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            passthrough_threshold_bytes: 100 * 1024,
            max_dimension: 1280,
            jpeg_quality: 75,
            max_payload_bytes: 768 * 1024,
            reduction_steps: 3,
        }
    }
}

/// In-place retry policy for a single provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per provider, including the first call.
    pub max_attempts: u32,
    /// Backoff before the first retry; doubles per attempt.
    pub base_delay_ms: u64,
    /// Backoff cap.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            base_delay_ms: 500,
            max_delay_ms: 8_000,
        }
    }
}

/// Circuit breaker thresholds. Primaries trip fast so fallbacks get traffic
/// quickly; fallbacks tolerate more consecutive failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Consecutive failures before a primary provider's circuit opens.
    pub primary_failure_threshold: u32,
    /// Consecutive failures before a fallback provider's circuit opens.
    pub fallback_failure_threshold: u32,
    /// Consecutive failures before the emergency provider's circuit opens.
    pub emergency_failure_threshold: u32,
    /// How long an open circuit stays open before a half-open trial.
    pub recovery_timeout_ms: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            primary_failure_threshold: 2,
            fallback_failure_threshold: 4,
            emergency_failure_threshold: 5,
            recovery_timeout_ms: 30_000,
        }
    }
}

/// Confidence defaults used when a provider reply omits a confidence value.
///
/// Conservative policy: a non-zero default requires at least one structured
/// field in the reply; pure-text fallbacks are always zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Default confidence when structured evidence reports a criteria match.
    pub matched_default_confidence: u8,
    /// Default confidence for structured evidence without a match.
    pub unmatched_default_confidence: u8,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            matched_default_confidence: 70,
            unmatched_default_confidence: 30,
        }
    }
}

/// Vocabulary and limits for the verification guard.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Confidence cap applied when a guard downgrades a verdict.
    pub confidence_ceiling: u8,
    /// Criterion phrases that imply media playback is expected.
    pub playback_criterion_cues: Vec<String>,
    /// Evidence phrases that indicate playback is actually visible.
    pub playback_indicators: Vec<String>,
    /// Criterion phrases that imply fullscreen is expected.
    pub fullscreen_criterion_cues: Vec<String>,
    /// Evidence phrases that indicate fullscreen is actually visible.
    pub fullscreen_indicators: Vec<String>,
}

impl Default for GuardConfig {
    fn default() -> Self {
        let owned = |items: &[&str]| items.iter().map(ToString::to_string).collect();
        Self {
            confidence_ceiling: 25,
            playback_criterion_cues: owned(&[
                "playing",
                "playback",
                "video is",
                "video starts",
                "media is",
                "reproduciendo",
                "en reproducci\u{f3}n",
            ]),
            playback_indicators: owned(&[
                "play button",
                "pause button",
                "pause icon",
                "player controls",
                "progress bar",
                "timeline",
                "seek bar",
                "buffering",
                "timestamp",
                "volume control",
                "bot\u{f3}n de pausa",
                "barra de progreso",
                "controles del reproductor",
                "reproduciendo",
                "en reproducci\u{f3}n",
                "cargando video",
            ]),
            fullscreen_criterion_cues: owned(&[
                "fullscreen",
                "full screen",
                "full-screen",
                "pantalla completa",
            ]),
            fullscreen_indicators: owned(&[
                "fullscreen",
                "full screen",
                "full-screen",
                "entire screen",
                "edge to edge",
                "no browser chrome",
                "no title bar",
                "no address bar",
                "pantalla completa",
                "sin barra",
            ]),
        }
    }
}

/// Result cache bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of cached verdicts.
    pub capacity: usize,
    /// Entries older than this are treated as misses.
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 128,
            ttl_secs: 300,
        }
    }
}
