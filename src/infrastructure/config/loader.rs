//! Hierarchical configuration loading.
//!
//! Precedence (lowest to highest): programmatic defaults, `veriscope.yaml`
//! in the working directory, then `VERISCOPE_`-prefixed environment
//! variables. Loaded configuration is validated before use; invalid
//! configuration is a programmer error and fails hard, unlike everything
//! downstream of the pipeline façade.

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::PipelineConfig;

/// Configuration validation errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("no providers configured - at least one vision endpoint is required")]
    NoProviders,

    #[error("provider '{0}' has an empty {1}")]
    EmptyProviderField(String, &'static str),

    #[error("duplicate provider id '{0}'")]
    DuplicateProviderId(String),

    #[error("provider '{0}' has invalid temperature {1}. Must be within 0.0..=2.0")]
    InvalidTemperature(String, f32),

    #[error("provider '{0}' has a zero timeout")]
    ZeroTimeout(String),

    #[error("retry max_attempts cannot be 0")]
    ZeroRetryAttempts,

    #[error("invalid backoff: base_delay_ms ({0}) must be <= max_delay_ms ({1})")]
    InvalidBackoff(u64, u64),

    #[error("breaker failure threshold cannot be 0")]
    ZeroFailureThreshold,

    #[error("invalid default confidence {0}. Must be within 0..=100")]
    InvalidDefaultConfidence(u8),

    #[error("guard confidence ceiling {0} exceeds 100")]
    InvalidGuardCeiling(u8),

    #[error("cache capacity cannot be 0")]
    ZeroCacheCapacity,

    #[error("cache ttl_secs cannot be 0")]
    ZeroCacheTtl,

    #[error("optimizer max_payload_bytes cannot be 0")]
    ZeroPayloadCeiling,

    #[error("optimizer max_dimension cannot be 0")]
    ZeroMaxDimension,
}

/// Loader for [`PipelineConfig`] with hierarchical merging.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from defaults, `veriscope.yaml`, and environment.
    pub fn load() -> Result<PipelineConfig> {
        let config: PipelineConfig = Figment::new()
            .merge(Serialized::defaults(PipelineConfig::default()))
            .merge(Yaml::file("veriscope.yaml"))
            .merge(Env::prefixed("VERISCOPE_").split("__"))
            .extract()
            .context("failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific YAML file.
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<PipelineConfig> {
        let config: PipelineConfig = Figment::new()
            .merge(Serialized::defaults(PipelineConfig::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate a configuration after loading or programmatic construction.
    pub fn validate(config: &PipelineConfig) -> Result<(), ConfigError> {
        if config.providers.is_empty() {
            return Err(ConfigError::NoProviders);
        }

        let mut seen_ids = std::collections::HashSet::new();
        for provider in &config.providers {
            if provider.id.is_empty() {
                return Err(ConfigError::EmptyProviderField(provider.id.clone(), "id"));
            }
            if provider.endpoint_url.is_empty() {
                return Err(ConfigError::EmptyProviderField(
                    provider.id.clone(),
                    "endpoint_url",
                ));
            }
            if provider.model.is_empty() {
                return Err(ConfigError::EmptyProviderField(
                    provider.id.clone(),
                    "model",
                ));
            }
            if !seen_ids.insert(provider.id.clone()) {
                return Err(ConfigError::DuplicateProviderId(provider.id.clone()));
            }
            if !(0.0..=2.0).contains(&provider.temperature) {
                return Err(ConfigError::InvalidTemperature(
                    provider.id.clone(),
                    provider.temperature,
                ));
            }
            if provider.timeout_ms == 0 {
                return Err(ConfigError::ZeroTimeout(provider.id.clone()));
            }
        }

        if config.retry.max_attempts == 0 {
            return Err(ConfigError::ZeroRetryAttempts);
        }
        if config.retry.base_delay_ms > config.retry.max_delay_ms {
            return Err(ConfigError::InvalidBackoff(
                config.retry.base_delay_ms,
                config.retry.max_delay_ms,
            ));
        }

        if config.breaker.primary_failure_threshold == 0
            || config.breaker.fallback_failure_threshold == 0
            || config.breaker.emergency_failure_threshold == 0
        {
            return Err(ConfigError::ZeroFailureThreshold);
        }

        for default in [
            config.normalizer.matched_default_confidence,
            config.normalizer.unmatched_default_confidence,
        ] {
            if default > 100 {
                return Err(ConfigError::InvalidDefaultConfidence(default));
            }
        }

        if config.guard.confidence_ceiling > 100 {
            return Err(ConfigError::InvalidGuardCeiling(
                config.guard.confidence_ceiling,
            ));
        }

        if config.cache.capacity == 0 {
            return Err(ConfigError::ZeroCacheCapacity);
        }
        if config.cache.ttl_secs == 0 {
            return Err(ConfigError::ZeroCacheTtl);
        }

        if config.optimizer.max_payload_bytes == 0 {
            return Err(ConfigError::ZeroPayloadCeiling);
        }
        if config.optimizer.max_dimension == 0 {
            return Err(ConfigError::ZeroMaxDimension);
        }

        Ok(())
    }
}
