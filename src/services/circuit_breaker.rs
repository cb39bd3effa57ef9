//! Per-provider circuit breaking.
//!
//! Each provider gets its own breaker with a tier-dependent threshold:
//! primaries trip fast so traffic fails over quickly, fallbacks tolerate
//! more consecutive failures. An open circuit rejects calls until the
//! recovery timeout elapses, then admits exactly one half-open trial.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::domain::models::{BreakerConfig, ProviderConfig, ProviderTier};

/// Breaker state machine position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls flow normally.
    Closed,
    /// Calls are rejected until the recovery timeout elapses.
    Open,
    /// One trial call is in flight; its outcome decides the next state.
    HalfOpen,
}

/// Breaker for a single provider.
#[derive(Debug)]
struct CircuitBreaker {
    failure_threshold: u32,
    recovery_timeout: Duration,
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<DateTime<Utc>>,
    probe_in_flight: bool,
}

impl CircuitBreaker {
    fn new(failure_threshold: u32, recovery_timeout: Duration) -> Self {
        Self {
            failure_threshold,
            recovery_timeout,
            state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            probe_in_flight: false,
        }
    }

    /// Whether a call may proceed right now. Transitions Open -> HalfOpen
    /// when the recovery timeout has elapsed; in HalfOpen, admits only the
    /// single probe call.
    fn allow(&mut self) -> bool {
        match self.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let recovered = self
                    .opened_at
                    .map_or(true, |at| Utc::now() - at >= self.recovery_timeout);
                if recovered {
                    self.state = CircuitState::HalfOpen;
                    self.probe_in_flight = true;
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                if self.probe_in_flight {
                    false
                } else {
                    self.probe_in_flight = true;
                    true
                }
            }
        }
    }

    fn record_success(&mut self) {
        self.state = CircuitState::Closed;
        self.consecutive_failures = 0;
        self.opened_at = None;
        self.probe_in_flight = false;
    }

    fn record_failure(&mut self) {
        if self.state == CircuitState::HalfOpen {
            // Failed probe reopens immediately with a fresh timeout.
            self.state = CircuitState::Open;
            self.opened_at = Some(Utc::now());
            self.probe_in_flight = false;
            return;
        }

        self.consecutive_failures += 1;
        if self.consecutive_failures >= self.failure_threshold {
            self.state = CircuitState::Open;
            self.opened_at = Some(Utc::now());
        }
    }
}

/// All provider breakers behind one async lock.
pub struct BreakerRegistry {
    breakers: RwLock<HashMap<String, CircuitBreaker>>,
}

impl BreakerRegistry {
    /// Build one breaker per provider with its tier's threshold.
    pub fn new(providers: &[ProviderConfig], config: &BreakerConfig) -> Self {
        let recovery = Duration::milliseconds(
            i64::try_from(config.recovery_timeout_ms).unwrap_or(i64::MAX),
        );
        let breakers = providers
            .iter()
            .map(|p| {
                let threshold = match p.tier {
                    ProviderTier::Primary => config.primary_failure_threshold,
                    ProviderTier::Fallback => config.fallback_failure_threshold,
                    ProviderTier::Emergency => config.emergency_failure_threshold,
                };
                (p.id.clone(), CircuitBreaker::new(threshold, recovery))
            })
            .collect();

        Self {
            breakers: RwLock::new(breakers),
        }
    }

    /// Whether a call to the given provider may proceed. Unknown providers
    /// are always allowed; they simply have no breaker history.
    pub async fn allow(&self, provider_id: &str) -> bool {
        let mut breakers = self.breakers.write().await;
        breakers.get_mut(provider_id).map_or(true, |b| {
            let allowed = b.allow();
            if !allowed {
                info!(provider = provider_id, "circuit open, skipping provider");
            }
            allowed
        })
    }

    pub async fn record_success(&self, provider_id: &str) {
        let mut breakers = self.breakers.write().await;
        if let Some(breaker) = breakers.get_mut(provider_id) {
            breaker.record_success();
        }
    }

    pub async fn record_failure(&self, provider_id: &str) {
        let mut breakers = self.breakers.write().await;
        if let Some(breaker) = breakers.get_mut(provider_id) {
            breaker.record_failure();
            if breaker.state == CircuitState::Open {
                warn!(
                    provider = provider_id,
                    failures = breaker.consecutive_failures,
                    "circuit opened"
                );
            }
        }
    }

    /// Current state of a provider's breaker, if one exists.
    pub async fn state(&self, provider_id: &str) -> Option<CircuitState> {
        let breakers = self.breakers.read().await;
        breakers.get(provider_id).map(|b| b.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn providers() -> Vec<ProviderConfig> {
        vec![
            ProviderConfig::new("fast", "https://a/v1", "m", 1).with_tier(ProviderTier::Primary),
            ProviderConfig::new("slow", "https://b/v1", "m", 2).with_tier(ProviderTier::Fallback),
        ]
    }

    #[tokio::test]
    async fn test_closed_allows_calls() {
        let registry = BreakerRegistry::new(&providers(), &BreakerConfig::default());
        assert!(registry.allow("fast").await);
        assert_eq!(registry.state("fast").await, Some(CircuitState::Closed));
    }

    #[tokio::test]
    async fn test_primary_trips_after_threshold() {
        let registry = BreakerRegistry::new(&providers(), &BreakerConfig::default());

        registry.record_failure("fast").await;
        assert_eq!(registry.state("fast").await, Some(CircuitState::Closed));
        registry.record_failure("fast").await;
        assert_eq!(registry.state("fast").await, Some(CircuitState::Open));
        assert!(!registry.allow("fast").await);
    }

    #[tokio::test]
    async fn test_fallback_tolerates_more_failures() {
        let registry = BreakerRegistry::new(&providers(), &BreakerConfig::default());

        for _ in 0..3 {
            registry.record_failure("slow").await;
        }
        assert_eq!(registry.state("slow").await, Some(CircuitState::Closed));
        registry.record_failure("slow").await;
        assert_eq!(registry.state("slow").await, Some(CircuitState::Open));
    }

    #[tokio::test]
    async fn test_success_resets_failure_count() {
        let registry = BreakerRegistry::new(&providers(), &BreakerConfig::default());

        registry.record_failure("fast").await;
        registry.record_success("fast").await;
        registry.record_failure("fast").await;
        assert_eq!(registry.state("fast").await, Some(CircuitState::Closed));
    }

    #[tokio::test]
    async fn test_half_open_admits_single_probe() {
        let config = BreakerConfig {
            recovery_timeout_ms: 0,
            ..Default::default()
        };
        let registry = BreakerRegistry::new(&providers(), &config);

        registry.record_failure("fast").await;
        registry.record_failure("fast").await;
        assert_eq!(registry.state("fast").await, Some(CircuitState::Open));

        // Zero recovery timeout: the next allow becomes the half-open probe.
        assert!(registry.allow("fast").await);
        assert_eq!(registry.state("fast").await, Some(CircuitState::HalfOpen));
        // A second caller is rejected while the probe is in flight.
        assert!(!registry.allow("fast").await);

        registry.record_success("fast").await;
        assert_eq!(registry.state("fast").await, Some(CircuitState::Closed));
    }

    #[tokio::test]
    async fn test_failed_probe_reopens() {
        let config = BreakerConfig {
            recovery_timeout_ms: 0,
            ..Default::default()
        };
        let registry = BreakerRegistry::new(&providers(), &config);

        registry.record_failure("fast").await;
        registry.record_failure("fast").await;
        assert!(registry.allow("fast").await);
        registry.record_failure("fast").await;
        assert_eq!(registry.state("fast").await, Some(CircuitState::Open));
    }

    #[tokio::test]
    async fn test_unknown_provider_is_allowed() {
        let registry = BreakerRegistry::new(&providers(), &BreakerConfig::default());
        assert!(registry.allow("unregistered").await);
        assert_eq!(registry.state("unregistered").await, None);
    }
}
