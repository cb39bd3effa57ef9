//! Bounded TTL cache for verification results.
//!
//! Agents re-verify the same screen state in tight loops; a short-lived
//! cache absorbs those repeats without a provider round trip. Keys cover
//! the full request (image bytes, criterion, and context) so two requests
//! collide only when a provider would see identical input.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use lru::LruCache;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::domain::models::{AnalysisRequest, CacheConfig, VerificationResult};

/// Content hash identifying one verification request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey([u8; 32]);

impl CacheKey {
    /// Derive the key from the full request. Fields are separated by a
    /// zero byte so boundary-shifted inputs cannot collide.
    pub fn derive(request: &AnalysisRequest) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(&request.image_bytes);
        hasher.update([0u8]);
        hasher.update(request.success_criterion.as_bytes());
        hasher.update([0u8]);
        hasher.update(serde_json::to_vec(&request.context).unwrap_or_default());
        Self(hasher.finalize().into())
    }
}

struct CachedEntry {
    result: VerificationResult,
    inserted_at: DateTime<Utc>,
}

/// LRU cache with lazy TTL expiry.
pub struct ResultCache {
    entries: Mutex<LruCache<CacheKey, CachedEntry>>,
    ttl: Duration,
}

impl ResultCache {
    pub fn new(config: &CacheConfig) -> Self {
        let capacity = NonZeroUsize::new(config.capacity).unwrap_or(NonZeroUsize::MIN);
        let ttl = Duration::seconds(i64::try_from(config.ttl_secs).unwrap_or(i64::MAX));
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    /// Look up a cached result. Expired entries are evicted on access.
    pub fn get(&self, key: &CacheKey) -> Option<VerificationResult> {
        let mut entries = self.lock();
        match entries.get(key) {
            Some(entry) if Utc::now() - entry.inserted_at < self.ttl => {
                debug!("verification cache hit");
                Some(entry.result.clone())
            }
            Some(_) => {
                entries.pop(key);
                None
            }
            None => None,
        }
    }

    /// Insert a result, evicting the least recently used entry if full.
    pub fn put(&self, key: CacheKey, result: VerificationResult) {
        self.lock().put(
            key,
            CachedEntry {
                result,
                inserted_at: Utc::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// A panicked holder cannot leave the cache in a torn state; entries
    /// are replaced whole, so recover from poisoning instead of spreading it.
    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<CacheKey, CachedEntry>> {
        self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
