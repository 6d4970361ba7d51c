//! Moka-backed resolution cache.
//!
//! Bounded capacity with LRU-style eviction and a sliding TTL: moka's
//! `time_to_idle` resets the clock on every read, so hot links stay cached
//! for as long as they keep being resolved. The link's own `expires_at` is a
//! separate, logical expiry and is checked on every `get`: a snapshot whose
//! link has expired is treated as a miss and evicted even if the cache entry
//! itself is still fresh.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use moka::future::Cache;
use tracing::debug;

use crate::cache::traits::ResolutionCache;
use crate::config::CacheConfig;
use crate::storages::LinkSnapshot;

pub struct MokaResolutionCache {
    inner: Cache<String, LinkSnapshot>,
}

impl MokaResolutionCache {
    pub fn new(config: &CacheConfig) -> Self {
        let inner = Cache::builder()
            .max_capacity(config.max_capacity)
            .time_to_idle(Duration::from_secs(config.idle_ttl_secs))
            .build();

        debug!(
            "Resolution cache initialized: capacity={}, idle_ttl={}s",
            config.max_capacity, config.idle_ttl_secs
        );
        Self { inner }
    }
}

#[async_trait]
impl ResolutionCache for MokaResolutionCache {
    async fn get(&self, code: &str) -> Option<LinkSnapshot> {
        let snapshot = self.inner.get(code).await?;

        if snapshot.is_expired(Utc::now()) {
            debug!("Cached snapshot for {} is logically expired, evicting", code);
            self.inner.invalidate(code).await;
            return None;
        }

        Some(snapshot)
    }

    async fn insert(&self, code: &str, snapshot: LinkSnapshot) {
        self.inner.insert(code.to_string(), snapshot).await;
    }

    async fn remove(&self, code: &str) {
        self.inner.invalidate(code).await;
    }

    fn contains(&self, code: &str) -> bool {
        self.inner.contains_key(code)
    }

    async fn invalidate_all(&self) {
        self.inner.invalidate_all();
    }
}
