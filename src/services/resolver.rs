//! Cache-aside redirect resolution.
//!
//! Fast path: the resolution cache. Fallback: the authoritative store, which
//! repopulates the cache on a resolvable hit. Unresolvable links (inactive or
//! logically expired) are deliberately never cached: a disabled link may be
//! re-enabled, and caching the negative would delay that being observed.

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use crate::cache::ResolutionCache;
use crate::errors::Result;
use crate::storages::{LinkSnapshot, LinkStore};

pub struct Resolver {
    cache: Arc<dyn ResolutionCache>,
    store: Arc<dyn LinkStore>,
}

impl Resolver {
    pub fn new(cache: Arc<dyn ResolutionCache>, store: Arc<dyn LinkStore>) -> Self {
        Self { cache, store }
    }

    /// Resolve a code to a redirect target. `Ok(None)` covers both "no such
    /// code" and "exists but not resolvable"; the visitor can't tell the
    /// difference and neither should the redirect.
    pub async fn resolve(&self, code: &str) -> Result<Option<LinkSnapshot>> {
        if let Some(snapshot) = self.cache.get(code).await {
            return Ok(Some(snapshot));
        }

        let link = match self.store.find_by_code(code).await? {
            Some(link) => link,
            None => return Ok(None),
        };

        if !link.is_resolvable(Utc::now()) {
            debug!("Link {} found but not resolvable, not caching", code);
            return Ok(None);
        }

        let snapshot = LinkSnapshot::from(&link);
        self.cache.insert(code, snapshot.clone()).await;
        Ok(Some(snapshot))
    }

    /// Seed the cache, e.g. right after creation.
    pub async fn prime(&self, code: &str, snapshot: LinkSnapshot) {
        self.cache.insert(code, snapshot).await;
    }

    /// Invalidation hook for link mutations. Must be called after any update
    /// that changes `is_active` or `expires_at`, so the next resolve sees
    /// the store's truth.
    pub async fn invalidate(&self, code: &str) {
        debug!("Invalidating cached snapshot for {}", code);
        self.cache.remove(code).await;
    }

    pub fn cache(&self) -> &Arc<dyn ResolutionCache> {
        &self.cache
    }
}
