use async_trait::async_trait;

use crate::storages::LinkSnapshot;

/// In-process cache in front of the link store.
///
/// Implementations own their synchronization; callers share them behind an
/// `Arc` without external locking. A `get` miss says nothing authoritative;
/// the store is always consulted on miss (cache-aside).
#[async_trait]
pub trait ResolutionCache: Send + Sync {
    /// Returns the snapshot unless absent, evicted, or logically expired.
    async fn get(&self, code: &str) -> Option<LinkSnapshot>;

    async fn insert(&self, code: &str, snapshot: LinkSnapshot);

    async fn remove(&self, code: &str);

    /// Cheap existence probe that does not refresh recency. Used by code
    /// generation as a pre-check; false negatives are acceptable.
    fn contains(&self, code: &str) -> bool;

    async fn invalidate_all(&self);
}
