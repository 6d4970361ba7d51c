use std::env;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::Result;

pub mod memory;
pub mod models;

pub use models::{
    ClickDimension, ClickEvent, ClickMetadata, GroupedCount, LinkSnapshot, LinkUpdate, NewLink,
    ShortLink,
};

/// Durable storage for links and click records.
///
/// The store is the authority on code uniqueness: `create` enforces the
/// unique constraint and returns `DuplicateCode` when another writer won the
/// race, regardless of what the advisory pre-checks said.
#[async_trait]
pub trait LinkStore: Send + Sync {
    async fn find_by_code(&self, code: &str) -> Result<Option<ShortLink>>;
    async fn find_by_id(&self, id: &str) -> Result<Option<ShortLink>>;
    async fn create(&self, link: NewLink) -> Result<ShortLink>;
    async fn update(&self, id: &str, changes: LinkUpdate) -> Result<ShortLink>;
    async fn delete(&self, id: &str) -> Result<()>;
    async fn count_by_code(&self, code: &str) -> Result<u64>;
    /// Number of links created anonymously from a given IP.
    async fn count_anonymous_by_ip(&self, ip: &str) -> Result<u64>;

    /// Append one click record (click + metadata as a single unit).
    async fn insert_click(&self, click: ClickEvent) -> Result<()>;

    /// Grouped click counts for a link within `[start, end]` inclusive.
    /// Results are unordered; callers sort and truncate as needed.
    async fn aggregate_clicks(
        &self,
        link_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        dimension: ClickDimension,
    ) -> Result<Vec<GroupedCount>>;

    fn backend_name(&self) -> &'static str;
}

pub struct StorageFactory;

impl StorageFactory {
    pub fn create() -> Result<Arc<dyn LinkStore>> {
        let backend = env::var("STORAGE_BACKEND").unwrap_or_else(|_| "memory".into());

        match backend.as_str() {
            "memory" => Ok(Arc::new(memory::MemoryStore::new())),
            other => Err(crate::errors::SnaplinkError::config(format!(
                "Unknown storage backend: {}",
                other
            ))),
        }
    }
}
