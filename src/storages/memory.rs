//! In-memory link store.
//!
//! Reference backend for development and tests. Enforces the same unique
//! constraint on `code` that a durable backend would, so the generation /
//! creation race behaves identically.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use crate::errors::{Result, SnaplinkError};
use crate::storages::models::{
    ClickDimension, ClickEvent, GroupedCount, LinkUpdate, NewLink, ShortLink,
};
use crate::storages::LinkStore;

#[derive(Default)]
pub struct MemoryStore {
    /// id -> link
    links: DashMap<String, ShortLink>,
    /// code -> id
    codes: DashMap<String, String>,
    /// Serializes create() so the code unique-check and insert are atomic.
    create_lock: Mutex<()>,
    clicks: DashMap<String, Vec<ClickEvent>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn dimension_key(click: &ClickEvent, dimension: ClickDimension) -> String {
        match dimension {
            ClickDimension::Day => click.created_at.date_naive().format("%Y-%m-%d").to_string(),
            ClickDimension::Country => click
                .country
                .clone()
                .unwrap_or_else(|| "Unknown".to_string()),
            ClickDimension::Device => click.device.clone().unwrap_or_else(|| "Unknown".to_string()),
            ClickDimension::Os => click.os.clone().unwrap_or_else(|| "Unknown".to_string()),
        }
    }
}

#[async_trait]
impl LinkStore for MemoryStore {
    async fn find_by_code(&self, code: &str) -> Result<Option<ShortLink>> {
        let id = match self.codes.get(code) {
            Some(entry) => entry.value().clone(),
            None => return Ok(None),
        };
        Ok(self.links.get(&id).map(|entry| entry.value().clone()))
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<ShortLink>> {
        Ok(self.links.get(id).map(|entry| entry.value().clone()))
    }

    async fn create(&self, link: NewLink) -> Result<ShortLink> {
        let _guard = self
            .create_lock
            .lock()
            .map_err(|_| SnaplinkError::store_unavailable("create lock poisoned"))?;

        if self.codes.contains_key(&link.code) {
            return Err(SnaplinkError::duplicate_code(format!(
                "Short code already exists: {}",
                link.code
            )));
        }

        let now = Utc::now();
        let stored = ShortLink {
            id: Uuid::new_v4().to_string(),
            code: link.code.clone(),
            original_url: link.original_url,
            owner_id: link.owner_id,
            creator_ip: link.creator_ip,
            is_active: true,
            expires_at: link.expires_at,
            created_at: now,
            updated_at: now,
        };

        self.codes.insert(link.code, stored.id.clone());
        self.links.insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    async fn update(&self, id: &str, changes: LinkUpdate) -> Result<ShortLink> {
        let mut entry = self
            .links
            .get_mut(id)
            .ok_or_else(|| SnaplinkError::not_found(format!("Link not found: {}", id)))?;

        let link = entry.value_mut();
        if let Some(url) = changes.original_url {
            link.original_url = url;
        }
        if let Some(active) = changes.is_active {
            link.is_active = active;
        }
        if let Some(expires_at) = changes.expires_at {
            link.expires_at = expires_at;
        }
        link.updated_at = Utc::now();
        Ok(link.clone())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let (_, link) = self
            .links
            .remove(id)
            .ok_or_else(|| SnaplinkError::not_found(format!("Link not found: {}", id)))?;
        self.codes.remove(&link.code);
        // Click history is kept; retention is an external policy, not ours.
        Ok(())
    }

    async fn count_by_code(&self, code: &str) -> Result<u64> {
        Ok(if self.codes.contains_key(code) { 1 } else { 0 })
    }

    async fn count_anonymous_by_ip(&self, ip: &str) -> Result<u64> {
        let count = self
            .links
            .iter()
            .filter(|entry| {
                let link = entry.value();
                link.owner_id.is_none() && link.creator_ip.as_deref() == Some(ip)
            })
            .count();
        Ok(count as u64)
    }

    async fn insert_click(&self, click: ClickEvent) -> Result<()> {
        if !self.links.contains_key(&click.link_id) {
            return Err(SnaplinkError::persistence_failure(format!(
                "Click references unknown link: {}",
                click.link_id
            )));
        }
        self.clicks.entry(click.link_id.clone()).or_default().push(click);
        Ok(())
    }

    async fn aggregate_clicks(
        &self,
        link_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        dimension: ClickDimension,
    ) -> Result<Vec<GroupedCount>> {
        let mut groups: HashMap<String, u64> = HashMap::new();

        if let Some(clicks) = self.clicks.get(link_id) {
            for click in clicks
                .value()
                .iter()
                .filter(|c| c.created_at >= start && c.created_at <= end)
            {
                *groups
                    .entry(Self::dimension_key(click, dimension))
                    .or_insert(0) += 1;
            }
        }

        Ok(groups
            .into_iter()
            .map(|(key, count)| GroupedCount { key, count })
            .collect())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
