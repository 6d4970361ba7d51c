//! Link lifecycle: creation, updates, deletion.
//!
//! Creation wires the code generator to the advisory uniqueness check
//! (cache probe first, then the store count) and retries the whole
//! generation if the store's unique constraint still rejects the insert,
//! since another writer can win the race between check and create. Successful
//! creation primes the resolution cache so the very first resolve is served
//! without a store round-trip.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};
use url::Url;

use crate::config::LinkConfig;
use crate::errors::{Result, SnaplinkError};
use crate::services::codegen::CodeGenerator;
use crate::services::resolver::Resolver;
use crate::storages::{LinkSnapshot, LinkStore, LinkUpdate, NewLink, ShortLink};

/// Bound on whole-generation retries after a lost create race.
const MAX_CREATE_RETRIES: usize = 3;

#[derive(Debug, Clone)]
pub struct CreateLinkRequest {
    pub original_url: String,
    /// None = anonymous creation.
    pub owner_id: Option<String>,
    /// Client IP, used for the anonymous per-IP cap.
    pub client_ip: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

pub struct LinkService {
    store: Arc<dyn LinkStore>,
    resolver: Arc<Resolver>,
    generator: CodeGenerator,
    config: LinkConfig,
}

impl LinkService {
    pub fn new(store: Arc<dyn LinkStore>, resolver: Arc<Resolver>, config: LinkConfig) -> Self {
        let generator = CodeGenerator::new(config.code_length, config.max_generation_attempts);
        Self {
            store,
            resolver,
            generator,
            config,
        }
    }

    pub async fn create(&self, request: CreateLinkRequest) -> Result<ShortLink> {
        validate_url(&request.original_url)?;

        let mut expires_at = request.expires_at;
        let mut creator_ip = None;

        if request.owner_id.is_none() {
            let ip = request.client_ip.clone().ok_or_else(|| {
                SnaplinkError::validation("Anonymous creation requires a client IP")
            })?;

            let existing = self.store.count_anonymous_by_ip(&ip).await?;
            if existing >= self.config.anonymous_link_limit {
                return Err(SnaplinkError::validation(
                    "Free limit reached. Please login to create more links.",
                ));
            }

            // Anonymous links always expire.
            expires_at = Some(Utc::now() + Duration::seconds(self.config.anonymous_ttl_secs as i64));
            creator_ip = Some(ip);
        }

        for _ in 0..MAX_CREATE_RETRIES {
            let code = self.generate_unique_code().await?;

            let new_link = NewLink {
                code,
                original_url: request.original_url.clone(),
                owner_id: request.owner_id.clone(),
                creator_ip: creator_ip.clone(),
                expires_at,
            };

            match self.store.create(new_link).await {
                Ok(link) => {
                    info!("Created link {} -> {}", link.code, link.original_url);
                    self.resolver
                        .prime(&link.code, LinkSnapshot::from(&link))
                        .await;
                    return Ok(link);
                }
                Err(SnaplinkError::DuplicateCode(msg)) => {
                    // Advisory check passed but another writer got there
                    // first. Draw again.
                    debug!("Lost creation race ({}), regenerating", msg);
                }
                Err(e) => return Err(e),
            }
        }

        Err(SnaplinkError::generation_exhausted(format!(
            "Could not claim a unique code after {} creation attempts",
            MAX_CREATE_RETRIES
        )))
    }

    async fn generate_unique_code(&self) -> Result<String> {
        let store = Arc::clone(&self.store);
        let cache = Arc::clone(self.resolver.cache());

        self.generator
            .generate(move |code| {
                let store = Arc::clone(&store);
                let cache = Arc::clone(&cache);
                async move {
                    // Cheap cache probe first; cold entries may be absent, the
                    // store count is the authoritative part of the check.
                    if cache.contains(&code) {
                        return Ok(false);
                    }
                    Ok(store.count_by_code(&code).await? == 0)
                }
            })
            .await
    }

    /// Apply an update and invalidate the cached snapshot, so activation
    /// toggles and expiry changes are observed on the next resolve.
    pub async fn update(&self, id: &str, changes: LinkUpdate) -> Result<ShortLink> {
        let link = self.store.update(id, changes).await?;
        self.resolver.invalidate(&link.code).await;
        Ok(link)
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        let link = self
            .store
            .find_by_id(id)
            .await?
            .ok_or_else(|| SnaplinkError::not_found(format!("Link not found: {}", id)))?;
        self.store.delete(id).await?;
        self.resolver.invalidate(&link.code).await;
        Ok(())
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<ShortLink>> {
        self.store.find_by_id(id).await
    }
}

fn validate_url(raw: &str) -> Result<()> {
    let url = Url::parse(raw)
        .map_err(|_| SnaplinkError::validation(format!("Invalid URL: {}", raw)))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(SnaplinkError::validation(format!(
            "Unsupported URL scheme: {}",
            scheme
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MokaResolutionCache;
    use crate::config::CacheConfig;
    use crate::storages::memory::MemoryStore;

    fn service() -> (LinkService, Arc<Resolver>, Arc<dyn LinkStore>) {
        let store: Arc<dyn LinkStore> = Arc::new(MemoryStore::new());
        let cache = Arc::new(MokaResolutionCache::new(&CacheConfig {
            max_capacity: 100,
            idle_ttl_secs: 3600,
        }));
        let resolver = Arc::new(Resolver::new(cache, Arc::clone(&store)));
        let service = LinkService::new(Arc::clone(&store), Arc::clone(&resolver), LinkConfig::default());
        (service, resolver, store)
    }

    fn owned_request(url: &str) -> CreateLinkRequest {
        CreateLinkRequest {
            original_url: url.to_string(),
            owner_id: Some("user-1".to_string()),
            client_ip: None,
            expires_at: None,
        }
    }

    #[tokio::test]
    async fn test_create_primes_cache() {
        let (service, resolver, _) = service();
        let link = service.create(owned_request("https://example.com")).await.unwrap();

        assert_eq!(link.code.len(), 6);
        assert!(resolver.cache().contains(&link.code));
    }

    #[tokio::test]
    async fn test_create_rejects_bad_urls() {
        let (service, _, _) = service();
        for bad in ["not a url", "ftp://example.com/file", "javascript:alert(1)"] {
            let err = service.create(owned_request(bad)).await.unwrap_err();
            assert!(matches!(err, SnaplinkError::Validation(_)), "{}", bad);
        }
    }

    #[tokio::test]
    async fn test_anonymous_creation_gets_expiry_and_ip() {
        let (service, _, _) = service();
        let link = service
            .create(CreateLinkRequest {
                original_url: "https://example.com".to_string(),
                owner_id: None,
                client_ip: Some("203.0.113.4".to_string()),
                expires_at: None,
            })
            .await
            .unwrap();

        assert!(link.expires_at.is_some());
        assert_eq!(link.creator_ip.as_deref(), Some("203.0.113.4"));
        assert!(link.owner_id.is_none());
    }

    #[tokio::test]
    async fn test_anonymous_per_ip_cap() {
        let (service, _, _) = service();
        let request = CreateLinkRequest {
            original_url: "https://example.com".to_string(),
            owner_id: None,
            client_ip: Some("203.0.113.4".to_string()),
            expires_at: None,
        };

        for _ in 0..3 {
            service.create(request.clone()).await.unwrap();
        }
        let err = service.create(request).await.unwrap_err();
        assert!(matches!(err, SnaplinkError::Validation(_)));
    }

    #[tokio::test]
    async fn test_update_invalidates_cache() {
        let (service, resolver, _) = service();
        let link = service.create(owned_request("https://example.com")).await.unwrap();
        assert!(resolver.cache().contains(&link.code));

        service
            .update(
                &link.id,
                LinkUpdate {
                    is_active: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(!resolver.cache().contains(&link.code));
        assert!(resolver.resolve(&link.code).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_invalidates_cache() {
        let (service, resolver, _) = service();
        let link = service.create(owned_request("https://example.com")).await.unwrap();
        service.delete(&link.id).await.unwrap();

        assert!(!resolver.cache().contains(&link.code));
        assert!(resolver.resolve(&link.code).await.unwrap().is_none());
    }
}
