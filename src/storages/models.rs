use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored short link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShortLink {
    pub id: String,
    pub code: String,
    pub original_url: String,
    /// None for anonymously created links.
    pub owner_id: Option<String>,
    /// Recorded only for anonymous links, for the per-IP creation cap.
    pub creator_ip: Option<String>,
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ShortLink {
    /// Business-rule resolvability, distinct from any cache TTL.
    pub fn is_resolvable(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at.is_none_or(|exp| exp > now)
    }
}

/// Denormalized view of a link held by the resolution cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkSnapshot {
    pub id: String,
    pub original_url: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub owner_id: Option<String>,
}

impl LinkSnapshot {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }
}

impl From<&ShortLink> for LinkSnapshot {
    fn from(link: &ShortLink) -> Self {
        Self {
            id: link.id.clone(),
            original_url: link.original_url.clone(),
            expires_at: link.expires_at,
            is_active: link.is_active,
            owner_id: link.owner_id.clone(),
        }
    }
}

/// Fields for creating a new link; id and timestamps are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewLink {
    pub code: String,
    pub original_url: String,
    pub owner_id: Option<String>,
    pub creator_ip: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Mutable link fields; `None` leaves the field untouched.
#[derive(Debug, Clone, Default)]
pub struct LinkUpdate {
    pub original_url: Option<String>,
    pub is_active: Option<bool>,
    /// Outer None = untouched, inner None = clear the expiry.
    pub expires_at: Option<Option<DateTime<Utc>>>,
}

/// One recorded click, written exactly once and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClickEvent {
    pub id: String,
    pub link_id: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub referer: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub timezone: Option<String>,
    pub device: Option<String>,
    pub browser: Option<String>,
    pub os: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Persisted together with the click as one logical unit.
    pub metadata: ClickMetadata,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClickMetadata {
    pub referer_domain: Option<String>,
    pub language: Option<String>,
    pub is_bot: bool,
    pub isp: Option<String>,
    pub org: Option<String>,
    pub asn: Option<String>,
}

/// Grouping dimension for the store's click aggregation query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickDimension {
    /// UTC calendar day, keyed "YYYY-MM-DD".
    Day,
    Country,
    Device,
    Os,
}

/// One group produced by an aggregation query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupedCount {
    pub key: String,
    pub count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn link(is_active: bool, expires_at: Option<DateTime<Utc>>) -> ShortLink {
        let now = Utc::now();
        ShortLink {
            id: "l1".to_string(),
            code: "abc123".to_string(),
            original_url: "https://example.com".to_string(),
            owner_id: None,
            creator_ip: None,
            is_active,
            expires_at,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_resolvable_active_no_expiry() {
        assert!(link(true, None).is_resolvable(Utc::now()));
    }

    #[test]
    fn test_not_resolvable_when_inactive() {
        let future = Utc::now() + Duration::days(1);
        assert!(!link(false, Some(future)).is_resolvable(Utc::now()));
        assert!(!link(false, None).is_resolvable(Utc::now()));
    }

    #[test]
    fn test_not_resolvable_when_expired() {
        let yesterday = Utc::now() - Duration::days(1);
        assert!(!link(true, Some(yesterday)).is_resolvable(Utc::now()));
    }

    #[test]
    fn test_snapshot_expiry() {
        let now = Utc::now();
        let snap = LinkSnapshot::from(&link(true, Some(now - Duration::hours(1))));
        assert!(snap.is_expired(now));

        let snap = LinkSnapshot::from(&link(true, Some(now + Duration::hours(1))));
        assert!(!snap.is_expired(now));

        let snap = LinkSnapshot::from(&link(true, None));
        assert!(!snap.is_expired(now));
    }
}
