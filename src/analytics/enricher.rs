//! Device and geolocation enrichment for click events.
//!
//! User-agent parsing is synchronous and infallible; unknown fields fall back
//! to `"Unknown"` / `"desktop"`. Geolocation prefers CDN edge headers (free),
//! then the external provider for public IPs, and is skipped outright for
//! private, loopback or sentinel addresses. Enrichment never fails; at worst
//! the geo side comes back empty.

use std::sync::Arc;

use actix_web::http::header::HeaderMap;
use url::Url;
use woothee::parser::Parser;

use crate::analytics::geoip::{GeoInfo, GeoLookup};
use crate::utils::ip::is_lookupable;

/// Parsed device attributes, never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// desktop / mobile / crawler / ...
    pub device: String,
    pub browser: String,
    pub os: String,
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self {
            device: "desktop".to_string(),
            browser: "Unknown".to_string(),
            os: "Unknown".to_string(),
        }
    }
}

/// Geolocation headers injected by a CDN edge (Cloudflare naming).
#[derive(Debug, Clone, Default)]
pub struct EdgeGeoHeaders {
    pub country: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub timezone: Option<String>,
}

impl EdgeGeoHeaders {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let get = |name: &str| {
            headers
                .get(name)
                .and_then(|h| h.to_str().ok())
                .map(String::from)
        };
        Self {
            country: get("cf-ipcountry"),
            city: get("cf-ipcity"),
            region: get("cf-region"),
            timezone: get("cf-timezone"),
        }
    }

    /// Usable only when the edge actually resolved a country.
    pub fn has_country(&self) -> bool {
        self.country.is_some()
    }

    fn to_geo(&self) -> GeoInfo {
        GeoInfo {
            country: self.country.clone(),
            city: self.city.clone(),
            region: self.region.clone(),
            timezone: self.timezone.clone(),
            ..GeoInfo::default()
        }
    }
}

/// Combined enrichment result.
#[derive(Debug, Clone, Default)]
pub struct Enrichment {
    pub device: Option<DeviceInfo>,
    pub geo: GeoInfo,
}

/// Parse a user-agent string. Never fails.
pub fn parse_user_agent(user_agent: &str) -> DeviceInfo {
    let parser = Parser::new();
    let result = match parser.parse(user_agent) {
        Some(r) => r,
        None => return DeviceInfo::default(),
    };

    let device = match result.category {
        "pc" | "" | "UNKNOWN" => "desktop".to_string(),
        "smartphone" | "mobilephone" => "mobile".to_string(),
        other => other.to_string(),
    };

    let named = |value: &str| {
        if value.is_empty() || value == "UNKNOWN" {
            "Unknown".to_string()
        } else {
            value.to_string()
        }
    };

    DeviceInfo {
        device,
        browser: named(result.name),
        os: named(result.os),
    }
}

/// Bot heuristic: lowercased UA contains "bot" or "crawler".
pub fn is_bot(user_agent: &str) -> bool {
    let ua = user_agent.to_lowercase();
    ua.contains("bot") || ua.contains("crawler")
}

/// Hostname of the referer URL, if it parses.
pub fn referer_domain(referer: &str) -> Option<String> {
    Url::parse(referer)
        .ok()
        .and_then(|url| url.host_str().map(String::from))
}

pub struct DeviceGeoEnricher {
    geoip: Arc<dyn GeoLookup>,
}

impl DeviceGeoEnricher {
    pub fn new(geoip: Arc<dyn GeoLookup>) -> Self {
        Self { geoip }
    }

    /// Enrich a click with device and location data.
    ///
    /// Edge headers win when they carry a country (zero network cost); a
    /// network lookup happens only for public, routable IPs.
    pub async fn enrich(
        &self,
        user_agent: Option<&str>,
        ip: &str,
        edge: Option<&EdgeGeoHeaders>,
    ) -> Enrichment {
        let device = user_agent.map(parse_user_agent);

        let geo = if let Some(edge) = edge.filter(|e| e.has_country()) {
            edge.to_geo()
        } else if is_lookupable(ip) {
            self.geoip.lookup(ip).await.unwrap_or_default()
        } else {
            GeoInfo::default()
        };

        Enrichment { device, geo }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const CHROME_LINUX: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
        (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
    const SAFARI_IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_1 like Mac OS X) \
        AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Mobile/15E148 Safari/604.1";
    const GOOGLEBOT: &str =
        "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)";

    struct RecordingLookup {
        calls: AtomicUsize,
        result: Option<GeoInfo>,
    }

    impl RecordingLookup {
        fn new(result: Option<GeoInfo>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                result,
            }
        }
    }

    #[async_trait]
    impl GeoLookup for RecordingLookup {
        async fn lookup(&self, _ip: &str) -> Option<GeoInfo> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }

        fn name(&self) -> &'static str {
            "recording"
        }
    }

    #[test]
    fn test_parse_desktop_browser() {
        let info = parse_user_agent(CHROME_LINUX);
        assert_eq!(info.device, "desktop");
        assert_eq!(info.browser, "Chrome");
        assert_eq!(info.os, "Linux");
    }

    #[test]
    fn test_parse_mobile_browser() {
        let info = parse_user_agent(SAFARI_IPHONE);
        assert_eq!(info.device, "mobile");
        assert_eq!(info.os, "iPhone");
    }

    #[test]
    fn test_parse_garbage_defaults() {
        let info = parse_user_agent("definitely not a user agent");
        assert_eq!(info.device, "desktop");
        assert_eq!(info.browser, "Unknown");
        assert_eq!(info.os, "Unknown");
    }

    #[test]
    fn test_is_bot() {
        assert!(is_bot(GOOGLEBOT));
        assert!(is_bot("some-Crawler/1.0"));
        assert!(!is_bot(CHROME_LINUX));
    }

    #[test]
    fn test_referer_domain() {
        assert_eq!(
            referer_domain("https://news.ycombinator.com/item?id=1"),
            Some("news.ycombinator.com".to_string())
        );
        assert_eq!(referer_domain("not a url"), None);
    }

    #[tokio::test]
    async fn test_edge_headers_skip_network_lookup() {
        let lookup = Arc::new(RecordingLookup::new(Some(GeoInfo {
            country: Some("France".to_string()),
            ..GeoInfo::default()
        })));
        let enricher = DeviceGeoEnricher::new(lookup.clone());

        let edge = EdgeGeoHeaders {
            country: Some("DE".to_string()),
            city: Some("Berlin".to_string()),
            ..EdgeGeoHeaders::default()
        };
        let result = enricher
            .enrich(Some(CHROME_LINUX), "8.8.8.8", Some(&edge))
            .await;

        assert_eq!(result.geo.country.as_deref(), Some("DE"));
        assert_eq!(result.geo.city.as_deref(), Some("Berlin"));
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_private_ip_skips_network_lookup() {
        let lookup = Arc::new(RecordingLookup::new(Some(GeoInfo::default())));
        let enricher = DeviceGeoEnricher::new(lookup.clone());

        for ip in ["192.168.1.10", "127.0.0.1", "unknown", ""] {
            let result = enricher.enrich(Some(CHROME_LINUX), ip, None).await;
            assert!(result.geo.is_empty());
        }
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_public_ip_uses_provider() {
        let lookup = Arc::new(RecordingLookup::new(Some(GeoInfo {
            country: Some("United States".to_string()),
            city: Some("Mountain View".to_string()),
            ..GeoInfo::default()
        })));
        let enricher = DeviceGeoEnricher::new(lookup.clone());

        let result = enricher.enrich(Some(CHROME_LINUX), "8.8.8.8", None).await;
        assert_eq!(result.geo.country.as_deref(), Some("United States"));
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_lookup_failure_degrades_to_empty_geo() {
        let lookup = Arc::new(RecordingLookup::new(None));
        let enricher = DeviceGeoEnricher::new(lookup);

        let result = enricher.enrich(Some(CHROME_LINUX), "8.8.8.8", None).await;
        assert!(result.geo.is_empty());
        assert!(result.device.is_some());
    }

    #[tokio::test]
    async fn test_missing_user_agent_yields_no_device() {
        let lookup = Arc::new(RecordingLookup::new(None));
        let enricher = DeviceGeoEnricher::new(lookup);

        let result = enricher.enrich(None, "", None).await;
        assert!(result.device.is_none());
    }
}
