//! Client IP extraction and classification.
//!
//! The redirect path sits behind a CDN or reverse proxy in every real
//! deployment, so the forwarded headers are preferred over the socket peer:
//! `cf-connecting-ip`, then the first segment of `x-forwarded-for`, then
//! `x-real-ip`.

use std::net::IpAddr;

use actix_web::HttpRequest;
use actix_web::http::header::HeaderMap;

/// Check whether an IP is private, loopback or unspecified.
pub fn is_private_or_local(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_loopback() || v4.is_unspecified(),
        IpAddr::V6(v6) => {
            // fc00::/7 (ULA), fe80::/10 (link-local), ::1, ::
            v6.is_loopback()
                || v6.is_unspecified()
                || (v6.segments()[0] & 0xfe00) == 0xfc00
                || (v6.segments()[0] & 0xffc0) == 0xfe80
        }
    }
}

/// Whether an IP string is worth a network geolocation lookup.
///
/// Empty, sentinel, unparseable and private/loopback addresses are skipped
/// entirely so the enricher never spends a round-trip on them.
pub fn is_lookupable(ip: &str) -> bool {
    if ip.is_empty() || ip == "unknown" {
        return false;
    }
    match ip.parse::<IpAddr>() {
        Ok(addr) => !is_private_or_local(&addr),
        Err(_) => false,
    }
}

/// Extract the forwarded client IP from request headers.
pub fn extract_forwarded_ip_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get("cf-connecting-ip")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.trim().to_string())
        .or_else(|| {
            // x-forwarded-for may carry "client, proxy1, proxy2"
            headers
                .get("x-forwarded-for")
                .and_then(|h| h.to_str().ok())
                .and_then(|s| s.split(',').next())
                .map(|s| s.trim().to_string())
        })
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|h| h.to_str().ok())
                .map(String::from)
        })
}

/// Best-effort client IP: forwarded headers first, socket peer as fallback.
pub fn extract_client_ip(req: &HttpRequest) -> String {
    extract_forwarded_ip_from_headers(req.headers())
        .or_else(|| req.peer_addr().map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

/// First tag of an Accept-Language header, e.g. "en-US,en;q=0.9" -> "en-US".
pub fn primary_language(headers: &HeaderMap) -> Option<String> {
    headers
        .get("accept-language")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn test_is_private_or_local_ipv4() {
        assert!(is_private_or_local(&"10.0.0.1".parse().unwrap()));
        assert!(is_private_or_local(&"172.16.0.1".parse().unwrap()));
        assert!(is_private_or_local(&"192.168.1.1".parse().unwrap()));
        assert!(is_private_or_local(&"127.0.0.1".parse().unwrap()));
        assert!(!is_private_or_local(&"8.8.8.8".parse().unwrap()));
        assert!(!is_private_or_local(&"1.1.1.1".parse().unwrap()));
    }

    #[test]
    fn test_is_private_or_local_ipv6() {
        assert!(is_private_or_local(&"::1".parse().unwrap()));
        assert!(is_private_or_local(&"fd00::1".parse().unwrap()));
        assert!(is_private_or_local(&"fc00::1".parse().unwrap()));
        assert!(is_private_or_local(&"fe80::1".parse().unwrap()));
        assert!(!is_private_or_local(
            &"2001:4860:4860::8888".parse().unwrap()
        ));
    }

    #[test]
    fn test_is_lookupable() {
        assert!(is_lookupable("8.8.8.8"));
        assert!(is_lookupable("2001:4860:4860::8888"));
        assert!(!is_lookupable(""));
        assert!(!is_lookupable("unknown"));
        assert!(!is_lookupable("127.0.0.1"));
        assert!(!is_lookupable("192.168.1.50"));
        assert!(!is_lookupable("0.0.0.0"));
        assert!(!is_lookupable("not-an-ip"));
    }

    #[test]
    fn test_forwarded_ip_priority() {
        let req = TestRequest::default()
            .insert_header(("cf-connecting-ip", "203.0.113.7"))
            .insert_header(("x-forwarded-for", "198.51.100.1, 10.0.0.1"))
            .to_http_request();
        assert_eq!(
            extract_forwarded_ip_from_headers(req.headers()),
            Some("203.0.113.7".to_string())
        );
    }

    #[test]
    fn test_forwarded_ip_first_xff_segment() {
        let req = TestRequest::default()
            .insert_header(("x-forwarded-for", "198.51.100.1, 10.0.0.1, 10.0.0.2"))
            .to_http_request();
        assert_eq!(
            extract_forwarded_ip_from_headers(req.headers()),
            Some("198.51.100.1".to_string())
        );
    }

    #[test]
    fn test_primary_language() {
        let req = TestRequest::default()
            .insert_header(("accept-language", "en-US,en;q=0.9,de;q=0.5"))
            .to_http_request();
        assert_eq!(primary_language(req.headers()), Some("en-US".to_string()));

        let req = TestRequest::default().to_http_request();
        assert_eq!(primary_language(req.headers()), None);
    }
}
