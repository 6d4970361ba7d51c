//! HTTP surface: the redirect endpoint and the link management API.
//!
//! The redirect handler is the latency-critical path. It consults the
//! resolver, fires a click notification into the pipeline and answers with a
//! 307; it never waits for analytics. Unresolvable codes redirect to the
//! configured home page; the visitor never sees an error page for a bad
//! code. Authentication is an external collaborator: the gateway in front of
//! this service injects `x-user-id` for authenticated requests.

use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};

use crate::analytics::{AggregationEngine, ClickPayload, ClickPipeline, EdgeGeoHeaders};
use crate::config::LinkConfig;
use crate::errors::SnaplinkError;
use crate::services::link_service::{CreateLinkRequest, LinkService};
use crate::services::resolver::Resolver;
use crate::storages::{LinkUpdate, ShortLink};
use crate::utils::ip::{extract_client_ip, primary_language};

// =========================================================================
// Redirect endpoint
// =========================================================================

pub struct RedirectService;

impl RedirectService {
    pub async fn home(config: web::Data<LinkConfig>) -> HttpResponse {
        Self::redirect_to(&config.home_url)
    }

    pub async fn handle_redirect(
        req: HttpRequest,
        path: web::Path<String>,
        resolver: web::Data<Arc<Resolver>>,
        pipeline: web::Data<ClickPipeline>,
        config: web::Data<LinkConfig>,
    ) -> HttpResponse {
        let code = path.into_inner();
        if code.is_empty() {
            return Self::redirect_to(&config.home_url);
        }

        match resolver.resolve(&code).await {
            Ok(Some(snapshot)) => {
                pipeline.notify(Self::click_payload(&req, &code));
                Self::redirect_to(&snapshot.original_url)
            }
            Ok(None) => {
                debug!("Unresolvable code {}, redirecting home", code);
                Self::redirect_to(&config.home_url)
            }
            Err(e) => {
                // The one failure a redirect cannot absorb: no store, no target.
                error!("Resolution failed for {}: {}", code, e);
                HttpResponse::build(StatusCode::BAD_GATEWAY)
                    .insert_header(("Content-Type", "text/plain; charset=utf-8"))
                    .body("Service temporarily unavailable")
            }
        }
    }

    /// Snapshot everything the pipeline needs from the request; the request
    /// itself is gone by the time a worker picks the click up.
    fn click_payload(req: &HttpRequest, code: &str) -> ClickPayload {
        let headers = req.headers();
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|h| h.to_str().ok())
                .map(String::from)
        };

        ClickPayload {
            code: code.to_string(),
            ip: Some(extract_client_ip(req)),
            user_agent: header("user-agent"),
            referer: header("referer"),
            language: primary_language(headers),
            edge_geo: Some(EdgeGeoHeaders::from_headers(headers)),
        }
    }

    fn redirect_to(location: &str) -> HttpResponse {
        HttpResponse::build(StatusCode::TEMPORARY_REDIRECT)
            .insert_header(("Location", location))
            .finish()
    }
}

// =========================================================================
// Link management API
// =========================================================================

#[derive(Debug, Deserialize)]
pub struct CreateLinkBody {
    pub url: String,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateLinkBody {
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub original_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
}

#[derive(Serialize)]
pub struct LinkResponse {
    pub id: String,
    pub code: String,
    pub original_url: String,
    pub is_active: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ShortLink> for LinkResponse {
    fn from(link: ShortLink) -> Self {
        Self {
            id: link.id,
            code: link.code,
            original_url: link.original_url,
            is_active: link.is_active,
            expires_at: link.expires_at,
            created_at: link.created_at,
            updated_at: link.updated_at,
        }
    }
}

#[derive(Serialize)]
struct ApiEnvelope<T: Serialize> {
    status: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
}

fn success<T: Serialize>(status: StatusCode, message: &str, data: T) -> HttpResponse {
    HttpResponse::build(status).json(ApiEnvelope {
        status: "success",
        message: message.to_string(),
        data: Some(data),
    })
}

fn failure(err: &SnaplinkError) -> HttpResponse {
    let status = match err {
        SnaplinkError::NotFound(_) => StatusCode::NOT_FOUND,
        SnaplinkError::Validation(_) => StatusCode::BAD_REQUEST,
        SnaplinkError::DuplicateCode(_) => StatusCode::CONFLICT,
        SnaplinkError::GenerationExhausted(_) => StatusCode::SERVICE_UNAVAILABLE,
        SnaplinkError::StoreUnavailable(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    HttpResponse::build(status).json(ApiEnvelope::<()> {
        status: "error",
        message: err.message().to_string(),
        data: None,
    })
}

fn owner_id(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get("x-user-id")
        .and_then(|h| h.to_str().ok())
        .map(String::from)
}

pub struct LinkApi;

impl LinkApi {
    pub async fn create_link(
        req: HttpRequest,
        body: web::Json<CreateLinkBody>,
        links: web::Data<Arc<LinkService>>,
    ) -> HttpResponse {
        let body = body.into_inner();
        let request = CreateLinkRequest {
            original_url: body.url,
            owner_id: owner_id(&req),
            client_ip: Some(extract_client_ip(&req)),
            expires_at: body.expires_at,
        };

        match links.create(request).await {
            Ok(link) => success(
                StatusCode::CREATED,
                "Short link created successfully",
                LinkResponse::from(link),
            ),
            Err(e) => failure(&e),
        }
    }

    pub async fn update_link(
        path: web::Path<String>,
        body: web::Json<UpdateLinkBody>,
        links: web::Data<Arc<LinkService>>,
    ) -> HttpResponse {
        let body = body.into_inner();
        let changes = LinkUpdate {
            is_active: body.is_active,
            original_url: body.original_url,
            ..Default::default()
        };

        match links.update(&path.into_inner(), changes).await {
            Ok(link) => success(
                StatusCode::OK,
                "Link updated successfully",
                LinkResponse::from(link),
            ),
            Err(e) => failure(&e),
        }
    }

    pub async fn delete_link(
        path: web::Path<String>,
        links: web::Data<Arc<LinkService>>,
    ) -> HttpResponse {
        match links.delete(&path.into_inner()).await {
            Ok(()) => success(StatusCode::OK, "Link deleted successfully", ()),
            Err(e) => failure(&e),
        }
    }

    pub async fn link_stats(
        path: web::Path<String>,
        query: web::Query<StatsQuery>,
        links: web::Data<Arc<LinkService>>,
        stats: web::Data<Arc<AggregationEngine>>,
    ) -> HttpResponse {
        let id = path.into_inner();

        let link = match links.find_by_id(&id).await {
            Ok(Some(link)) => link,
            Ok(None) => {
                return failure(&SnaplinkError::not_found(format!("Link not found: {}", id)));
            }
            Err(e) => return failure(&e),
        };

        let end = match query.end.as_deref() {
            Some(raw) => match parse_date_param(raw, true) {
                Some(dt) => dt,
                None => {
                    return failure(&SnaplinkError::validation(format!(
                        "Invalid end date: {}",
                        raw
                    )));
                }
            },
            None => Utc::now(),
        };
        // Default window: trailing 7 days.
        let start = match query.start.as_deref() {
            Some(raw) => match parse_date_param(raw, false) {
                Some(dt) => dt,
                None => {
                    return failure(&SnaplinkError::validation(format!(
                        "Invalid start date: {}",
                        raw
                    )));
                }
            },
            None => end - Duration::days(7),
        };

        match stats.stats(&link.id, start, end).await {
            Ok(stats) => success(StatusCode::OK, "Link stats fetched successfully", stats),
            Err(e) => failure(&e),
        }
    }
}

/// Accepts RFC 3339 timestamps or bare `YYYY-MM-DD` dates. Bare dates snap
/// to the start or end of the day depending on which bound they are.
fn parse_date_param(raw: &str, end_of_day: bool) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    let time = if end_of_day {
        date.and_hms_opt(23, 59, 59)?
    } else {
        date.and_hms_opt(0, 0, 0)?
    };
    Some(Utc.from_utc_datetime(&time))
}

// =========================================================================
// Route registration
// =========================================================================

pub fn api_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/links", web::post().to(LinkApi::create_link))
            .route("/links/{id}", web::patch().to(LinkApi::update_link))
            .route("/links/{id}", web::delete().to(LinkApi::delete_link))
            .route("/links/{id}/stats", web::get().to(LinkApi::link_stats)),
    );
}

pub fn redirect_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(RedirectService::home))
        .route("/{code}", web::get().to(RedirectService::handle_redirect))
        .route("/{code}", web::head().to(RedirectService::handle_redirect));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_param_bare_date() {
        let start = parse_date_param("2024-01-01", false).unwrap();
        assert_eq!(start.to_rfc3339(), "2024-01-01T00:00:00+00:00");

        let end = parse_date_param("2024-01-03", true).unwrap();
        assert_eq!(end.to_rfc3339(), "2024-01-03T23:59:59+00:00");
    }

    #[test]
    fn test_parse_date_param_rfc3339() {
        let dt = parse_date_param("2024-01-01T12:30:00Z", false).unwrap();
        assert_eq!(dt.to_rfc3339(), "2024-01-01T12:30:00+00:00");
    }

    #[test]
    fn test_parse_date_param_garbage() {
        assert!(parse_date_param("yesterday", false).is_none());
        assert!(parse_date_param("01/02/2024", false).is_none());
    }
}
