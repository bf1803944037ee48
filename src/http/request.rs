//! Request handling and transformation.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) when the client sent none
//! - Build the resolver's view of a request
//! - Prepare the forwarded request for the upstream or an external origin
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Hop-by-hop headers are never forwarded
//! - The upstream sees the internal path (no base path, no locale prefix)

use std::net::SocketAddr;

use axum::body::Body;
use axum::http::header::{self, HeaderMap, HeaderValue};
use axum::http::request::Parts;
use axum::http::{Request, Uri};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

pub const X_REQUEST_ID: &str = "x-request-id";
pub const X_FORWARDED_LOCALE: &str = "x-forwarded-locale";
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
pub const X_FORWARDED_HOST: &str = "x-forwarded-host";

/// Hop-by-hop headers (RFC 9110 §7.6.1).
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Request ID source for `SetRequestIdLayer`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// The request ID header, or `"unknown"`.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
}

/// Path and query as the client sent them.
pub fn path_and_query(uri: &Uri) -> String {
    uri.path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| "/".to_string())
}

pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

/// Join a path and optional query into a request target.
pub fn request_target(path: &str, query: Option<&str>) -> String {
    match query {
        Some(q) if !q.is_empty() => format!("{path}?{q}"),
        _ => path.to_string(),
    }
}

/// Rebuild the incoming request so it targets `upstream` at `path?query`.
pub fn upstream_request(
    mut parts: Parts,
    body: Body,
    upstream: &str,
    target: &str,
    locale: Option<&str>,
    client: Option<SocketAddr>,
) -> Result<Request<Body>, axum::http::Error> {
    parts.uri = Uri::builder()
        .scheme("http")
        .authority(upstream)
        .path_and_query(target)
        .build()?;

    let original_host = parts.headers.get(header::HOST).cloned();
    strip_hop_by_hop(&mut parts.headers);
    if let Some(host) = original_host {
        parts.headers.insert(X_FORWARDED_HOST, host);
    }
    match locale.map(HeaderValue::from_str) {
        Some(Ok(value)) => {
            parts.headers.insert(X_FORWARDED_LOCALE, value);
        }
        Some(Err(_)) | None => {
            parts.headers.remove(X_FORWARDED_LOCALE);
        }
    }
    if let Some(addr) = client {
        append_forwarded_for(&mut parts.headers, addr);
    }

    Ok(Request::from_parts(parts, body))
}

fn append_forwarded_for(headers: &mut HeaderMap, addr: SocketAddr) {
    let ip = addr.ip().to_string();
    let value = match headers.get(X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(existing) => format!("{existing}, {ip}"),
        None => ip,
    };
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_request_rewrites_target_and_headers() {
        let request = Request::builder()
            .uri("/fr/blog/x?a=1")
            .header(header::HOST, "example.com")
            .header(header::CONNECTION, "keep-alive")
            .header(X_FORWARDED_FOR, "10.0.0.1")
            .body(Body::empty())
            .unwrap();
        let (parts, body) = request.into_parts();

        let forwarded = upstream_request(
            parts,
            body,
            "127.0.0.1:3000",
            &request_target("/news/x", Some("a=1")),
            Some("fr"),
            Some("192.168.1.5:5555".parse().unwrap()),
        )
        .unwrap();

        assert_eq!(forwarded.uri().to_string(), "http://127.0.0.1:3000/news/x?a=1");
        let headers = forwarded.headers();
        assert_eq!(headers[X_FORWARDED_LOCALE], "fr");
        assert_eq!(headers[X_FORWARDED_HOST], "example.com");
        assert_eq!(headers[X_FORWARDED_FOR], "10.0.0.1, 192.168.1.5");
        assert!(headers.get(header::CONNECTION).is_none());
    }

    #[test]
    fn request_ids_are_uuids() {
        let request = Request::new(());
        let id = UuidRequestId.make_request_id(&request).unwrap();
        let id = id.header_value().to_str().unwrap();
        assert!(Uuid::parse_str(id).is_ok());
    }

    #[test]
    fn target_without_query() {
        assert_eq!(request_target("/a", None), "/a");
        assert_eq!(request_target("/a", Some("")), "/a");
    }
}
