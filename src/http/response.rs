//! Response handling and transformation.
//!
//! # Responsibilities
//! - Turn redirect outcomes into `Location` responses
//! - Attach resolver headers to every response
//! - Map upstream failures to gateway status codes
//!
//! # Design Decisions
//! - Streaming responses avoid buffering entire body
//! - Hop-by-hop headers stripped automatically
//! - Resolver headers replace same-named upstream headers

use axum::body::Body;
use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::http::request::strip_hop_by_hop;

/// Redirect to `location` with `status`.
pub fn redirect(location: &str, status: u16) -> Response {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::TEMPORARY_REDIRECT);
    match HeaderValue::from_str(location) {
        Ok(value) => {
            let mut response = status.into_response();
            response.headers_mut().insert(header::LOCATION, value);
            response
        }
        Err(_) => {
            tracing::error!(location = %location, "Redirect location is not a valid header value");
            (StatusCode::INTERNAL_SERVER_ERROR, "Invalid redirect location").into_response()
        }
    }
}

/// Insert resolver headers, replacing existing values with the same name.
pub fn apply_headers(headers: &mut HeaderMap, pairs: &[(String, String)]) {
    for (key, value) in pairs {
        let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(key.as_bytes()),
            HeaderValue::from_str(value),
        ) else {
            tracing::warn!(header = %key, "Skipping invalid response header");
            continue;
        };
        headers.insert(name, value);
    }
}

/// Wrap an upstream response for the client.
pub fn from_upstream(response: hyper::Response<hyper::body::Incoming>) -> Response {
    let (mut parts, body) = response.into_parts();
    strip_hop_by_hop(&mut parts.headers);
    Response::from_parts(parts, Body::new(body))
}

pub fn bad_gateway() -> Response {
    (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
}
