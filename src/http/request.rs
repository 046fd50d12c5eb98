//! Request inspection helpers.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) for tracing
//! - Read headers with last-value-wins semantics
//! - Derive the client IP used as the rate-limit key
//!
//! # Design Decisions
//! - `HeaderMap` already normalizes names, so lookups are case-insensitive
//! - Forwarding headers are trusted as sent; the proxy is expected to sit
//!   behind a hosting layer that sets them

use std::net::SocketAddr;

use axum::http::{HeaderMap, HeaderName, HeaderValue, Request};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");
pub const X_REAL_IP: &str = "x-real-ip";
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Key used when no client address can be derived.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Generates `x-request-id` values for requests that arrive without one.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuidV4;

impl MakeRequestId for MakeRequestUuidV4 {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Last value for `name`, if any.
pub fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a HeaderValue> {
    headers.get_all(name).iter().last()
}

/// Last value for `name` as a string, if it is visible ASCII.
pub fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    header_value(headers, name).and_then(|v| v.to_str().ok())
}

/// Client IP precedence: `x-real-ip`, first `x-forwarded-for` entry, peer
/// address, then [`UNKNOWN_CLIENT`].
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    if let Some(ip) = header_str(headers, X_REAL_IP).map(str::trim).filter(|ip| !ip.is_empty()) {
        return ip.to_string();
    }

    let forwarded = header_str(headers, X_FORWARDED_FOR)
        .and_then(|list| list.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());
    if let Some(ip) = forwarded {
        return ip.to_string();
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.append(HeaderName::from_bytes(k.as_bytes()).unwrap(), HeaderValue::from_static(v));
        }
        map
    }

    #[test]
    fn last_value_wins() {
        let map = headers(&[("X-Key", "first"), ("x-key", "second")]);
        assert_eq!(header_str(&map, "x-key"), Some("second"));
        assert_eq!(header_str(&map, "X-KEY"), Some("second"));
        assert_eq!(header_str(&map, "missing"), None);
    }

    #[test]
    fn client_ip_precedence() {
        let peer: SocketAddr = "203.0.113.9:4000".parse().unwrap();

        let map = headers(&[("x-real-ip", "198.51.100.1"), ("x-forwarded-for", "192.0.2.1")]);
        assert_eq!(client_ip(&map, Some(peer)), "198.51.100.1");

        let map = headers(&[("x-forwarded-for", " 192.0.2.1 , 10.0.0.1")]);
        assert_eq!(client_ip(&map, Some(peer)), "192.0.2.1");

        assert_eq!(client_ip(&HeaderMap::new(), Some(peer)), "203.0.113.9");
        assert_eq!(client_ip(&HeaderMap::new(), None), UNKNOWN_CLIENT);
    }

    #[test]
    fn blank_forwarding_headers_fall_through() {
        let map = headers(&[("x-real-ip", " "), ("x-forwarded-for", "")]);
        assert_eq!(client_ip(&map, None), UNKNOWN_CLIENT);
    }

    #[test]
    fn generates_request_ids() {
        let request = Request::new(());
        let id = MakeRequestUuidV4.make_request_id(&request).unwrap();
        let value = id.header_value().to_str().unwrap();
        assert!(Uuid::parse_str(value).is_ok());
    }
}
