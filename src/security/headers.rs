//! Header scrubbing for forwarded requests and relayed responses.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers in both directions
//! - Strip headers named in the `Connection` header
//! - Strip transport headers the outbound client recomputes
//! - Drop upstream `access-control-*` so the proxy's CORS headers win
//!
//! # Design Decisions
//! - Cookies only cross the proxy when credentials mode is enabled
//! - The proxy's own `x-proxy-key` never reaches the target

use axum::http::{header, HeaderMap, HeaderName};

/// Connection-scoped headers removed in both directions.
pub const HOP_BY_HOP: &[&str] = &[
    "connection",
    "proxy-connection",
    "keep-alive",
    "transfer-encoding",
    "upgrade",
    "te",
    "trailer",
    "proxy-authorization",
    "proxy-authenticate",
];

/// Request headers the outbound transport sets itself.
const RECOMPUTED: &[&str] = &["host", "content-length", "accept-encoding"];

pub const PROXY_KEY_HEADER: &str = "x-proxy-key";

/// Prepare inbound headers for the outbound call.
pub fn scrub_request_headers(mut headers: HeaderMap, forward_cookies: bool) -> HeaderMap {
    strip_hop_by_hop(&mut headers);

    for name in RECOMPUTED {
        headers.remove(*name);
    }
    headers.remove(PROXY_KEY_HEADER);

    if !forward_cookies {
        headers.remove(header::COOKIE);
    }

    headers
}

/// Prepare upstream headers for relay to the client.
pub fn scrub_response_headers(mut headers: HeaderMap, forward_cookies: bool) -> HeaderMap {
    strip_hop_by_hop(&mut headers);

    let cors: Vec<HeaderName> = headers
        .keys()
        .filter(|name| name.as_str().starts_with("access-control-"))
        .cloned()
        .collect();
    for name in cors {
        headers.remove(name);
    }

    if !forward_cookies {
        headers.remove(header::SET_COOKIE);
    }

    headers
}

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    // Read the Connection tokens before the header itself goes.
    for name in connection_tokens(headers) {
        headers.remove(name.as_str());
    }
    for name in HOP_BY_HOP {
        headers.remove(*name);
    }
}

/// Header names listed in `Connection`, lowercased.
fn connection_tokens(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(|token| token.trim().to_ascii_lowercase())
        .filter(|token| !token.is_empty())
        .collect()
}
