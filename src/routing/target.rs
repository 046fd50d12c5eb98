//! Target URL extraction.
//!
//! # Responsibilities
//! - Read the destination from the `url` query parameter
//! - Otherwise read it from the path segment after the mount prefix
//!
//! # Design Decisions
//! - The query form wins when both are present
//! - Path segments are percent-decoded; undecodable segments are used raw
//! - No validation here: the target guard owns scheme and host checks

use axum::http::Uri;
use percent_encoding::percent_decode_str;

pub const TARGET_QUERY_PARAM: &str = "url";

/// Extract the raw target string, or `None` when the request names no target.
pub fn resolve_target(uri: &Uri, mount_path: &str) -> Option<String> {
    query_target(uri).or_else(|| path_target(uri.path(), mount_path))
}

fn query_target(uri: &Uri) -> Option<String> {
    let query = uri.query()?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == TARGET_QUERY_PARAM)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

fn path_target(path: &str, mount_path: &str) -> Option<String> {
    let raw = path.strip_prefix(mount_path)?.strip_prefix('/')?;
    if raw.is_empty() {
        return None;
    }

    match percent_decode_str(raw).decode_utf8() {
        Ok(decoded) => Some(decoded.into_owned()),
        Err(_) => Some(raw.to_string()),
    }
}
