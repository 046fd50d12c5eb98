//! Request-level error definitions.
//!
//! Every rejection the pipeline can produce is a `ProxyError`. Each variant is
//! terminal: it maps to a status code and a JSON body of the form
//! `{"error": "<message>"}`. CORS headers are attached by the caller after the
//! response is built so error bodies stay readable from the browser.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// Errors surfaced to the client by the proxy pipeline.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// No target URL in the query or the path.
    #[error("Missing target URL")]
    MissingTarget,

    /// Target scheme is not http or https.
    #[error("Invalid target scheme: {0}")]
    InvalidScheme(String),

    /// Target failed to parse or points at a private/loopback host.
    #[error("Target host is not allowed")]
    BlockedTarget,

    /// Origin is on the denylist.
    #[error("Origin denied")]
    OriginDenied,

    /// Allowlist is configured and the origin is not on it.
    #[error("Origin not allowed")]
    OriginNotAllowed,

    /// A configured required header is absent.
    #[error("Missing required header: {0}")]
    MissingRequiredHeader(String),

    /// API key missing or mismatched.
    #[error("Unauthorized")]
    Unauthorized,

    /// Per-IP quota exceeded for the current window.
    #[error("Too many requests")]
    RateLimited,

    /// Inbound body exceeds the configured buffer limit.
    #[error("Request body exceeds {0} bytes")]
    PayloadTooLarge(usize),

    /// Inbound body could not be read.
    #[error("Failed to read request body: {0}")]
    BadRequestBody(String),

    /// The outbound call to the target could not complete.
    #[error("Upstream request failed: {0}")]
    UpstreamFailure(String),

    /// Path is not served by the proxy.
    #[error("Not found")]
    NotFound,

    /// Path exists but does not accept this method.
    #[error("Method not allowed")]
    MethodNotAllowed,
}

impl ProxyError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::MissingTarget
            | ProxyError::InvalidScheme(_)
            | ProxyError::MissingRequiredHeader(_)
            | ProxyError::BadRequestBody(_) => StatusCode::BAD_REQUEST,
            ProxyError::BlockedTarget
            | ProxyError::OriginDenied
            | ProxyError::OriginNotAllowed => StatusCode::FORBIDDEN,
            ProxyError::Unauthorized => StatusCode::UNAUTHORIZED,
            ProxyError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ProxyError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ProxyError::UpstreamFailure(_) => StatusCode::BAD_GATEWAY,
            ProxyError::NotFound => StatusCode::NOT_FOUND,
            ProxyError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
        }
    }

    /// Short label used for metrics and logs.
    pub fn reason(&self) -> &'static str {
        match self {
            ProxyError::MissingTarget => "missing_target",
            ProxyError::InvalidScheme(_) => "invalid_scheme",
            ProxyError::BlockedTarget => "blocked_target",
            ProxyError::OriginDenied => "origin_denied",
            ProxyError::OriginNotAllowed => "origin_not_allowed",
            ProxyError::MissingRequiredHeader(_) => "missing_required_header",
            ProxyError::Unauthorized => "unauthorized",
            ProxyError::RateLimited => "rate_limited",
            ProxyError::PayloadTooLarge(_) => "payload_too_large",
            ProxyError::BadRequestBody(_) => "bad_request_body",
            ProxyError::UpstreamFailure(_) => "upstream_failure",
            ProxyError::NotFound => "not_found",
            ProxyError::MethodNotAllowed => "method_not_allowed",
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.to_string() });
        (self.status(), Json(body)).into_response()
    }
}
