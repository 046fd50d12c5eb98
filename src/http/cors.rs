//! CORS response headers.
//!
//! The proxy's CORS headers are authoritative: they are applied last, after
//! upstream headers have been copied, and overwrite anything already present.

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::Response,
};

use crate::config::CorsConfig;
use crate::http::request::header_value;

pub const ALLOWED_METHODS: &str = "GET,HEAD,POST,PUT,PATCH,DELETE,OPTIONS";

#[derive(Debug, Clone)]
pub struct CorsResponder {
    allow_credentials: bool,
    max_age: HeaderValue,
}

impl CorsResponder {
    pub fn new(config: &CorsConfig) -> Self {
        Self {
            allow_credentials: config.allow_credentials,
            max_age: HeaderValue::from(config.max_age_secs),
        }
    }

    /// Headers for every non-preflight response, errors included.
    pub fn apply(&self, request: &HeaderMap, response: &mut HeaderMap) {
        if self.allow_credentials {
            match header_value(request, header::ORIGIN.as_str()) {
                Some(origin) => {
                    response.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
                }
                None => {
                    response.remove(header::ACCESS_CONTROL_ALLOW_ORIGIN);
                }
            }
            response.insert(
                header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            );
            add_vary_origin(response);
        } else {
            response.insert(
                header::ACCESS_CONTROL_ALLOW_ORIGIN,
                HeaderValue::from_static("*"),
            );
        }

        response.insert(
            header::ACCESS_CONTROL_EXPOSE_HEADERS,
            HeaderValue::from_static("*"),
        );
    }

    /// Complete 204 answer to an OPTIONS request.
    pub fn preflight(&self, request: &HeaderMap) -> Response {
        let mut response = Response::new(Body::empty());
        *response.status_mut() = StatusCode::NO_CONTENT;

        let headers = response.headers_mut();
        self.apply(request, headers);
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOWED_METHODS),
        );
        if let Some(requested) =
            header_value(request, header::ACCESS_CONTROL_REQUEST_HEADERS.as_str())
        {
            headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, requested.clone());
        }
        headers.insert(header::ACCESS_CONTROL_MAX_AGE, self.max_age.clone());

        response
    }
}

fn add_vary_origin(headers: &mut HeaderMap) {
    let present = headers
        .get_all(header::VARY)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|token| {
            let token = token.trim();
            token == "*" || token.eq_ignore_ascii_case("origin")
        });
    if !present {
        headers.append(header::VARY, HeaderValue::from_static("Origin"));
    }
}
