//! Upstream forwarding.
//!
//! # Responsibilities
//! - Relay method, scrubbed headers and body to the target
//! - Relay status, scrubbed headers and a streamed body back
//! - Map transport failures to 502
//!
//! # Design Decisions
//! - Redirects are never followed; the client sees the 3xx and `Location`
//! - Every outbound call has connect and total deadlines
//! - No retries: the caller decides whether to try again
//! - Dropping the handler future drops the in-flight upstream request

use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    http::{request::Parts, Method},
    response::Response,
};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use url::Url;

use crate::config::{CorsConfig, SecurityConfig, TimeoutConfig};
use crate::error::ProxyError;
use crate::observability::metrics;
use crate::security::headers::{scrub_request_headers, scrub_response_headers};

/// Outbound client settings every forwarding client must carry.
pub fn client_builder(timeouts: &TimeoutConfig) -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .connect_timeout(Duration::from_secs(timeouts.connect_secs))
        .timeout(Duration::from_secs(timeouts.request_secs))
}

#[derive(Debug, Clone)]
pub struct Forwarder {
    client: reqwest::Client,
    max_body_size: usize,
    forward_cookies: bool,
}

impl Forwarder {
    pub fn new(client: reqwest::Client, security: &SecurityConfig, cors: &CorsConfig) -> Self {
        Self {
            client,
            max_body_size: security.max_body_size,
            forward_cookies: cors.allow_credentials,
        }
    }

    pub async fn forward(
        &self,
        target: Url,
        parts: &Parts,
        body: Body,
    ) -> Result<Response, ProxyError> {
        let method = parts.method.clone();
        let headers = scrub_request_headers(parts.headers.clone(), self.forward_cookies);

        let mut outbound = self.client.request(method.clone(), target.clone()).headers(headers);
        if method != Method::GET && method != Method::HEAD {
            outbound = outbound.body(self.read_body(body).await?);
        }

        let upstream = outbound.send().await.map_err(|e| {
            let message = describe(&e);
            tracing::error!(url = %target, error = %message, "Upstream error");
            metrics::record_upstream_error();
            ProxyError::UpstreamFailure(message)
        })?;

        let status = upstream.status();
        tracing::debug!(url = %target, status = %status, "Upstream responded");

        let headers = scrub_response_headers(upstream.headers().clone(), self.forward_cookies);
        let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
        *response.status_mut() = status;
        *response.headers_mut() = headers;

        Ok(response)
    }

    async fn read_body(&self, body: Body) -> Result<Bytes, ProxyError> {
        match Limited::new(body, self.max_body_size).collect().await {
            Ok(collected) => Ok(collected.to_bytes()),
            Err(e) if e.is::<LengthLimitError>() => {
                Err(ProxyError::PayloadTooLarge(self.max_body_size))
            }
            Err(e) => Err(ProxyError::BadRequestBody(e.to_string())),
        }
    }
}

/// Full error chain, e.g. "error sending request: client error (Connect): tcp connect error".
fn describe(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn forwarder(max_body_size: usize) -> Forwarder {
        let client = client_builder(&TimeoutConfig::default())
            .no_proxy()
            .build()
            .unwrap();
        Forwarder::new(
            client,
            &SecurityConfig { max_body_size },
            &CorsConfig::default(),
        )
    }

    #[tokio::test]
    async fn buffers_bodies_within_limit() {
        let bytes = forwarder(16).read_body(Body::from("hello")).await.unwrap();
        assert_eq!(&bytes[..], b"hello");
    }

    #[tokio::test]
    async fn rejects_oversized_bodies() {
        let err = forwarder(4).read_body(Body::from("too large")).await.unwrap_err();
        assert!(matches!(err, ProxyError::PayloadTooLarge(4)));
    }

    #[tokio::test]
    async fn unreachable_target_is_upstream_failure() {
        // Bind then drop a listener so the port is very likely closed.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let (parts, body) = Request::get("/").body(Body::empty()).unwrap().into_parts();
        let target = Url::parse(&format!("http://{addr}/")).unwrap();

        let err = forwarder(1024).forward(target, &parts, body).await.unwrap_err();
        assert!(matches!(err, ProxyError::UpstreamFailure(ref m) if !m.is_empty()));
    }
}
