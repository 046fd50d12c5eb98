//! HTTP server setup and the per-request pipeline.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, request ID)
//! - Run each request through resolver → policy gate → target guard →
//!   CORS → forwarder
//! - Attach CORS headers to every response, errors included
//! - Spawn rate-limit eviction alongside the server

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{request::Parts, HeaderMap, Method, Request},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::http::cors::CorsResponder;
use crate::http::forward::{client_builder, Forwarder};
use crate::http::request::{client_ip, header_str, MakeRequestUuidV4, X_REQUEST_ID};
use crate::lifecycle::ShutdownListener;
use crate::observability::metrics;
use crate::routing::resolve_target;
use crate::security::policy::{PolicyGate, RequestContext};
use crate::security::rate_limit::{run_eviction, CounterStore, InMemoryCounterStore, RateLimiter};
use crate::security::target_guard::validate_target;

/// Liveness endpoint. Reserved: the mount path may not take it.
pub const HEALTH_PATH: &str = "/health";

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to build upstream client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything a request needs, shared across handlers.
pub struct ProxyState {
    mount_path: String,
    gate: PolicyGate,
    cors: CorsResponder,
    forwarder: Forwarder,
}

/// HTTP server for the CORS proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
    counters: Arc<dyn CounterStore>,
}

impl HttpServer {
    /// Create a server with the default upstream client and in-memory counters.
    pub fn new(config: ProxyConfig) -> Result<Self, ServerError> {
        let client = client_builder(&config.timeouts).build()?;
        Ok(Self::with_client(config, client))
    }

    /// Create a server around a caller-built client. Build it from
    /// [`client_builder`] so redirects stay unfollowed.
    pub fn with_client(config: ProxyConfig, client: reqwest::Client) -> Self {
        Self::with_components(config, client, Arc::new(InMemoryCounterStore::new()))
    }

    /// Create a server with an external counter store.
    pub fn with_components(
        config: ProxyConfig,
        client: reqwest::Client,
        counters: Arc<dyn CounterStore>,
    ) -> Self {
        let rate_limiter = RateLimiter::from_config(&config.rate_limit, counters.clone());

        let state = Arc::new(ProxyState {
            mount_path: config.listener.mount_path.clone(),
            gate: PolicyGate::new(&config.policy, rate_limiter),
            cors: CorsResponder::new(&config.cors),
            forwarder: Forwarder::new(client, &config.security, &config.cors),
        });

        let router = Self::build_router(&config, state);
        Self {
            router,
            config,
            counters,
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &ProxyConfig, state: Arc<ProxyState>) -> Router {
        let mount = config.listener.mount_path.as_str();

        Router::new()
            .route(
                HEALTH_PATH,
                get(health_handler)
                    .options(proxy_handler)
                    .fallback(method_not_allowed_handler),
            )
            .route(mount, any(proxy_handler))
            // The catch-all below never matches an empty tail.
            .route(&format!("{mount}/"), any(proxy_handler))
            .route(&format!("{mount}/{{*target}}"), any(proxy_handler))
            .fallback(fallback_handler)
            .with_state(state)
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuidV4))
            .layer(TraceLayer::new_for_http())
    }

    /// The configured router, for embedding or in-process tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: ShutdownListener,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            mount = %self.config.listener.mount_path,
            "HTTP server starting"
        );

        if self.config.rate_limit.enabled() {
            let window = Duration::from_secs(self.config.rate_limit.window_secs);
            tokio::spawn(run_eviction(self.counters.clone(), window, shutdown.resubscribe()));
        }

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.recv().await })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }
}

impl ProxyState {
    async fn handle(&self, request: Request<Body>) -> Response {
        let start = Instant::now();
        let (parts, body) = request.into_parts();
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        let response = match self.process(&parts, body, peer).await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(
                    request_id = %header_str(&parts.headers, X_REQUEST_ID.as_str()).unwrap_or("unknown"),
                    method = %parts.method,
                    path = %parts.uri.path(),
                    client_ip = %client_ip(&parts.headers, peer),
                    reason = err.reason(),
                    error = %err,
                    "Request rejected"
                );
                metrics::record_rejection(err.reason());
                err.into_response()
            }
        };

        let response = self.finish(&parts.headers, response);
        metrics::record_request(parts.method.as_str(), response.status().as_u16(), start);
        response
    }

    async fn process(
        &self,
        parts: &Parts,
        body: Body,
        peer: Option<SocketAddr>,
    ) -> Result<Response, ProxyError> {
        let ctx = RequestContext::new(&parts.headers, peer);

        // Preflight ends here: no target, no forwarding.
        if parts.method == Method::OPTIONS {
            self.gate.admit_preflight(&ctx)?;
            return Ok(self.cors.preflight(&parts.headers));
        }

        // 1. Resolve target
        let target =
            resolve_target(&parts.uri, &self.mount_path).ok_or(ProxyError::MissingTarget)?;

        // 2. Policy gate
        self.gate.admit(&ctx)?;

        // 3. Target guard
        let target = validate_target(&target)?;

        tracing::debug!(
            request_id = %header_str(&parts.headers, X_REQUEST_ID.as_str()).unwrap_or("unknown"),
            method = %parts.method,
            host = target.host_str().unwrap_or_default(),
            client_ip = %client_ip(&parts.headers, peer),
            "Forwarding request"
        );

        // 4. Forward; CORS is applied by the caller
        self.forwarder.forward(target, parts, body).await
    }

    fn finish(&self, request: &HeaderMap, mut response: Response) -> Response {
        self.cors.apply(request, response.headers_mut());
        response
    }
}

async fn proxy_handler(State(state): State<Arc<ProxyState>>, request: Request<Body>) -> Response {
    state.handle(request).await
}

/// Preflights on any path; everything else outside the mount is a 404.
async fn fallback_handler(
    State(state): State<Arc<ProxyState>>,
    request: Request<Body>,
) -> Response {
    if request.method() == Method::OPTIONS {
        return state.handle(request).await;
    }
    state.finish(request.headers(), ProxyError::NotFound.into_response())
}

async fn method_not_allowed_handler(
    State(state): State<Arc<ProxyState>>,
    request: Request<Body>,
) -> Response {
    state.finish(request.headers(), ProxyError::MethodNotAllowed.into_response())
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
