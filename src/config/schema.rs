//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the CORS proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, mount path).
    pub listener: ListenerConfig,

    /// Admission policy (origins, required headers, API key).
    pub policy: PolicyConfig,

    /// CORS response settings.
    pub cors: CorsConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Upstream timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request body limits.
    pub security: SecurityConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Path prefix the proxy is mounted under. No trailing slash.
    pub mount_path: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            mount_path: "/api/proxy".to_string(),
        }
    }
}

/// Origin and credential admission policy.
///
/// Origin entries and header names are compared lowercase; the gate
/// normalizes them when it is built.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct PolicyConfig {
    /// Origins allowed to use the proxy. Empty allows any origin.
    pub origin_allowlist: Vec<String>,

    /// Origins always rejected. Checked before the allowlist.
    pub origin_denylist: Vec<String>,

    /// Header names every request must carry.
    pub required_headers: Vec<String>,

    /// Shared secret expected in `x-proxy-key`.
    pub api_key: Option<String>,
}

/// CORS response configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// `Access-Control-Max-Age` for preflight responses, in seconds.
    pub max_age_secs: u64,

    /// Echo the request origin and allow credentials (cookies pass through).
    pub allow_credentials: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            max_age_secs: 600,
            allow_credentials: false,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Maximum requests per client IP per window. 0 disables limiting.
    pub requests_per_window: u64,

    /// Window length in seconds.
    pub window_secs: u64,
}

impl RateLimitConfig {
    pub fn enabled(&self) -> bool {
        self.requests_per_window > 0
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_window: 0,
            window_secs: 60,
        }
    }
}

/// Timeout configuration for upstream calls.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Total upstream request timeout in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
        }
    }
}

/// Request body limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Maximum inbound body size buffered for forwarding, in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_body_size: 10 * 1024 * 1024, // 10MB
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Prometheus exporter bind address. Unset disables the exporter.
    pub metrics_address: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_address: None,
        }
    }
}
