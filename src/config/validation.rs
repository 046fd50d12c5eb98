//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, window > 0)
//! - Check header names and addresses parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use axum::http::HeaderName;
use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::http::server::HEALTH_PATH;
use crate::security::rate_limit::MAX_WINDOW_SECS;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("bind address {0:?} is not a socket address")]
    BindAddress(String),

    #[error("mount path {0:?} must start with '/' and must not end with '/'")]
    MountPath(String),

    #[error("mount path {0:?} is reserved")]
    ReservedMountPath(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("{field} must be at most {max}")]
    TooLarge { field: &'static str, max: u64 },

    #[error("required header {0:?} is not a valid header name")]
    HeaderName(String),

    #[error("metrics address {0:?} is not a socket address")]
    MetricsAddress(String),
}

pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }

    let mount = &config.listener.mount_path;
    if !mount.starts_with('/') || mount.ends_with('/') {
        errors.push(ValidationError::MountPath(mount.clone()));
    } else if mount == HEALTH_PATH {
        errors.push(ValidationError::ReservedMountPath(mount.clone()));
    }

    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::Zero("timeouts.connect_secs"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::Zero("timeouts.request_secs"));
    }
    if config.rate_limit.enabled() && config.rate_limit.window_secs == 0 {
        errors.push(ValidationError::Zero("rate_limit.window_secs"));
    }
    if config.rate_limit.enabled() && config.rate_limit.window_secs > MAX_WINDOW_SECS {
        errors.push(ValidationError::TooLarge {
            field: "rate_limit.window_secs",
            max: MAX_WINDOW_SECS,
        });
    }
    if config.security.max_body_size == 0 {
        errors.push(ValidationError::Zero("security.max_body_size"));
    }

    for name in &config.policy.required_headers {
        if HeaderName::from_bytes(name.to_ascii_lowercase().as_bytes()).is_err() {
            errors.push(ValidationError::HeaderName(name.clone()));
        }
    }

    if let Some(addr) = &config.observability.metrics_address {
        if addr.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::MetricsAddress(addr.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
