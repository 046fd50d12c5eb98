//! Environment variable overlay.
//!
//! Variables override whatever the config file (or the defaults) set. Empty
//! values are treated as unset.

use crate::config::loader::ConfigError;
use crate::config::schema::ProxyConfig;

pub const ORIGIN_ALLOWLIST: &str = "ORIGIN_ALLOWLIST";
pub const ORIGIN_DENYLIST: &str = "ORIGIN_DENYLIST";
pub const REQUIRE_HEADER: &str = "REQUIRE_HEADER";
pub const API_KEY: &str = "API_KEY";
pub const CORS_MAX_AGE: &str = "CORS_MAX_AGE";
pub const ENABLE_CREDENTIALS: &str = "ENABLE_CREDENTIALS";
pub const RATE_LIMIT: &str = "RATE_LIMIT";
pub const RATE_LIMIT_WINDOW_SECS: &str = "RATE_LIMIT_WINDOW_SECS";
pub const BIND_ADDRESS: &str = "BIND_ADDRESS";
pub const PROXY_MOUNT_PATH: &str = "PROXY_MOUNT_PATH";
pub const UPSTREAM_CONNECT_TIMEOUT_SECS: &str = "UPSTREAM_CONNECT_TIMEOUT_SECS";
pub const UPSTREAM_TIMEOUT_SECS: &str = "UPSTREAM_TIMEOUT_SECS";
pub const MAX_BODY_BYTES: &str = "MAX_BODY_BYTES";
pub const LOG_LEVEL: &str = "LOG_LEVEL";
pub const METRICS_ADDRESS: &str = "METRICS_ADDRESS";

impl ProxyConfig {
    /// Overlay values from the process environment.
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_vars(std::env::vars())
    }

    /// Overlay values from an arbitrary set of `(name, value)` pairs.
    pub fn apply_vars<I>(mut self, vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (name, value) in vars {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }

            match name.as_str() {
                ORIGIN_ALLOWLIST => self.policy.origin_allowlist = split_csv(value),
                ORIGIN_DENYLIST => self.policy.origin_denylist = split_csv(value),
                REQUIRE_HEADER => self.policy.required_headers = split_csv(value),
                API_KEY => self.policy.api_key = Some(value.to_string()),
                CORS_MAX_AGE => self.cors.max_age_secs = parse_number(&name, value)?,
                ENABLE_CREDENTIALS => self.cors.allow_credentials = parse_bool(&name, value)?,
                RATE_LIMIT => self.rate_limit.requests_per_window = parse_number(&name, value)?,
                RATE_LIMIT_WINDOW_SECS => self.rate_limit.window_secs = parse_number(&name, value)?,
                BIND_ADDRESS => self.listener.bind_address = value.to_string(),
                PROXY_MOUNT_PATH => self.listener.mount_path = value.to_string(),
                UPSTREAM_CONNECT_TIMEOUT_SECS => {
                    self.timeouts.connect_secs = parse_number(&name, value)?
                }
                UPSTREAM_TIMEOUT_SECS => self.timeouts.request_secs = parse_number(&name, value)?,
                MAX_BODY_BYTES => self.security.max_body_size = parse_number(&name, value)?,
                LOG_LEVEL => self.observability.log_level = value.to_string(),
                METRICS_ADDRESS => self.observability.metrics_address = Some(value.to_string()),
                _ => {}
            }
        }

        Ok(self)
    }
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::Env {
        name: name.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Env {
            name: name.to_string(),
            value: value.to_string(),
        }),
    }
}
