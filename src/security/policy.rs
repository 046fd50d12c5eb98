//! Admission policy gate.
//!
//! Checks run in a fixed order and the first failure wins:
//! origin denylist, origin allowlist, required headers, API key, rate limit.
//! Unauthorized traffic is therefore rejected before it spends rate-limit
//! budget.

use std::collections::HashSet;
use std::net::SocketAddr;

use axum::http::{header, HeaderMap};

use crate::config::PolicyConfig;
use crate::error::ProxyError;
use crate::http::request::{client_ip, header_str};
use crate::security::headers::PROXY_KEY_HEADER;
use crate::security::rate_limit::RateLimiter;

/// One step of the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyCheck {
    OriginDenylist,
    OriginAllowlist,
    RequiredHeaders,
    ApiKey,
    RateLimit,
}

impl PolicyCheck {
    pub const ORDER: [PolicyCheck; 5] = [
        PolicyCheck::OriginDenylist,
        PolicyCheck::OriginAllowlist,
        PolicyCheck::RequiredHeaders,
        PolicyCheck::ApiKey,
        PolicyCheck::RateLimit,
    ];

    /// Browsers never attach custom headers to a preflight, so only the
    /// origin checks apply to OPTIONS.
    pub fn applies_to_preflight(self) -> bool {
        matches!(self, PolicyCheck::OriginDenylist | PolicyCheck::OriginAllowlist)
    }
}

/// What the gate needs to know about an inbound request.
#[derive(Debug, Clone, Copy)]
pub struct RequestContext<'a> {
    pub headers: &'a HeaderMap,
    pub peer: Option<SocketAddr>,
}

impl<'a> RequestContext<'a> {
    pub fn new(headers: &'a HeaderMap, peer: Option<SocketAddr>) -> Self {
        Self { headers, peer }
    }

    fn origin(&self) -> String {
        header_str(self.headers, header::ORIGIN.as_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default()
    }
}

pub struct PolicyGate {
    allowlist: HashSet<String>,
    denylist: HashSet<String>,
    required_headers: Vec<String>,
    api_key: Option<String>,
    rate_limiter: Option<RateLimiter>,
}

impl PolicyGate {
    pub fn new(config: &PolicyConfig, rate_limiter: Option<RateLimiter>) -> Self {
        Self {
            allowlist: lower(&config.origin_allowlist).into_iter().collect(),
            denylist: lower(&config.origin_denylist).into_iter().collect(),
            required_headers: lower(&config.required_headers),
            api_key: config.api_key.clone().filter(|key| !key.is_empty()),
            rate_limiter,
        }
    }

    /// Run every check in order.
    pub fn admit(&self, ctx: &RequestContext<'_>) -> Result<(), ProxyError> {
        PolicyCheck::ORDER
            .iter()
            .try_for_each(|check| self.evaluate(*check, ctx))
    }

    /// Run the checks that apply to a preflight.
    pub fn admit_preflight(&self, ctx: &RequestContext<'_>) -> Result<(), ProxyError> {
        PolicyCheck::ORDER
            .iter()
            .filter(|check| check.applies_to_preflight())
            .try_for_each(|check| self.evaluate(*check, ctx))
    }

    fn evaluate(&self, check: PolicyCheck, ctx: &RequestContext<'_>) -> Result<(), ProxyError> {
        match check {
            PolicyCheck::OriginDenylist => {
                if !self.denylist.is_empty() && self.denylist.contains(&ctx.origin()) {
                    return Err(ProxyError::OriginDenied);
                }
            }
            PolicyCheck::OriginAllowlist => {
                if !self.allowlist.is_empty() && !self.allowlist.contains(&ctx.origin()) {
                    return Err(ProxyError::OriginNotAllowed);
                }
            }
            PolicyCheck::RequiredHeaders => {
                if let Some(missing) = self
                    .required_headers
                    .iter()
                    .find(|name| !ctx.headers.contains_key(name.as_str()))
                {
                    return Err(ProxyError::MissingRequiredHeader(missing.clone()));
                }
            }
            PolicyCheck::ApiKey => {
                if let Some(expected) = &self.api_key {
                    let presented = header_str(ctx.headers, PROXY_KEY_HEADER).unwrap_or_default();
                    if !constant_time_eq(presented.as_bytes(), expected.as_bytes()) {
                        return Err(ProxyError::Unauthorized);
                    }
                }
            }
            PolicyCheck::RateLimit => {
                if let Some(limiter) = &self.rate_limiter {
                    limiter.check(&client_ip(ctx.headers, ctx.peer))?;
                }
            }
        }
        Ok(())
    }
}

fn lower(items: &[String]) -> Vec<String> {
    items
        .iter()
        .map(|s| s.trim().to_ascii_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Byte equality without an early exit on the first differing byte.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |diff, (x, y)| diff | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RateLimitConfig;
    use crate::security::rate_limit::InMemoryCounterStore;
    use axum::http::{HeaderName, HeaderValue};
    use std::sync::Arc;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.append(HeaderName::from_bytes(k.as_bytes()).unwrap(), HeaderValue::from_static(v));
        }
        map
    }

    fn policy() -> PolicyConfig {
        PolicyConfig::default()
    }

    fn admit(gate: &PolicyGate, map: &HeaderMap) -> Result<(), ProxyError> {
        gate.admit(&RequestContext::new(map, None))
    }

    #[test]
    fn empty_policy_admits_everything() {
        let gate = PolicyGate::new(&policy(), None);
        assert!(admit(&gate, &HeaderMap::new()).is_ok());
    }

    #[test]
    fn denylist_wins_over_allowlist() {
        let mut config = policy();
        config.origin_allowlist = vec!["https://app.example".into()];
        config.origin_denylist = vec!["https://APP.example".into()];
        let gate = PolicyGate::new(&config, None);

        let map = headers(&[("origin", "https://app.example")]);
        assert!(matches!(admit(&gate, &map), Err(ProxyError::OriginDenied)));
    }

    #[test]
    fn allowlist_is_case_insensitive() {
        let mut config = policy();
        config.origin_allowlist = vec!["https://app.example".into()];
        let gate = PolicyGate::new(&config, None);

        assert!(admit(&gate, &headers(&[("origin", "HTTPS://App.Example")])).is_ok());
        assert!(matches!(
            admit(&gate, &headers(&[("origin", "https://other.example")])),
            Err(ProxyError::OriginNotAllowed)
        ));
        assert!(matches!(
            admit(&gate, &HeaderMap::new()),
            Err(ProxyError::OriginNotAllowed)
        ));
    }

    #[test]
    fn reports_first_missing_required_header() {
        let mut config = policy();
        config.required_headers = vec!["X-App".into(), "x-tenant".into()];
        let gate = PolicyGate::new(&config, None);

        match admit(&gate, &headers(&[("x-app", "")])) {
            Err(ProxyError::MissingRequiredHeader(name)) => assert_eq!(name, "x-tenant"),
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(admit(&gate, &headers(&[("X-APP", "1"), ("x-tenant", "t")])).is_ok());
    }

    #[test]
    fn api_key_must_match_exactly() {
        let mut config = policy();
        config.api_key = Some("s3cret".into());
        let gate = PolicyGate::new(&config, None);

        assert!(admit(&gate, &headers(&[("x-proxy-key", "s3cret")])).is_ok());
        assert!(matches!(
            admit(&gate, &headers(&[("x-proxy-key", "S3CRET")])),
            Err(ProxyError::Unauthorized)
        ));
        assert!(matches!(admit(&gate, &HeaderMap::new()), Err(ProxyError::Unauthorized)));
    }

    #[test]
    fn rejected_requests_do_not_consume_rate_budget() {
        let mut config = policy();
        config.api_key = Some("k".into());
        let limits = RateLimitConfig {
            requests_per_window: 1,
            window_secs: 60,
        };
        let limiter = RateLimiter::from_config(&limits, Arc::new(InMemoryCounterStore::new()));
        let gate = PolicyGate::new(&config, limiter);

        let unauthorized = headers(&[("x-real-ip", "1.1.1.1")]);
        for _ in 0..3 {
            assert!(matches!(admit(&gate, &unauthorized), Err(ProxyError::Unauthorized)));
        }

        let authorized = headers(&[("x-real-ip", "1.1.1.1"), ("x-proxy-key", "k")]);
        assert!(admit(&gate, &authorized).is_ok());
        assert!(matches!(admit(&gate, &authorized), Err(ProxyError::RateLimited)));
    }

    #[test]
    fn preflight_only_checks_origin() {
        let mut config = policy();
        config.api_key = Some("k".into());
        config.required_headers = vec!["x-app".into()];
        config.origin_denylist = vec!["https://evil.example".into()];
        let gate = PolicyGate::new(&config, None);

        let ok = headers(&[("origin", "https://app.example")]);
        assert!(gate.admit_preflight(&RequestContext::new(&ok, None)).is_ok());

        let denied = headers(&[("origin", "https://evil.example")]);
        assert!(matches!(
            gate.admit_preflight(&RequestContext::new(&denied, None)),
            Err(ProxyError::OriginDenied)
        ));
    }
}
