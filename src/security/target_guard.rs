//! Target URL validation (SSRF guard).
//!
//! The host check is literal: it inspects the parsed host and never resolves
//! DNS. A hostname that resolves to a private address at fetch time (DNS
//! rebinding) passes this guard. So do literals outside the blocked list,
//! such as the IPv4-mapped `[::ffff:127.0.0.1]` and the unspecified `[::]`.

use url::{Host, Url};

use crate::error::ProxyError;

/// Parse and vet a resolved target string.
///
/// Unparseable targets fail closed as `BlockedTarget`.
pub fn validate_target(raw: &str) -> Result<Url, ProxyError> {
    let url = Url::parse(raw).map_err(|_| ProxyError::BlockedTarget)?;

    // The parser lowercases schemes.
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ProxyError::InvalidScheme(url.scheme().to_string()));
    }

    match url.host() {
        Some(host) if !is_blocked_host(&host) => Ok(url),
        _ => Err(ProxyError::BlockedTarget),
    }
}

/// Loopback, unspecified and private-range literals.
pub fn is_blocked_host(host: &Host<&str>) -> bool {
    match host {
        Host::Domain(domain) => domain.eq_ignore_ascii_case("localhost"),
        Host::Ipv4(ip) => {
            let [a, b, c, d] = ip.octets();
            matches!((a, b, c, d), (0, 0, 0, 0) | (127, 0, 0, 1))
                || a == 10
                || (a == 192 && b == 168)
                || (a == 172 && (16..=31).contains(&b))
        }
        Host::Ipv6(ip) => {
            let literal = ip.to_string();
            ip.is_loopback() || literal.starts_with("fc") || literal.starts_with("fd")
        }
    }
}
