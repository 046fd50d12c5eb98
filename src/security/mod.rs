//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → policy.rs (origin deny/allow, required headers, API key)
//!     → rate_limit.rs (per-IP fixed window)
//!     → target_guard.rs (scheme and blocked-host checks)
//!     → headers.rs (scrub hop-by-hop and proxy-only headers)
//!     → Pass to forwarder
//! ```
//!
//! # Design Decisions
//! - Fail closed: the first failing check decides the response
//! - Target checks look at the literal host only; no DNS lookups

pub mod headers;
pub mod policy;
pub mod rate_limit;
pub mod target_guard;
