//! Target resolution subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request URI
//!     → target.rs (query parameter, then mount-path segment)
//!     → raw target string
//!     → security::target_guard (parse, scheme and host checks)
//! ```

pub mod target;

pub use target::resolve_target;
