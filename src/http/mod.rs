//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, pipeline)
//!     → request.rs (header reads, client IP)
//!     → [routing resolves target, security admits it]
//!     → forward.rs (upstream call, streamed relay)
//!     → cors.rs (CORS headers on every response)
//!     → Send to client
//! ```

pub mod cors;
pub mod forward;
pub mod request;
pub mod server;

pub use request::X_REQUEST_ID;
pub use server::{HttpServer, ServerError};
