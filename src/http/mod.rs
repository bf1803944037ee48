//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing, timeout)
//!     → request.rs (resolver view of the request)
//!     → [routing::SharedResolver evaluates]
//!     → redirect: response.rs (Location)
//!       rewrite / pass-through: request.rs (upstream request) → upstream
//!       external rewrite: reqwest → external origin
//!     → response.rs (resolver headers)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{UuidRequestId, X_FORWARDED_LOCALE, X_REQUEST_ID};
pub use server::{EdgeServer, ServerError};
