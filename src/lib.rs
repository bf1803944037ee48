//! Route configuration resolver.
//!
//! Compiles a declarative routing configuration (base path, locales,
//! rewrites, redirects, header rules) into an immutable [`Resolver`] and
//! evaluates requests against it. The [`EdgeServer`] applies outcomes in
//! front of an upstream application server.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;

pub use config::schema::RouterConfig;
pub use http::EdgeServer;
pub use lifecycle::Shutdown;
pub use routing::{Action, RequestContext, Resolver, ResolverOutcome, SharedResolver};
