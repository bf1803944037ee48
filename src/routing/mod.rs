//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Rule Compilation (at load):
//!     RouterConfig
//!     → pattern.rs (compile sources and destinations)
//!     → rules.rs (RouteRule per list, has/missing conditions)
//!     → resolver.rs (freeze as immutable Resolver)
//!     → shared.rs (publish snapshot via ArcSwap)
//!
//! Incoming Request (path, host, headers)
//!     → locale.rs (base path + locale prefix stripping, detection)
//!     → resolver.rs (redirects, rewrite chain, header rules)
//!     → Return: ResolverOutcome
//! ```
//!
//! # Design Decisions
//! - Rules compiled at load, immutable at runtime
//! - Deterministic: declaration order decides every tie
//! - No-match is a normal outcome (PassThrough), never an error

pub mod locale;
pub mod pattern;
pub mod resolver;
pub mod rules;
pub mod shared;

pub use locale::{LocaleResolution, LocaleSettings};
pub use pattern::{CompiledPattern, Destination, ParamValue, Params, PatternError, PatternSegment};
pub use resolver::{
    resolve_base_path, Action, RequestContext, Resolver, ResolverOutcome, RewriteLoopError,
    RewriteTarget,
};
pub use rules::{MatchResult, RouteRule, RuleKind, RuleSet};
pub use shared::SharedResolver;
