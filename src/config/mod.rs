//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks, rule compilation)
//!     → RouterConfig (validated, immutable)
//!     → compiled into a Resolver snapshot
//!
//! On change (file event or SIGHUP):
//!     watcher.rs / lifecycle::signals detects it
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → SharedResolver swaps in the new snapshot
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    I18nConfig, ObservabilityConfig, RedirectConfig, RewriteConfig, RewritesConfig, RouterConfig,
    ServerConfig,
};
pub use validation::ValidationError;
pub use watcher::ConfigWatcher;
