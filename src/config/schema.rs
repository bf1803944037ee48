//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the resolver
//! and the edge server. All types derive Serde traits for deserialization
//! from TOML files.

use serde::{Deserialize, Serialize};

/// Default bound on the number of rewrites applied to one request.
pub const DEFAULT_MAX_REWRITE_DEPTH: usize = 10;

/// Default name of the cookie carrying a locale override.
pub const DEFAULT_LOCALE_COOKIE: &str = "locale";

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Edge server settings (bind address, upstream).
    pub server: ServerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Prefix under which the whole application is served ("" disables it).
    pub base_path: String,

    /// Maximum number of rewrites applied while resolving one request.
    pub max_rewrite_depth: usize,

    /// Page routes known to the application. A rewrite chain stops as soon
    /// as the current path matches one of them.
    pub pages: Vec<String>,

    /// Internationalized routing.
    pub i18n: Option<I18nConfig>,

    /// Rewrite rules, either a plain list or split into phases.
    pub rewrites: RewritesConfig,

    /// Redirect rules, first match wins.
    pub redirects: Vec<RedirectConfig>,

    /// Header rules, all matches accumulate.
    pub headers: Vec<HeaderRuleConfig>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            observability: ObservabilityConfig::default(),
            base_path: String::new(),
            max_rewrite_depth: DEFAULT_MAX_REWRITE_DEPTH,
            pages: Vec::new(),
            i18n: None,
            rewrites: RewritesConfig::default(),
            redirects: Vec::new(),
            headers: Vec::new(),
        }
    }
}

/// Edge server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Application server receiving rewritten and pass-through requests.
    pub upstream: String,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            upstream: "127.0.0.1:3000".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` takes precedence.
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Internationalized routing configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct I18nConfig {
    /// Every supported locale tag.
    pub locales: Vec<String>,

    /// Locale used when nothing else applies. Never prefixed in paths.
    pub default_locale: String,

    /// Redirect to the preferred locale when it differs from the URL's.
    #[serde(default = "default_true")]
    pub locale_detection: bool,

    /// Cookie whose value overrides every other locale source.
    #[serde(default = "default_locale_cookie")]
    pub locale_cookie: String,

    /// Domain-based locale routing.
    #[serde(default)]
    pub domains: Vec<DomainConfig>,
}

/// A domain serving a default locale (and optionally more).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DomainConfig {
    /// Host name without port (e.g., "example.fr").
    pub domain: String,

    /// Locale served at the domain root.
    pub default_locale: String,

    /// Further locales served under a path prefix on this domain.
    #[serde(default)]
    pub locales: Vec<String>,

    /// Use plain http when redirecting to this domain.
    #[serde(default)]
    pub http: bool,
}

/// Rewrite rules: a plain list is treated as `after_files`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum RewritesConfig {
    List(Vec<RewriteConfig>),
    Phased(PhasedRewrites),
}

impl Default for RewritesConfig {
    fn default() -> Self {
        RewritesConfig::List(Vec::new())
    }
}

impl RewritesConfig {
    /// Returns (before_files, after_files, fallback).
    pub fn phases(&self) -> (&[RewriteConfig], &[RewriteConfig], &[RewriteConfig]) {
        match self {
            RewritesConfig::List(list) => (&[], list.as_slice(), &[]),
            RewritesConfig::Phased(p) => (
                p.before_files.as_slice(),
                p.after_files.as_slice(),
                p.fallback.as_slice(),
            ),
        }
    }

    pub fn is_empty(&self) -> bool {
        let (before, after, fallback) = self.phases();
        before.is_empty() && after.is_empty() && fallback.is_empty()
    }
}

/// Rewrites split by when they run relative to page matching.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PhasedRewrites {
    /// Checked before page routes.
    pub before_files: Vec<RewriteConfig>,
    /// Checked after page routes.
    pub after_files: Vec<RewriteConfig>,
    /// Checked last.
    pub fallback: Vec<RewriteConfig>,
}

/// A rewrite rule.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RewriteConfig {
    pub source: String,
    pub destination: String,
    #[serde(default = "default_true")]
    pub base_path: bool,
    #[serde(default = "default_true")]
    pub locale: bool,
    #[serde(default)]
    pub has: Vec<ConditionConfig>,
    #[serde(default)]
    pub missing: Vec<ConditionConfig>,
}

/// A redirect rule.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RedirectConfig {
    pub source: String,
    pub destination: String,
    /// 308 when true, 307 otherwise.
    #[serde(default)]
    pub permanent: bool,
    /// Explicit status code, exclusive with `permanent`.
    #[serde(default)]
    pub status_code: Option<u16>,
    #[serde(default = "default_true")]
    pub base_path: bool,
    #[serde(default = "default_true")]
    pub locale: bool,
    #[serde(default)]
    pub has: Vec<ConditionConfig>,
    #[serde(default)]
    pub missing: Vec<ConditionConfig>,
}

/// A header rule.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HeaderRuleConfig {
    pub source: String,
    pub headers: Vec<HeaderPair>,
    #[serde(default = "default_true")]
    pub base_path: bool,
    #[serde(default = "default_true")]
    pub locale: bool,
    #[serde(default)]
    pub has: Vec<ConditionConfig>,
    #[serde(default)]
    pub missing: Vec<ConditionConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct HeaderPair {
    pub key: String,
    pub value: String,
}

/// Which part of the request a condition inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionType {
    Header,
    Cookie,
    Query,
    Host,
}

/// A `has` / `missing` condition.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConditionConfig {
    #[serde(rename = "type")]
    pub kind: ConditionType,
    /// Header, cookie or query parameter name. Unused for `host`.
    #[serde(default)]
    pub key: String,
    /// Regex the whole value must match; for `host`, the expected host.
    #[serde(default)]
    pub value: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_locale_cookie() -> String {
    DEFAULT_LOCALE_COOKIE.to_string()
}
