//! Request resolution against the compiled rules.
//!
//! # Responsibilities
//! - Strip the base path and the locale prefix
//! - Find the first matching redirect
//! - Follow the rewrite chain (bounded by `max_rewrite_depth`)
//! - Accumulate header rules
//!
//! # Design Decisions
//! - Pure and synchronous: no I/O, no shared mutable state
//! - Redirect > Rewrite > PassThrough; headers apply to every outcome
//! - A page match stops the rewrite chain after `before_files`
//! - Rewrite loops are recovered as PassThrough with a diagnostic

use axum::http::{header, HeaderMap};
use serde::Serialize;
use thiserror::Error;

use crate::config::loader::ConfigError;
use crate::config::schema::RouterConfig;
use crate::config::validation::validate_config;
use crate::observability::metrics;
use crate::routing::locale::{strip_port, LocaleResolution, LocaleSettings};
use crate::routing::pattern::split_query;
use crate::routing::rules::{interpolate, MatchResult, RouteRule, RuleKind, RuleSet};

/// The parts of an HTTP request the resolver looks at.
#[derive(Debug, Clone, Copy)]
pub struct RequestContext<'a> {
    /// Path including any query string.
    pub path: &'a str,
    /// `Host` header value, possibly with a port.
    pub host: Option<&'a str>,
    pub headers: &'a HeaderMap,
}

impl<'a> RequestContext<'a> {
    /// Build a context taking the host from the `Host` header.
    pub fn new(path: &'a str, headers: &'a HeaderMap) -> Self {
        let host = headers.get(header::HOST).and_then(|v| v.to_str().ok());
        Self {
            path,
            host,
            headers,
        }
    }

    /// Fall back to the request URI authority when no `Host` header was sent,
    /// as with HTTP/2 requests.
    pub fn or_authority(mut self, authority: Option<&'a str>) -> Self {
        if self.host.is_none() {
            self.host = authority;
        }
        self
    }

    pub fn header(&self, name: &str) -> Option<&'a str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Host name without port.
    pub fn host(&self) -> Option<&'a str> {
        self.host.map(strip_port)
    }
}

/// The rewrite chain did not settle within the configured depth.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("rewrite chain for `{path}` exceeded {limit} rewrites (last rule {last_rule})")]
pub struct RewriteLoopError {
    pub path: String,
    pub limit: usize,
    pub last_rule: String,
}

/// Where a rewrite sends the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RewriteTarget {
    /// An application path, without base path or locale prefix.
    Internal {
        path: String,
        query: Option<String>,
        locale: Option<String>,
    },
    /// An absolute URL on another origin.
    External { url: String },
}

/// Terminal action for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Rewrite {
        target: RewriteTarget,
        /// Label of the last rule applied.
        rule: String,
        /// Number of rewrites applied.
        hops: usize,
    },
    Redirect {
        location: String,
        status: u16,
        permanent: bool,
        rule: String,
    },
    /// No rewrite or redirect applies; serve `path` as a normal page.
    PassThrough {
        path: String,
        query: Option<String>,
        locale: Option<String>,
    },
}

impl Action {
    pub fn kind(&self) -> &'static str {
        match self {
            Action::Rewrite {
                target: RewriteTarget::External { .. },
                ..
            } => "external_rewrite",
            Action::Rewrite { .. } => "rewrite",
            Action::Redirect { .. } => "redirect",
            Action::PassThrough { .. } => "pass_through",
        }
    }
}

/// Everything the caller needs to answer a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolverOutcome {
    pub action: Action,
    /// Headers to attach to the response, in first-seen key order.
    pub headers: Vec<(String, String)>,
    /// Locale resolution, when i18n is configured and the path is inside the base path.
    pub locale: Option<LocaleResolution>,
    /// Recovered per-request problems (e.g. rewrite loops).
    pub diagnostics: Vec<String>,
}

/// Strip `base_path` from `path`.
///
/// Returns `None` when the path lies outside the base path, unless the rule
/// opted out of base path handling.
pub fn resolve_base_path<'p>(path: &'p str, base_path: &str, opted_out: bool) -> Option<&'p str> {
    if opted_out || base_path.is_empty() {
        return Some(path);
    }
    match path.strip_prefix(base_path) {
        Some("") => Some("/"),
        Some(rest) if rest.starts_with('/') => Some(rest),
        _ => None,
    }
}

/// A request path as seen by the different kinds of rules.
#[derive(Debug, Clone)]
struct PathView {
    /// Full visible path (base path and locale prefix included).
    raw: String,
    /// Path with base path and locale prefix removed; `None` outside the base path.
    localized: Option<String>,
    locale: Option<String>,
}

/// Immutable resolver over one configuration snapshot.
#[derive(Debug, Clone)]
pub struct Resolver {
    base_path: String,
    max_rewrite_depth: usize,
    locales: Option<LocaleSettings>,
    rules: RuleSet,
}

impl Resolver {
    /// Validate and compile a configuration.
    pub fn from_config(config: &RouterConfig) -> Result<Self, ConfigError> {
        let rules = validate_config(config).map_err(ConfigError::Validation)?;
        Ok(Self {
            base_path: config.base_path.clone(),
            max_rewrite_depth: config.max_rewrite_depth,
            locales: config.i18n.as_ref().map(LocaleSettings::from_config),
            rules,
        })
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Resolve one request.
    pub fn evaluate(&self, req: &RequestContext<'_>) -> ResolverOutcome {
        let (path, query) = split_query(req.path);
        let (view, locale) = self.initial_view(path, req);
        let headers = self.collect_headers(&view, req);
        let mut diagnostics = Vec::new();

        let redirect = self
            .find_redirect(&view, req)
            .and_then(|found| self.redirect_action(&found, &view, req));
        let action = match redirect {
            Some(action) => action,
            None => match self.rewrite_chain(&view, req, query) {
                Ok(Some(action)) => action,
                Ok(None) => self.pass_through(&view, query),
                Err(e) => {
                    tracing::warn!(
                        path = %e.path,
                        limit = e.limit,
                        rule = %e.last_rule,
                        "Rewrite loop detected, serving request unmodified"
                    );
                    metrics::record_rewrite_loop();
                    diagnostics.push(e.to_string());
                    self.pass_through(&view, query)
                }
            },
        };

        metrics::record_evaluation(action.kind());
        ResolverOutcome {
            action,
            headers,
            locale,
            diagnostics,
        }
    }

    /// Resolve the locale for a path (base path included).
    pub fn resolve_locale(&self, path: &str, req: &RequestContext<'_>) -> Option<LocaleResolution> {
        let locales = self.locales.as_ref()?;
        let in_base = resolve_base_path(path, &self.base_path, false)?;
        let cookie = req.header("cookie").and_then(|c| locales.cookie_value(c));
        Some(locales.resolve(
            in_base,
            req.host,
            req.header("accept-language"),
            cookie,
            &self.base_path,
        ))
    }

    /// First redirect matching the request, with its expanded destination.
    pub fn match_redirect<'r>(&'r self, req: &RequestContext<'_>) -> Option<MatchResult<'r>> {
        let (path, _) = split_query(req.path);
        let (view, _) = self.initial_view(path, req);
        self.find_redirect(&view, req)
    }

    /// Follow the rewrite chain for the request.
    pub fn resolve_rewrites(&self, req: &RequestContext<'_>) -> Result<Option<Action>, RewriteLoopError> {
        let (path, query) = split_query(req.path);
        let (view, _) = self.initial_view(path, req);
        self.rewrite_chain(&view, req, query)
    }

    fn initial_view(&self, path: &str, req: &RequestContext<'_>) -> (PathView, Option<LocaleResolution>) {
        let Some(in_base) = resolve_base_path(path, &self.base_path, false) else {
            let view = PathView {
                raw: path.to_string(),
                localized: None,
                locale: None,
            };
            return (view, None);
        };

        let resolution = self.resolve_locale(path, req);
        let view = PathView {
            raw: path.to_string(),
            localized: Some(
                resolution
                    .as_ref()
                    .map(|r| r.stripped_path.clone())
                    .unwrap_or_else(|| in_base.to_string()),
            ),
            locale: resolution.as_ref().map(|r| r.locale.clone()),
        };
        (view, resolution)
    }

    /// The path a rule's source is matched against.
    fn rule_path(&self, rule: &RouteRule, view: &PathView) -> Option<String> {
        if !rule.base_path {
            return Some(view.raw.clone());
        }
        let localized = view.localized.as_ref()?;
        match (&view.locale, rule.locale) {
            (Some(locale), false) => Some(LocaleSettings::qualify(locale, localized)),
            _ => Some(localized.clone()),
        }
    }

    fn first_match<'r>(
        &self,
        rules: &'r [RouteRule],
        view: &PathView,
        req: &RequestContext<'_>,
    ) -> Option<MatchResult<'r>> {
        rules.iter().find_map(|rule| {
            let path = self.rule_path(rule, view)?;
            let params = rule.matches(&path, req)?;
            Some(MatchResult {
                rule,
                params,
                destination: None,
            })
        })
    }

    fn find_redirect<'r>(&'r self, view: &PathView, req: &RequestContext<'_>) -> Option<MatchResult<'r>> {
        let (_, query) = split_query(req.path);
        let mut found = self.first_match(&self.rules.redirects, view, req)?;
        found.destination = found
            .rule
            .destination()
            .map(|d| d.expand_with_query(&found.params, query));
        Some(found)
    }

    /// Locale that carries no path prefix for this request's host.
    fn root_locale(&self, req: &RequestContext<'_>) -> Option<&str> {
        self.locales.as_ref().map(|l| l.root_locale(req.host))
    }

    fn redirect_action(
        &self,
        found: &MatchResult<'_>,
        view: &PathView,
        req: &RequestContext<'_>,
    ) -> Option<Action> {
        let RuleKind::Redirect {
            destination,
            status,
            permanent,
        } = &found.rule.kind
        else {
            return None;
        };
        let expanded = found.destination.clone().unwrap_or_default();

        let location = if destination.is_external() {
            expanded
        } else {
            let mut location = String::new();
            if found.rule.base_path {
                location.push_str(&self.base_path);
            }
            let (path, query) = split_query(&expanded);
            let locale_prefix = match (self.root_locale(req), &view.locale) {
                (Some(root), Some(locale)) if found.rule.locale && locale != root => {
                    Some(locale.as_str())
                }
                _ => None,
            };
            let path = match locale_prefix {
                Some(locale) => LocaleSettings::qualify(locale, path),
                None => path.to_string(),
            };
            if path != "/" || location.is_empty() {
                location.push_str(&path);
            }
            if let Some(query) = query {
                location.push('?');
                location.push_str(query);
            }
            location
        };

        Some(Action::Redirect {
            location,
            status: *status,
            permanent: *permanent,
            rule: found.rule.label(),
        })
    }

    fn is_page(&self, view: &PathView) -> bool {
        view.localized
            .as_deref()
            .is_some_and(|p| self.rules.pages.iter().any(|page| page.match_path(p).is_some()))
    }

    fn next_rewrite<'r>(&'r self, view: &PathView, req: &RequestContext<'_>) -> Option<MatchResult<'r>> {
        if let Some(found) = self.first_match(&self.rules.before_files, view, req) {
            return Some(found);
        }
        if self.is_page(view) {
            return None;
        }
        self.first_match(&self.rules.after_files, view, req)
            .or_else(|| self.first_match(&self.rules.fallback, view, req))
    }

    fn rewrite_chain(
        &self,
        view: &PathView,
        req: &RequestContext<'_>,
        query: Option<&str>,
    ) -> Result<Option<Action>, RewriteLoopError> {
        let mut view = view.clone();
        let mut query = query.map(str::to_string);
        let mut hops = 0;
        let mut last_rule: Option<String> = None;

        while let Some(found) = self.next_rewrite(&view, req) {
            hops += 1;
            if hops > self.max_rewrite_depth {
                return Err(RewriteLoopError {
                    path: req.path.to_string(),
                    limit: self.max_rewrite_depth,
                    last_rule: found.rule.label(),
                });
            }
            let Some(destination) = found.rule.destination() else {
                break;
            };
            let expanded = destination.expand_with_query(&found.params, query.as_deref());
            tracing::debug!(rule = %found.rule.label(), destination = %expanded, "Rewrite applied");

            if destination.is_external() {
                return Ok(Some(Action::Rewrite {
                    target: RewriteTarget::External { url: expanded },
                    rule: found.rule.label(),
                    hops,
                }));
            }

            let (path, next_query) = split_query(&expanded);
            view = self.view_after_rewrite(found.rule, path, &view, req);
            query = next_query.map(str::to_string);
            last_rule = Some(found.rule.label());
        }

        Ok(last_rule.map(|rule| Action::Rewrite {
            target: RewriteTarget::Internal {
                path: view.localized.clone().unwrap_or_else(|| view.raw.clone()),
                query,
                locale: view.locale.clone(),
            },
            rule,
            hops,
        }))
    }

    /// Interpret a rewritten path in the rule's own coordinate space.
    fn view_after_rewrite(
        &self,
        rule: &RouteRule,
        path: &str,
        previous: &PathView,
        req: &RequestContext<'_>,
    ) -> PathView {
        let root_locale = self.root_locale(req);
        let visible = |localized: &str, locale: Option<&str>| {
            let qualified = match locale.filter(|l| Some(*l) != root_locale) {
                Some(locale) => LocaleSettings::qualify(locale, localized),
                None => localized.to_string(),
            };
            if self.base_path.is_empty() {
                qualified
            } else if qualified == "/" {
                self.base_path.clone()
            } else {
                format!("{}{}", self.base_path, qualified)
            }
        };

        match (rule.base_path, rule.locale, &self.locales) {
            (true, true, _) | (true, false, None) => PathView {
                raw: visible(path, previous.locale.as_deref()),
                localized: Some(path.to_string()),
                locale: previous.locale.clone(),
            },
            (true, false, Some(settings)) => {
                let (locale, stripped) = settings.split_path_locale(path);
                let locale = locale.map(str::to_string).or_else(|| previous.locale.clone());
                PathView {
                    raw: visible(&stripped, locale.as_deref()),
                    localized: Some(stripped),
                    locale,
                }
            }
            (false, _, _) => match resolve_base_path(path, &self.base_path, false) {
                Some(in_base) => {
                    let (locale, stripped) = match &self.locales {
                        Some(settings) => {
                            let (locale, stripped) = settings.split_path_locale(in_base);
                            (
                                locale.map(str::to_string).or_else(|| previous.locale.clone()),
                                stripped,
                            )
                        }
                        None => (None, in_base.to_string()),
                    };
                    PathView {
                        raw: path.to_string(),
                        localized: Some(stripped),
                        locale,
                    }
                }
                None => PathView {
                    raw: path.to_string(),
                    localized: None,
                    locale: None,
                },
            },
        }
    }

    fn pass_through(&self, view: &PathView, query: Option<&str>) -> Action {
        Action::PassThrough {
            path: view.localized.clone().unwrap_or_else(|| view.raw.clone()),
            query: query.map(str::to_string),
            locale: view.locale.clone(),
        }
    }

    fn collect_headers(&self, view: &PathView, req: &RequestContext<'_>) -> Vec<(String, String)> {
        let mut merged: Vec<(String, String)> = Vec::new();
        for rule in &self.rules.headers {
            let Some(path) = self.rule_path(rule, view) else {
                continue;
            };
            let Some(params) = rule.matches(&path, req) else {
                continue;
            };
            let RuleKind::Header { headers } = &rule.kind else {
                continue;
            };
            for pair in headers {
                let value = interpolate(&pair.value, &params);
                match merged.iter_mut().find(|(k, _)| k.eq_ignore_ascii_case(&pair.key)) {
                    Some(slot) => slot.1 = value,
                    None => merged.push((pair.key.clone(), value)),
                }
            }
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::loader::parse_config;

    fn resolver(toml: &str) -> Resolver {
        Resolver::from_config(&parse_config(toml).unwrap()).unwrap()
    }

    fn eval(resolver: &Resolver, path: &str) -> ResolverOutcome {
        let headers = HeaderMap::new();
        resolver.evaluate(&RequestContext::new(path, &headers))
    }

    fn internal(outcome: &ResolverOutcome) -> (&str, Option<&str>) {
        match &outcome.action {
            Action::Rewrite {
                target: RewriteTarget::Internal { path, query, .. },
                ..
            } => (path.as_str(), query.as_deref()),
            other => panic!("expected internal rewrite, got {other:?}"),
        }
    }

    #[test]
    fn base_path_stripping() {
        assert_eq!(resolve_base_path("/docs/a", "/docs", false), Some("/a"));
        assert_eq!(resolve_base_path("/docs", "/docs", false), Some("/"));
        assert_eq!(resolve_base_path("/docsx", "/docs", false), None);
        assert_eq!(resolve_base_path("/other", "/docs", true), Some("/other"));
        assert_eq!(resolve_base_path("/a", "", false), Some("/a"));
    }

    #[test]
    fn header_rules_accumulate_last_wins() {
        let r = resolver(
            r#"
[[headers]]
source = "/:path*"
headers = [{ key = "x-hello", value = "there" }, { key = "x-frame-options", value = "DENY" }]

[[headers]]
source = "/hello"
headers = [{ key = "X-Hello", value = "world" }]
"#,
        );
        let outcome = eval(&r, "/hello");
        assert_eq!(
            outcome.headers,
            vec![
                ("x-hello".to_string(), "world".to_string()),
                ("x-frame-options".to_string(), "DENY".to_string()),
            ]
        );
        let outcome = eval(&r, "/other");
        assert_eq!(outcome.headers[0].1, "there");
    }

    #[test]
    fn header_values_interpolate_params() {
        let r = resolver(
            r#"
[[headers]]
source = "/blog/:slug"
headers = [{ key = "x-slug", value = "post-:slug" }]
"#,
        );
        assert_eq!(eval(&r, "/blog/intro").headers[0].1, "post-intro");
    }

    #[test]
    fn redirect_wins_over_rewrite() {
        let r = resolver(
            r#"
[[rewrites]]
source = "/old"
destination = "/internal"

[[redirects]]
source = "/old"
destination = "/new"
permanent = true
"#,
        );
        let outcome = eval(&r, "/old?x=1");
        assert_eq!(
            outcome.action,
            Action::Redirect {
                location: "/new?x=1".into(),
                status: 308,
                permanent: true,
                rule: "redirects[0]".into(),
            }
        );
    }

    #[test]
    fn first_redirect_wins() {
        let r = resolver(
            r#"
[[redirects]]
source = "/a/:x"
destination = "/first/:x"
status_code = 301

[[redirects]]
source = "/a/:x"
destination = "/second/:x"
"#,
        );
        match eval(&r, "/a/1").action {
            Action::Redirect {
                location, status, permanent, ..
            } => {
                assert_eq!(location, "/first/1");
                assert_eq!(status, 301);
                assert!(permanent);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn rewrite_round_trip() {
        let r = resolver(
            r#"
[[rewrites]]
source = "/blog/:slug"
destination = "/news/:slug"
"#,
        );
        let outcome = eval(&r, "/blog/x");
        assert_eq!(internal(&outcome), ("/news/x", None));
        assert_eq!(
            eval(&r, "/about").action,
            Action::PassThrough {
                path: "/about".into(),
                query: None,
                locale: None,
            }
        );
    }

    #[test]
    fn rewrite_chain_follows_until_settled() {
        let r = resolver(
            r#"
[[rewrites]]
source = "/b/:x"
destination = "/c/:x"

[[rewrites]]
source = "/a/:x"
destination = "/b/:x"
"#,
        );
        let outcome = eval(&r, "/a/1?q=2");
        assert_eq!(internal(&outcome), ("/c/1", Some("q=2")));
        assert!(matches!(outcome.action, Action::Rewrite { hops: 2, .. }));
    }

    #[test]
    fn page_match_short_circuits_chain() {
        let r = resolver(
            r#"
pages = ["/b/:x"]

[[rewrites]]
source = "/b/:x"
destination = "/c/:x"

[[rewrites]]
source = "/a/:x"
destination = "/b/:x"
"#,
        );
        assert_eq!(internal(&eval(&r, "/a/1")), ("/b/1", None));
        assert!(matches!(eval(&r, "/b/1").action, Action::PassThrough { .. }));
    }

    #[test]
    fn before_files_run_before_pages() {
        let r = resolver(
            r#"
pages = ["/about"]

[rewrites]
before_files = [{ source = "/about", destination = "/about-v2" }]
after_files = [{ source = "/about-v2", destination = "/about-v3" }]
fallback = [{ source = "/legacy/:path*", destination = "https://legacy.example.com/:path*" }]
"#,
        );
        // about-v2 is not a page, so after_files applies next.
        assert_eq!(internal(&eval(&r, "/about")), ("/about-v3", None));
        match eval(&r, "/legacy/x/y").action {
            Action::Rewrite {
                target: RewriteTarget::External { url },
                ..
            } => assert_eq!(url, "https://legacy.example.com/x/y"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn rewrite_loop_recovers_to_pass_through() {
        let r = resolver(
            r#"
max_rewrite_depth = 4

[[rewrites]]
source = "/a"
destination = "/b"

[[rewrites]]
source = "/b"
destination = "/a"
"#,
        );
        let headers = HeaderMap::new();
        let err = r
            .resolve_rewrites(&RequestContext::new("/a", &headers))
            .unwrap_err();
        assert_eq!(err.limit, 4);

        let outcome = eval(&r, "/a");
        assert!(matches!(outcome.action, Action::PassThrough { ref path, .. } if path == "/a"));
        assert_eq!(outcome.diagnostics.len(), 1);
    }

    #[test]
    fn acyclic_chains_stay_within_depth() {
        let r = resolver(
            r#"
max_rewrite_depth = 3

[[rewrites]]
source = "/three"
destination = "/four"

[[rewrites]]
source = "/two"
destination = "/three"

[[rewrites]]
source = "/one"
destination = "/two"
"#,
        );
        let outcome = eval(&r, "/one");
        assert_eq!(internal(&outcome), ("/four", None));
        assert!(outcome.diagnostics.is_empty());
    }

    #[test]
    fn base_path_applies_to_rules_and_redirects() {
        let r = resolver(
            r#"
base_path = "/docs"

[[rewrites]]
source = "/guide"
destination = "/guide-v2"

[[redirects]]
source = "/old"
destination = "/new"

[[redirects]]
source = "/legacy"
destination = "/docs/new"
base_path = false
"#,
        );
        assert_eq!(internal(&eval(&r, "/docs/guide")), ("/guide-v2", None));
        assert!(matches!(eval(&r, "/guide").action, Action::PassThrough { .. }));
        assert!(matches!(
            eval(&r, "/docs/old").action,
            Action::Redirect { ref location, .. } if location == "/docs/new"
        ));
        assert!(matches!(
            eval(&r, "/legacy").action,
            Action::Redirect { ref location, status: 307, .. } if location == "/docs/new"
        ));
    }

    const I18N: &str = r#"
[i18n]
locales = ["en-US", "fr", "nl-NL"]
default_locale = "en-US"
locale_detection = false
"#;

    #[test]
    fn locale_prefix_is_stripped_before_matching() {
        let r = resolver(&format!(
            "{I18N}
[[rewrites]]
source = \"/blog/:slug\"
destination = \"/news/:slug\"
"
        ));
        let outcome = eval(&r, "/fr/blog/x");
        match &outcome.action {
            Action::Rewrite {
                target: RewriteTarget::Internal { path, locale, .. },
                ..
            } => {
                assert_eq!(path, "/news/x");
                assert_eq!(locale.as_deref(), Some("fr"));
            }
            other => panic!("unexpected {other:?}"),
        }
        let locale = outcome.locale.unwrap();
        assert_eq!(locale.locale, "fr");
        assert_eq!(locale.stripped_path, "/blog/x");

        let outcome = eval(&r, "/blog/x");
        assert_eq!(outcome.locale.unwrap().locale, "en-US");
    }

    #[test]
    fn locale_aware_redirects_keep_locale() {
        let r = resolver(&format!(
            "{I18N}
[[redirects]]
source = \"/old\"
destination = \"/new\"

[[redirects]]
source = \"/nl-NL/oud\"
destination = \"/nl-NL/nieuw\"
locale = false
"
        ));
        assert!(matches!(
            eval(&r, "/fr/old").action,
            Action::Redirect { ref location, .. } if location == "/fr/new"
        ));
        assert!(matches!(
            eval(&r, "/old").action,
            Action::Redirect { ref location, .. } if location == "/new"
        ));
        assert!(matches!(
            eval(&r, "/nl-NL/oud").action,
            Action::Redirect { ref location, .. } if location == "/nl-NL/nieuw"
        ));
    }

    #[test]
    fn locale_false_rewrite_sees_qualified_path() {
        let r = resolver(&format!(
            "{I18N}
[[rewrites]]
source = \"/en-US/promo\"
destination = \"/fr/promo\"
locale = false
"
        ));
        match eval(&r, "/promo").action {
            Action::Rewrite {
                target: RewriteTarget::Internal { path, locale, .. },
                ..
            } => {
                assert_eq!(path, "/promo");
                assert_eq!(locale.as_deref(), Some("fr"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    const DOMAINS: &str = r#"
[i18n]
locales = ["en-US", "fr"]
default_locale = "en-US"
locale_detection = false

[[i18n.domains]]
domain = "example.fr"
default_locale = "fr"

[[redirects]]
source = "/old"
destination = "/new"
"#;

    fn eval_on(resolver: &Resolver, host: &str, path: &str) -> ResolverOutcome {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, host.parse().unwrap());
        resolver.evaluate(&RequestContext::new(path, &headers))
    }

    #[test]
    fn domain_default_locale_redirects_without_prefix() {
        let r = resolver(DOMAINS);
        assert!(matches!(
            eval_on(&r, "example.fr", "/old").action,
            Action::Redirect { ref location, .. } if location == "/new"
        ));
        assert!(matches!(
            eval_on(&r, "example.fr", "/en-US/old").action,
            Action::Redirect { ref location, .. } if location == "/en-US/new"
        ));
        assert!(matches!(
            eval_on(&r, "example.com", "/fr/old").action,
            Action::Redirect { ref location, .. } if location == "/fr/new"
        ));
    }

    #[test]
    fn uri_authority_stands_in_for_missing_host() {
        let r = resolver(DOMAINS);
        let headers = HeaderMap::new();
        let req = RequestContext::new("/about", &headers).or_authority(Some("example.fr:443"));
        assert_eq!(req.host(), Some("example.fr"));
        let outcome = r.evaluate(&req);
        assert_eq!(outcome.locale.unwrap().locale, "fr");

        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, "example.com".parse().unwrap());
        let req = RequestContext::new("/about", &headers).or_authority(Some("example.fr"));
        assert_eq!(req.host(), Some("example.com"));
    }
}
