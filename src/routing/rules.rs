//! Compiled route rules.
//!
//! # Responsibilities
//! - Turn rule configuration into immutable `RouteRule` values
//! - Report every problem with the rule's list, index and field
//! - Evaluate a single rule (source pattern + `has` / `missing`) against a path

use axum::http::{HeaderName, HeaderValue};
use regex::Regex;
use url::form_urlencoded;

use crate::config::schema::{
    ConditionConfig, ConditionType, HeaderPair, RedirectConfig, RewriteConfig, RewritesConfig,
    RouterConfig,
};
use crate::config::validation::ValidationError;
use crate::routing::locale::cookie_value;
use crate::routing::pattern::{split_query, CompiledPattern, Destination, Params};
use crate::routing::resolver::RequestContext;

const REDIRECT_STATUS_CODES: [u16; 5] = [301, 302, 303, 307, 308];

/// When a rewrite runs relative to page matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewritePhase {
    BeforeFiles,
    AfterFiles,
    Fallback,
}

impl RewritePhase {
    fn list_name(self, phased: bool) -> &'static str {
        match (self, phased) {
            (_, false) => "rewrites",
            (RewritePhase::BeforeFiles, true) => "rewrites.before_files",
            (RewritePhase::AfterFiles, true) => "rewrites.after_files",
            (RewritePhase::Fallback, true) => "rewrites.fallback",
        }
    }
}

/// What a rule does once it matches.
#[derive(Debug, Clone)]
pub enum RuleKind {
    Rewrite {
        destination: Destination,
        phase: RewritePhase,
    },
    Redirect {
        destination: Destination,
        status: u16,
        permanent: bool,
    },
    Header {
        headers: Vec<HeaderPair>,
    },
}

/// An immutable, compiled rule.
#[derive(Debug, Clone)]
pub struct RouteRule {
    /// Position within its own list.
    pub index: usize,
    /// Name of the list it was declared in, for diagnostics.
    pub list: &'static str,
    pub source: CompiledPattern,
    pub kind: RuleKind,
    /// False when the rule opted out of base path handling.
    pub base_path: bool,
    /// False when the rule opted out of locale handling.
    pub locale: bool,
    pub has: Vec<Condition>,
    pub missing: Vec<Condition>,
}

/// A rule that matched, with its captures and expanded destination.
#[derive(Debug, Clone)]
pub struct MatchResult<'r> {
    pub rule: &'r RouteRule,
    pub params: Params,
    pub destination: Option<String>,
}

impl RouteRule {
    /// `redirects[2]`-style label.
    pub fn label(&self) -> String {
        format!("{}[{}]", self.list, self.index)
    }

    /// Match `path` (already stripped as the rule requires) and the request conditions.
    pub fn matches(&self, path: &str, req: &RequestContext<'_>) -> Option<Params> {
        let params = self.source.match_path(path)?;
        let has = self.has.iter().all(|c| c.is_satisfied(req));
        let missing = self.missing.iter().any(|c| c.is_satisfied(req));
        (has && !missing).then_some(params)
    }

    pub fn destination(&self) -> Option<&Destination> {
        match &self.kind {
            RuleKind::Rewrite { destination, .. } | RuleKind::Redirect { destination, .. } => {
                Some(destination)
            }
            RuleKind::Header { .. } => None,
        }
    }
}

/// A `has` / `missing` condition.
#[derive(Debug, Clone)]
pub struct Condition {
    kind: ConditionType,
    key: String,
    value: Option<Regex>,
}

impl Condition {
    pub fn is_satisfied(&self, req: &RequestContext<'_>) -> bool {
        match self.kind {
            ConditionType::Header => req
                .headers
                .get_all(self.key.as_str())
                .iter()
                .filter_map(|v| v.to_str().ok())
                .any(|v| self.value_matches(v)),
            ConditionType::Cookie => req
                .header("cookie")
                .and_then(|c| cookie_value(c, &self.key))
                .is_some_and(|v| self.value_matches(v)),
            ConditionType::Query => split_query(req.path)
                .1
                .map(|q| {
                    form_urlencoded::parse(q.as_bytes())
                        .any(|(k, v)| k == self.key.as_str() && self.value_matches(&v))
                })
                .unwrap_or(false),
            ConditionType::Host => req.host().is_some_and(|h| self.value_matches(h)),
        }
    }

    fn value_matches(&self, value: &str) -> bool {
        self.value.as_ref().map_or(true, |re| re.is_match(value))
    }
}

/// Substitute `:name` tokens for captured params (percent-encoded); unknown
/// tokens stay as-is.
pub fn interpolate(template: &str, params: &Params) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(pos) = rest.find(':') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];
        let len = after
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(after.len());
        match params.get(&after[..len]).filter(|_| len > 0) {
            Some(value) => out.push_str(&value.encoded()),
            None => {
                out.push(':');
                out.push_str(&after[..len]);
            }
        }
        rest = &after[len..];
    }
    out.push_str(rest);
    out
}

/// Every compiled rule of a configuration, grouped by kind.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    pub before_files: Vec<RouteRule>,
    pub after_files: Vec<RouteRule>,
    pub fallback: Vec<RouteRule>,
    pub redirects: Vec<RouteRule>,
    pub headers: Vec<RouteRule>,
    pub pages: Vec<CompiledPattern>,
}

impl RuleSet {
    /// Compile all rules, collecting every error.
    pub fn compile(config: &RouterConfig) -> Result<Self, Vec<ValidationError>> {
        let mut compiler = RuleCompiler::default();
        let phased = matches!(config.rewrites, RewritesConfig::Phased(_));
        let (before, after, fallback) = config.rewrites.phases();

        let set = RuleSet {
            before_files: compiler.rewrites(before, RewritePhase::BeforeFiles, phased),
            after_files: compiler.rewrites(after, RewritePhase::AfterFiles, phased),
            fallback: compiler.rewrites(fallback, RewritePhase::Fallback, phased),
            redirects: config
                .redirects
                .iter()
                .enumerate()
                .filter_map(|(i, r)| compiler.redirect(i, r))
                .collect(),
            headers: config
                .headers
                .iter()
                .enumerate()
                .filter_map(|(i, h)| {
                    let field = format!("headers[{i}]");
                    let source = compiler.source(&field, &h.source);
                    let headers = compiler.header_pairs(&field, &h.headers);
                    let (has, missing) = compiler.conditions(&field, &h.has, &h.missing);
                    Some(RouteRule {
                        index: i,
                        list: "headers",
                        source: source?,
                        kind: RuleKind::Header { headers: headers? },
                        base_path: h.base_path,
                        locale: h.locale,
                        has: has?,
                        missing: missing?,
                    })
                })
                .collect(),
            pages: config
                .pages
                .iter()
                .enumerate()
                .filter_map(|(i, p)| compiler.source(&format!("pages[{i}]"), p))
                .collect(),
        };

        if compiler.errors.is_empty() {
            Ok(set)
        } else {
            Err(compiler.errors)
        }
    }

    pub fn rule_count(&self) -> usize {
        self.before_files.len()
            + self.after_files.len()
            + self.fallback.len()
            + self.redirects.len()
            + self.headers.len()
    }
}

#[derive(Default)]
struct RuleCompiler {
    errors: Vec<ValidationError>,
}

impl RuleCompiler {
    fn error(&mut self, field: String, message: impl Into<String>) {
        self.errors.push(ValidationError::new(field, message));
    }

    fn source(&mut self, field: &str, source: &str) -> Option<CompiledPattern> {
        CompiledPattern::compile(source)
            .map_err(|e| self.error(format!("{field}.source"), e.to_string()))
            .ok()
    }

    fn destination(
        &mut self,
        field: &str,
        destination: &str,
        source: Option<&CompiledPattern>,
    ) -> Option<Destination> {
        let field = format!("{field}.destination");
        let destination = match Destination::parse(destination) {
            Ok(d) => d,
            Err(e) => {
                self.error(field, e.to_string());
                return None;
            }
        };
        if let Some(source) = source {
            let captured: Vec<&str> = source.param_names().collect();
            let unknown: Vec<&str> = destination
                .referenced_params()
                .into_iter()
                .filter(|name| !captured.contains(name))
                .collect();
            if !unknown.is_empty() {
                self.error(
                    field,
                    format!("references params not captured by source: {}", unknown.join(", ")),
                );
                return None;
            }
        }
        Some(destination)
    }

    fn conditions(
        &mut self,
        field: &str,
        has: &[ConditionConfig],
        missing: &[ConditionConfig],
    ) -> (Option<Vec<Condition>>, Option<Vec<Condition>>) {
        (
            self.condition_list(&format!("{field}.has"), has),
            self.condition_list(&format!("{field}.missing"), missing),
        )
    }

    fn condition_list(&mut self, field: &str, list: &[ConditionConfig]) -> Option<Vec<Condition>> {
        let mut out = Vec::with_capacity(list.len());
        let mut ok = true;
        for (i, c) in list.iter().enumerate() {
            let field = format!("{field}[{i}]");
            if c.kind != ConditionType::Host && c.key.trim().is_empty() {
                self.error(format!("{field}.key"), "key is required");
                ok = false;
                continue;
            }
            if c.kind == ConditionType::Host && c.value.is_none() {
                self.error(format!("{field}.value"), "host conditions require a value");
                ok = false;
                continue;
            }
            let value = match c.value.as_deref().map(|v| Regex::new(&format!("^(?:{v})$"))) {
                Some(Ok(re)) => Some(re),
                Some(Err(e)) => {
                    self.error(format!("{field}.value"), format!("invalid regex: {e}"));
                    ok = false;
                    continue;
                }
                None => None,
            };
            out.push(Condition {
                kind: c.kind,
                key: if c.kind == ConditionType::Header {
                    c.key.to_ascii_lowercase()
                } else {
                    c.key.clone()
                },
                value,
            });
        }
        ok.then_some(out)
    }

    fn header_pairs(&mut self, field: &str, headers: &[HeaderPair]) -> Option<Vec<HeaderPair>> {
        if headers.is_empty() {
            self.error(format!("{field}.headers"), "at least one header is required");
            return None;
        }
        let mut ok = true;
        for (i, pair) in headers.iter().enumerate() {
            if HeaderName::from_bytes(pair.key.as_bytes()).is_err() {
                self.error(format!("{field}.headers[{i}].key"), "invalid header name");
                ok = false;
            }
            if HeaderValue::from_str(&pair.value).is_err() {
                self.error(format!("{field}.headers[{i}].value"), "invalid header value");
                ok = false;
            }
        }
        ok.then(|| headers.to_vec())
    }

    fn rewrites(
        &mut self,
        list: &[RewriteConfig],
        phase: RewritePhase,
        phased: bool,
    ) -> Vec<RouteRule> {
        let list_name = phase.list_name(phased);
        list.iter()
            .enumerate()
            .filter_map(|(i, r)| {
                let field = format!("{list_name}[{i}]");
                let source = self.source(&field, &r.source);
                let destination = self.destination(&field, &r.destination, source.as_ref());
                let (has, missing) = self.conditions(&field, &r.has, &r.missing);
                Some(RouteRule {
                    index: i,
                    list: list_name,
                    source: source?,
                    kind: RuleKind::Rewrite {
                        destination: destination?,
                        phase,
                    },
                    base_path: r.base_path,
                    locale: r.locale,
                    has: has?,
                    missing: missing?,
                })
            })
            .collect()
    }

    fn redirect(&mut self, index: usize, r: &RedirectConfig) -> Option<RouteRule> {
        let field = format!("redirects[{index}]");
        let source = self.source(&field, &r.source);
        let destination = self.destination(&field, &r.destination, source.as_ref());
        let (has, missing) = self.conditions(&field, &r.has, &r.missing);

        let (status, permanent) = match r.status_code {
            Some(_) if r.permanent => {
                self.error(
                    format!("{field}.status_code"),
                    "status_code and permanent are mutually exclusive",
                );
                return None;
            }
            Some(code) if !REDIRECT_STATUS_CODES.contains(&code) => {
                self.error(
                    format!("{field}.status_code"),
                    format!("{code} is not a redirect status code"),
                );
                return None;
            }
            Some(code) => (code, matches!(code, 301 | 308)),
            None if r.permanent => (308, true),
            None => (307, false),
        };

        Some(RouteRule {
            index,
            list: "redirects",
            source: source?,
            kind: RuleKind::Redirect {
                destination: destination?,
                status,
                permanent,
            },
            base_path: r.base_path,
            locale: r.locale,
            has: has?,
            missing: missing?,
        })
    }
}
