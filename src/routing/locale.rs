//! Locale detection and path-prefix stripping.
//!
//! # Precedence
//! locale cookie > path prefix > domain default > Accept-Language > default locale
//!
//! # Design Decisions
//! - Tags compare case-insensitively and resolve to the configured spelling
//! - Detection redirects are advisory: the caller decides whether to send them
//! - An explicit path prefix is never overridden by Accept-Language

use serde::Serialize;

use crate::config::schema::{DomainConfig, I18nConfig};

/// Immutable, validated locale settings.
#[derive(Debug, Clone)]
pub struct LocaleSettings {
    locales: Vec<String>,
    default_locale: String,
    domains: Vec<DomainSettings>,
    detection: bool,
    cookie_name: String,
}

#[derive(Debug, Clone)]
struct DomainSettings {
    host: String,
    default_locale: String,
    locales: Vec<String>,
    http: bool,
}

/// Outcome of locale resolution for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocaleResolution {
    /// Effective locale for the request.
    pub locale: String,
    /// Request path with any locale prefix removed.
    pub stripped_path: String,
    /// Locale encoded in the path prefix, if any.
    pub path_locale: Option<String>,
    /// True when the preferred locale differs from the one the URL encodes.
    pub should_redirect: bool,
    /// Locale-qualified location to redirect to.
    pub redirect_target: Option<String>,
}

impl LocaleSettings {
    /// Build settings from a configuration that already passed validation.
    pub fn from_config(config: &I18nConfig) -> Self {
        Self {
            locales: config.locales.clone(),
            default_locale: config.default_locale.clone(),
            domains: config.domains.iter().map(DomainSettings::from_config).collect(),
            detection: config.locale_detection,
            cookie_name: config.locale_cookie.clone(),
        }
    }

    pub fn default_locale(&self) -> &str {
        &self.default_locale
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Configured spelling of `tag`, if it is a supported locale.
    pub fn canonical(&self, tag: &str) -> Option<&str> {
        self.locales
            .iter()
            .find(|l| l.eq_ignore_ascii_case(tag))
            .map(String::as_str)
    }

    /// Split a leading locale segment off `path`.
    pub fn split_path_locale(&self, path: &str) -> (Option<&str>, String) {
        let rest = path.strip_prefix('/').unwrap_or(path);
        let (first, tail) = match rest.split_once('/') {
            Some((first, tail)) => (first, Some(tail)),
            None => (rest, None),
        };
        match self.canonical(first) {
            Some(locale) => {
                let stripped = match tail {
                    Some(tail) if !tail.is_empty() => format!("/{tail}"),
                    _ => "/".to_string(),
                };
                (Some(locale), stripped)
            }
            None => (None, path.to_string()),
        }
    }

    /// Prefix `path` with `locale`.
    pub fn qualify(locale: &str, path: &str) -> String {
        if path == "/" {
            format!("/{locale}")
        } else {
            format!("/{locale}{path}")
        }
    }

    /// Negotiate an `Accept-Language` header against the supported locales.
    pub fn negotiate(&self, accept_language: &str) -> Option<&str> {
        let mut entries: Vec<(&str, f32)> = accept_language
            .split(',')
            .filter_map(|part| {
                let mut pieces = part.split(';');
                let tag = pieces.next()?.trim();
                if tag.is_empty() || tag == "*" {
                    return None;
                }
                let quality = pieces
                    .filter_map(|p| p.trim().strip_prefix("q="))
                    .find_map(|q| q.trim().parse::<f32>().ok())
                    .unwrap_or(1.0);
                (quality > 0.0).then_some((tag, quality))
            })
            .collect();
        entries.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        entries.into_iter().find_map(|(tag, _)| {
            if let Some(exact) = self.canonical(tag) {
                return Some(exact);
            }
            let region_match = self.locales.iter().find(|l| {
                l.len() > tag.len()
                    && l.as_bytes()[tag.len()] == b'-'
                    && l[..tag.len()].eq_ignore_ascii_case(tag)
            });
            if let Some(locale) = region_match {
                return Some(locale.as_str());
            }
            tag.split_once('-').and_then(|(primary, _)| self.canonical(primary))
        })
    }

    /// Value of the locale cookie in a `Cookie` header.
    pub fn cookie_value<'h>(&self, cookie_header: &'h str) -> Option<&'h str> {
        cookie_value(cookie_header, &self.cookie_name)
    }

    /// Locale served without a path prefix on `host`: the matching domain's
    /// default, or the global default.
    pub fn root_locale(&self, host: Option<&str>) -> &str {
        host.and_then(|h| self.domain_for_host(h))
            .map(|d| d.default_locale.as_str())
            .unwrap_or(&self.default_locale)
    }

    fn domain_for_host(&self, host: &str) -> Option<&DomainSettings> {
        let host = strip_port(host);
        self.domains.iter().find(|d| d.host.eq_ignore_ascii_case(host))
    }

    /// Resolve the effective locale for a request.
    ///
    /// `path` must already have the base path removed; `base_path` is only
    /// used to build the advisory redirect target.
    pub fn resolve(
        &self,
        path: &str,
        host: Option<&str>,
        accept_language: Option<&str>,
        locale_cookie: Option<&str>,
        base_path: &str,
    ) -> LocaleResolution {
        let (path_locale, stripped_path) = self.split_path_locale(path);
        let domain = host.and_then(|h| self.domain_for_host(h));
        let domain_locale = domain.map(|d| d.default_locale.as_str());
        let cookie_locale = locale_cookie.and_then(|c| self.canonical(c.trim()));
        let negotiated = accept_language.and_then(|a| self.negotiate(a));

        let locale = cookie_locale
            .or(path_locale)
            .or(domain_locale)
            .or(negotiated)
            .unwrap_or(&self.default_locale);

        let encoded = path_locale
            .or(domain_locale)
            .unwrap_or(&self.default_locale);
        let preferred = if self.detection {
            cookie_locale.or(if path_locale.is_none() { negotiated } else { None })
        } else {
            None
        };

        let redirect_target = preferred
            .filter(|p| *p != encoded)
            .map(|p| self.location_for(p, &stripped_path, domain, base_path));

        LocaleResolution {
            locale: locale.to_string(),
            path_locale: path_locale.map(str::to_string),
            should_redirect: redirect_target.is_some(),
            redirect_target,
            stripped_path,
        }
    }

    /// Where `path` lives for `locale`: another domain or a sub-path prefix.
    fn location_for(
        &self,
        locale: &str,
        path: &str,
        current: Option<&DomainSettings>,
        base_path: &str,
    ) -> String {
        let owner = self
            .domains
            .iter()
            .find(|d| d.default_locale == locale)
            .or_else(|| self.domains.iter().find(|d| d.locales.iter().any(|l| l == locale)));

        match owner {
            Some(domain) => {
                let local = join_locale_path(base_path, domain.prefix_for(locale), path);
                if current.is_some_and(|c| c.host == domain.host) {
                    local
                } else {
                    let scheme = if domain.http { "http" } else { "https" };
                    format!("{scheme}://{}{local}", domain.host)
                }
            }
            None => {
                let root_locale = current.map_or(self.default_locale.as_str(), |c| {
                    c.default_locale.as_str()
                });
                let prefix = (locale != root_locale).then_some(locale);
                join_locale_path(base_path, prefix, path)
            }
        }
    }
}

impl DomainSettings {
    fn from_config(config: &DomainConfig) -> Self {
        Self {
            host: strip_port(&config.domain).to_ascii_lowercase(),
            default_locale: config.default_locale.clone(),
            locales: config.locales.clone(),
            http: config.http,
        }
    }

    fn prefix_for<'l>(&self, locale: &'l str) -> Option<&'l str> {
        (locale != self.default_locale).then_some(locale)
    }
}

fn join_locale_path(base_path: &str, locale: Option<&str>, path: &str) -> String {
    let mut out = base_path.to_string();
    if let Some(locale) = locale {
        out.push('/');
        out.push_str(locale);
    }
    if path != "/" || out.is_empty() {
        out.push_str(path);
    }
    out
}

/// Host name without a trailing `:port`.
pub(crate) fn strip_port(host: &str) -> &str {
    match host.rsplit_once(':') {
        Some((name, port)) if !name.is_empty() && port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    }
}

/// Find cookie `name` in a `Cookie` header.
pub fn cookie_value<'h>(cookie_header: &'h str, name: &str) -> Option<&'h str> {
    cookie_header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key.trim() == name).then(|| value.trim().trim_matches('"'))
    })
}
