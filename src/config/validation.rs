//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check the locale graph (default and domain locales are declared, no duplicates)
//! - Compile every pattern so syntax errors surface at load time
//! - Validate value ranges (base path shape, rewrite depth, timeouts)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Every error names the offending field, e.g. `redirects[2].source`
//! - Runs before config is accepted into the system
//! - Rules are compiled exactly once; the compiled set is handed back

use std::collections::HashSet;
use std::fmt;

use axum::http::uri::Authority;

use crate::config::schema::{I18nConfig, RouterConfig};
use crate::routing::rules::RuleSet;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a parsed configuration and return its compiled rules.
pub fn validate_config(config: &RouterConfig) -> Result<RuleSet, Vec<ValidationError>> {
    let mut errors = Vec::new();

    let base = &config.base_path;
    if !base.is_empty() && (!base.starts_with('/') || base.ends_with('/')) {
        errors.push(ValidationError::new(
            "base_path",
            "must start with '/' and must not end with '/' (use \"\" to disable)",
        ));
    }
    if base.contains('?') || base.contains(':') {
        errors.push(ValidationError::new("base_path", "must be a plain path"));
    }

    if config.max_rewrite_depth == 0 {
        errors.push(ValidationError::new("max_rewrite_depth", "must be > 0"));
    }
    if config.server.upstream.parse::<Authority>().is_err() {
        errors.push(ValidationError::new(
            "server.upstream",
            format!("`{}` is not a host:port authority", config.server.upstream),
        ));
    }
    if config.server.request_timeout_secs == 0 {
        errors.push(ValidationError::new("server.request_timeout_secs", "must be > 0"));
    }

    if let Some(i18n) = &config.i18n {
        validate_i18n(i18n, &mut errors);
    }

    match RuleSet::compile(config) {
        Ok(rules) if errors.is_empty() => Ok(rules),
        Ok(_) => Err(errors),
        Err(rule_errors) => {
            errors.extend(rule_errors);
            Err(errors)
        }
    }
}

fn validate_i18n(i18n: &I18nConfig, errors: &mut Vec<ValidationError>) {
    if i18n.locales.is_empty() {
        errors.push(ValidationError::new("i18n.locales", "at least one locale is required"));
    }

    let mut seen = HashSet::new();
    for (i, locale) in i18n.locales.iter().enumerate() {
        if locale.is_empty() || locale.contains(['/', '?', ' ']) {
            errors.push(ValidationError::new(
                format!("i18n.locales[{i}]"),
                format!("`{locale}` is not a valid locale tag"),
            ));
        }
        if !seen.insert(locale.to_ascii_lowercase()) {
            errors.push(ValidationError::new(
                format!("i18n.locales[{i}]"),
                format!("`{locale}` is declared more than once"),
            ));
        }
    }

    let declared = |tag: &str| i18n.locales.iter().any(|l| l == tag);

    if !declared(&i18n.default_locale) {
        errors.push(ValidationError::new(
            "i18n.default_locale",
            format!("`{}` is not listed in i18n.locales", i18n.default_locale),
        ));
    }
    if i18n.locale_cookie.trim().is_empty() {
        errors.push(ValidationError::new("i18n.locale_cookie", "is empty"));
    }

    let mut domains = HashSet::new();
    for (i, domain) in i18n.domains.iter().enumerate() {
        let field = format!("i18n.domains[{i}]");
        if domain.domain.trim().is_empty() || domain.domain.contains(['/', ' ']) {
            errors.push(ValidationError::new(
                format!("{field}.domain"),
                "must be a bare host name",
            ));
        } else if !domains.insert(domain.domain.to_ascii_lowercase()) {
            errors.push(ValidationError::new(
                format!("{field}.domain"),
                format!("`{}` is declared more than once", domain.domain),
            ));
        }
        if !declared(&domain.default_locale) {
            errors.push(ValidationError::new(
                format!("{field}.default_locale"),
                format!("`{}` is not listed in i18n.locales", domain.default_locale),
            ));
        }
        for (j, locale) in domain.locales.iter().enumerate() {
            if !declared(locale) {
                errors.push(ValidationError::new(
                    format!("{field}.locales[{j}]"),
                    format!("`{locale}` is not listed in i18n.locales"),
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::DomainConfig;

    fn i18n() -> I18nConfig {
        I18nConfig {
            locales: vec!["en-US".into(), "fr".into(), "nl-NL".into()],
            default_locale: "en-US".into(),
            locale_detection: true,
            locale_cookie: "locale".into(),
            domains: Vec::new(),
        }
    }

    fn fields(config: &RouterConfig) -> Vec<String> {
        validate_config(config)
            .unwrap_err()
            .into_iter()
            .map(|e| e.field)
            .collect()
    }

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&RouterConfig::default()).is_ok());
    }

    #[test]
    fn default_locale_must_be_declared() {
        let mut config = RouterConfig::default();
        config.i18n = Some(I18nConfig {
            default_locale: "de".into(),
            ..i18n()
        });
        assert_eq!(fields(&config), vec!["i18n.default_locale"]);
    }

    #[test]
    fn duplicate_locales_are_rejected() {
        let mut config = RouterConfig::default();
        config.i18n = Some(I18nConfig {
            locales: vec!["en-US".into(), "fr".into(), "FR".into()],
            ..i18n()
        });
        assert_eq!(fields(&config), vec!["i18n.locales[2]"]);
    }

    #[test]
    fn domain_locales_must_be_declared() {
        let mut config = RouterConfig::default();
        config.i18n = Some(I18nConfig {
            domains: vec![DomainConfig {
                domain: "example.de".into(),
                default_locale: "de".into(),
                locales: vec!["fr".into(), "at".into()],
                http: false,
            }],
            ..i18n()
        });
        assert_eq!(
            fields(&config),
            vec!["i18n.domains[0].default_locale", "i18n.domains[0].locales[1]"]
        );
    }

    #[test]
    fn base_path_shape() {
        let mut config = RouterConfig::default();
        config.base_path = "docs/".into();
        assert_eq!(fields(&config), vec!["base_path"]);

        config.base_path = "/docs".into();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn upstream_must_be_an_authority() {
        let mut config = RouterConfig::default();
        config.server.upstream = "http://app:3000/".into();
        assert_eq!(fields(&config), vec!["server.upstream"]);
    }

    #[test]
    fn returns_compiled_rules() {
        let mut config = RouterConfig::default();
        config.pages = vec!["/".into(), "/about".into()];
        let rules = validate_config(&config).unwrap();
        assert_eq!(rules.pages.len(), 2);
    }

    #[test]
    fn reports_every_error() {
        let mut config = RouterConfig::default();
        config.max_rewrite_depth = 0;
        config.pages = vec!["no-slash".into()];
        config.i18n = Some(I18nConfig {
            default_locale: "de".into(),
            ..i18n()
        });
        assert_eq!(
            fields(&config),
            vec!["max_rewrite_depth", "i18n.default_locale", "pages[0].source"]
        );
    }
}
