//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::RouterConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<RouterConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<RouterConfig, ConfigError> {
    let config: RouterConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::RewritesConfig;

    const SAMPLE: &str = r#"
base_path = "/docs"
pages = ["/", "/blog/:slug"]

[server]
upstream = "127.0.0.1:4000"

[i18n]
locales = ["en-US", "fr", "nl-NL"]
default_locale = "en-US"

[[i18n.domains]]
domain = "example.fr"
default_locale = "fr"

[rewrites]
before_files = [{ source = "/a", destination = "/b" }]
fallback = [{ source = "/:path*", destination = "https://legacy.example.com/:path*" }]

[[redirects]]
source = "/old-blog/:post(\\d+)"
destination = "/blog/:post"
permanent = true

[[headers]]
source = "/:path*"
headers = [{ key = "x-hello", value = "there" }]
"#;

    #[test]
    fn parses_full_config() {
        let config = parse_config(SAMPLE).unwrap();
        assert_eq!(config.base_path, "/docs");
        assert_eq!(config.server.upstream, "127.0.0.1:4000");
        assert_eq!(config.server.bind_address, "0.0.0.0:8080");
        assert_eq!(config.max_rewrite_depth, 10);

        let i18n = config.i18n.as_ref().unwrap();
        assert!(i18n.locale_detection);
        assert_eq!(i18n.locale_cookie, "locale");
        assert_eq!(i18n.domains[0].default_locale, "fr");

        match &config.rewrites {
            RewritesConfig::Phased(p) => {
                assert_eq!(p.before_files.len(), 1);
                assert!(p.after_files.is_empty());
                assert_eq!(p.fallback.len(), 1);
            }
            RewritesConfig::List(_) => panic!("expected phased rewrites"),
        }
        assert!(config.redirects[0].permanent);
        assert!(config.headers[0].base_path);
    }

    #[test]
    fn plain_rewrite_list() {
        let config = parse_config(
            r#"
[[rewrites]]
source = "/blog/:slug"
destination = "/news/:slug"
"#,
        )
        .unwrap();
        assert!(matches!(config.rewrites, RewritesConfig::List(ref l) if l.len() == 1));
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config = parse_config("").unwrap();
        assert!(config.i18n.is_none());
        assert!(config.rewrites.is_empty());
    }

    #[test]
    fn syntax_errors_are_parse_errors() {
        assert!(matches!(parse_config("base_path = "), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn validation_message_names_fields() {
        let err = parse_config(
            r#"
[[redirects]]
source = "/:path*/x"
destination = "/"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("redirects[0].source"));
    }

    #[test]
    fn bundled_sample_is_valid() {
        let config = parse_config(include_str!("../../router.toml")).unwrap();
        assert_eq!(config.i18n.unwrap().locale_cookie, "site_locale");
        assert_eq!(config.redirects.len(), 3);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
