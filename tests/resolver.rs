//! Resolver behavior through the public API.

use axum::http::{HeaderMap, HeaderValue};
use route_resolver::config::parse_config;
use route_resolver::routing::{CompiledPattern, Destination, ParamValue};
use route_resolver::{Action, RequestContext, SharedResolver};

const CONFIG: &str = r#"
base_path = "/docs"
max_rewrite_depth = 5

[i18n]
locales = ["en-US", "fr"]
default_locale = "en-US"

[[i18n.domains]]
domain = "example.fr"
default_locale = "fr"

[[rewrites]]
source = "/loop-a"
destination = "/loop-b"

[[rewrites]]
source = "/loop-b"
destination = "/loop-a"

[[rewrites]]
source = "/beta/:page"
destination = "/preview/:page"
has = [{ type = "cookie", key = "beta" }]

[[redirects]]
source = "/old"
destination = "/new"
"#;

fn resolver() -> SharedResolver {
    SharedResolver::from_config(&parse_config(CONFIG).unwrap()).unwrap()
}

fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in pairs {
        map.insert(*name, HeaderValue::from_static(value));
    }
    map
}

#[test]
fn pattern_properties() {
    let blog = CompiledPattern::compile("/blog/:slug").unwrap();
    let params = blog.match_path("/blog/hello-world").unwrap();
    assert_eq!(params.get("slug"), Some(&ParamValue::from("hello-world")));
    assert!(blog.match_path("/blog/a/b").is_none());

    let wildcard = CompiledPattern::compile("/blog/:slug*").unwrap();
    let params = wildcard.match_path("/blog/a/b/c").unwrap();
    assert_eq!(params.get("slug"), Some(&ParamValue::from(vec!["a", "b", "c"])));

    let news = Destination::parse("/news/:slug").unwrap();
    let params = blog.match_path("/blog/x").unwrap();
    assert_eq!(news.expand(&params), "/news/x");
}

#[test]
fn redirect_keeps_base_path_and_locale() {
    let r = resolver();
    let h = HeaderMap::new();
    match r.evaluate(&RequestContext::new("/docs/fr/old", &h)).action {
        Action::Redirect { location, status, permanent, .. } => {
            assert_eq!(location, "/docs/fr/new");
            assert_eq!(status, 307);
            assert!(!permanent);
        }
        other => panic!("unexpected {other:?}"),
    }
    // Outside the base path nothing matches.
    assert!(matches!(
        r.evaluate(&RequestContext::new("/old", &h)).action,
        Action::PassThrough { .. }
    ));
}

#[test]
fn domain_default_locale() {
    let r = resolver();
    let h = headers(&[("host", "example.fr")]);
    let outcome = r.evaluate(&RequestContext::new("/docs/about", &h));
    let locale = outcome.locale.unwrap();
    assert_eq!(locale.locale, "fr");
    assert!(!locale.should_redirect);
    assert!(matches!(
        outcome.action,
        Action::PassThrough { ref path, ref locale, .. }
            if path == "/about" && locale.as_deref() == Some("fr")
    ));
}

#[test]
fn rewrite_loop_is_recovered() {
    let r = resolver();
    let h = HeaderMap::new();
    let outcome = r.evaluate(&RequestContext::new("/docs/loop-a", &h));
    assert!(matches!(outcome.action, Action::PassThrough { ref path, .. } if path == "/loop-a"));
    assert_eq!(outcome.diagnostics.len(), 1);
    assert!(outcome.diagnostics[0].contains("exceeded 5 rewrites"));
}

#[test]
fn has_condition_gates_rewrite() {
    let r = resolver();
    let without = HeaderMap::new();
    assert!(matches!(
        r.evaluate(&RequestContext::new("/docs/beta/home", &without)).action,
        Action::PassThrough { .. }
    ));

    let with = headers(&[("cookie", "beta=1")]);
    let outcome = r.evaluate(&RequestContext::new("/docs/beta/home", &with));
    assert_eq!(outcome.action.kind(), "rewrite");
}

#[test]
fn outcome_serializes_for_cli() {
    let r = resolver();
    let h = headers(&[("cookie", "beta=1")]);
    let outcome = r.evaluate(&RequestContext::new("/docs/beta/home?x=1", &h));
    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["action"]["action"], "rewrite");
    assert_eq!(json["action"]["target"]["type"], "internal");
    assert_eq!(json["action"]["target"]["path"], "/preview/home");
    assert_eq!(json["action"]["target"]["query"], "x=1");
    assert_eq!(json["action"]["rule"], "rewrites[2]");
    assert_eq!(json["locale"]["locale"], "en-US");
}
