//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::Request;
use axum::Json;
use route_resolver::config::parse_config;
use route_resolver::{EdgeServer, RouterConfig, Shutdown};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// Start an upstream that echoes what it received as JSON.
pub async fn start_echo_upstream() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let app = axum::Router::new().fallback(|req: Request| async move {
        let header = |name: &str| {
            req.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        Json(json!({
            "method": req.method().as_str(),
            "path": req.uri().path(),
            "query": req.uri().query(),
            "locale": header("x-forwarded-locale"),
            "forwarded_host": header("x-forwarded-host"),
            "request_id": header("x-request-id"),
        }))
    });
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// A running edge server.
pub struct Edge {
    pub addr: SocketAddr,
    pub config_updates: mpsc::UnboundedSender<RouterConfig>,
    pub shutdown: Shutdown,
    pub task: tokio::task::JoinHandle<()>,
}

impl Edge {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Parse `toml`, point it at `upstream` and start an edge server on port 0.
pub async fn start_edge(toml: &str, upstream: SocketAddr) -> Edge {
    let mut config = parse_config(toml).unwrap();
    config.server.upstream = upstream.to_string();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let (config_updates, rx) = mpsc::unbounded_channel();

    let server = EdgeServer::new(config).unwrap();
    let server_shutdown = shutdown.subscribe();
    let task = tokio::spawn(async move {
        let _ = server.run(listener, rx, server_shutdown).await;
    });

    Edge {
        addr,
        config_updates,
        shutdown,
        task,
    }
}

/// Client that never follows redirects.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .pool_max_idle_per_host(0)
        .no_proxy()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

pub async fn echo(response: reqwest::Response) -> Value {
    assert_eq!(response.status(), 200);
    response.json().await.unwrap()
}
