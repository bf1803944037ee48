//! HTTP edge server.
//!
//! # Responsibilities
//! - Create the Axum Router with the edge handler
//! - Wire up middleware (request ID, tracing, timeout)
//! - Evaluate every request against the current resolver snapshot
//! - Answer redirects, forward rewrites and pass-through requests
//! - Swap in new resolver snapshots as config updates arrive

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::ServiceBuilder;
use thiserror::Error;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::loader::ConfigError;
use crate::config::schema::RouterConfig;
use crate::http::request::{self, UuidRequestId};
use crate::http::response;
use crate::observability::metrics;
use crate::routing::resolver::{Action, RequestContext, RewriteTarget};
use crate::routing::shared::SharedResolver;

/// Upper bound on request bodies buffered for external rewrites.
const MAX_EXTERNAL_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Error type for building the edge server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to build external HTTP client: {0}")]
    ExternalClient(#[from] reqwest::Error),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<SharedResolver>,
    pub client: Client<HttpConnector, Body>,
    pub external: reqwest::Client,
    pub upstream: Arc<str>,
}

/// HTTP edge server applying resolver outcomes.
pub struct EdgeServer {
    router: Router,
    config: RouterConfig,
    resolver: Arc<SharedResolver>,
}

impl EdgeServer {
    /// Compile the configuration and build the server.
    pub fn new(config: RouterConfig) -> Result<Self, ServerError> {
        let resolver = Arc::new(SharedResolver::from_config(&config)?);

        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        // Redirects from external origins are relayed to the client, never followed.
        let external = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(Duration::from_secs(config.server.request_timeout_secs))
            .build()?;

        let state = AppState {
            resolver: resolver.clone(),
            client,
            external,
            upstream: Arc::from(config.server.upstream.as_str()),
        };

        let router = Self::build_router(&config, state);
        Ok(Self {
            router,
            config,
            resolver,
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &RouterConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(edge_handler))
            .route("/", any(edge_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
                    .layer(TraceLayer::new_for_http().make_span_with(
                        |req: &Request<Body>| {
                            tracing::info_span!(
                                "request",
                                method = %req.method(),
                                uri = %req.uri(),
                                request_id = %request::request_id(req.headers()),
                            )
                        },
                    ))
                    .layer(PropagateRequestIdLayer::x_request_id())
                    .layer(TimeoutLayer::new(Duration::from_secs(
                        config.server.request_timeout_secs,
                    ))),
            )
    }

    /// Run the server until `shutdown` fires.
    ///
    /// Configs received on `config_updates` are compiled and swapped in;
    /// invalid ones are logged and the current snapshot is kept.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<RouterConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.server.upstream,
            rules = self.resolver.load_full().rules().rule_count(),
            "Edge server starting"
        );

        let resolver = self.resolver.clone();
        tokio::spawn(async move {
            while let Some(config) = config_updates.recv().await {
                match resolver.reload(&config) {
                    Ok(rules) => {
                        metrics::record_config_reload(true);
                        tracing::info!(rules, "Resolver configuration reloaded");
                    }
                    Err(e) => {
                        metrics::record_config_reload(false);
                        tracing::error!(error = %e, "Rejected config reload, keeping current rules");
                    }
                }
            }
        });

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("Edge server stopped");
        Ok(())
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Handle to the live resolver, for in-process reloads.
    pub fn resolver(&self) -> Arc<SharedResolver> {
        self.resolver.clone()
    }
}

/// Resolve the request, then redirect or forward it.
async fn edge_handler(
    State(state): State<AppState>,
    ConnectInfo(client_addr): ConnectInfo<SocketAddr>,
    req: Request<Body>,
) -> Response {
    let request_id = request::request_id(req.headers()).to_string();
    let target = request::path_and_query(req.uri());

    let authority = req.uri().authority().map(|a| a.as_str());
    let outcome = state
        .resolver
        .evaluate(&RequestContext::new(&target, req.headers()).or_authority(authority));

    for diagnostic in &outcome.diagnostics {
        tracing::warn!(request_id = %request_id, diagnostic = %diagnostic, "Resolver diagnostic");
    }
    tracing::debug!(
        request_id = %request_id,
        path = %target,
        action = outcome.action.kind(),
        "Request resolved"
    );

    let locale_redirect = outcome
        .locale
        .as_ref()
        .filter(|l| l.should_redirect)
        .and_then(|l| l.redirect_target.as_deref());

    let mut response = match (&outcome.action, locale_redirect) {
        (Action::Redirect { location, status, .. }, _) => response::redirect(location, *status),
        (_, Some(location)) => response::redirect(location, StatusCode::TEMPORARY_REDIRECT.as_u16()),
        (
            Action::Rewrite {
                target: RewriteTarget::External { url },
                ..
            },
            None,
        ) => forward_external(&state, req, url, &request_id).await,
        (
            Action::Rewrite {
                target: RewriteTarget::Internal { path, query, locale },
                ..
            }
            | Action::PassThrough { path, query, locale },
            None,
        ) => {
            let target = request::request_target(path, query.as_deref());
            forward_upstream(&state, req, &target, locale.as_deref(), client_addr, &request_id)
                .await
        }
    };

    response::apply_headers(response.headers_mut(), &outcome.headers);
    response
}

async fn forward_upstream(
    state: &AppState,
    req: Request<Body>,
    target: &str,
    locale: Option<&str>,
    client_addr: SocketAddr,
    request_id: &str,
) -> Response {
    let (parts, body) = req.into_parts();
    let upstream_req = match request::upstream_request(
        parts,
        body,
        &state.upstream,
        target,
        locale,
        Some(client_addr),
    ) {
        Ok(req) => req,
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, target = %target, "Invalid upstream request");
            return (StatusCode::BAD_REQUEST, "Invalid request target").into_response();
        }
    };

    let start = Instant::now();
    match state.client.request(upstream_req).await {
        Ok(upstream_response) => {
            metrics::record_upstream("upstream", start);
            response::from_upstream(upstream_response)
        }
        Err(e) => {
            metrics::record_upstream_error("upstream");
            tracing::error!(request_id = %request_id, error = %e, upstream = %state.upstream, "Upstream error");
            response::bad_gateway()
        }
    }
}

async fn forward_external(
    state: &AppState,
    req: Request<Body>,
    url: &str,
    request_id: &str,
) -> Response {
    let (parts, body) = req.into_parts();
    let body = match axum::body::to_bytes(body, MAX_EXTERNAL_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Failed to read request body");
            return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
        }
    };

    let mut headers = parts.headers;
    request::strip_hop_by_hop(&mut headers);
    headers.remove(header::HOST);

    let start = Instant::now();
    let result = state
        .external
        .request(parts.method, url)
        .headers(headers)
        .body(body)
        .send()
        .await;

    let external_response = match result {
        Ok(r) => r,
        Err(e) => {
            metrics::record_upstream_error("external");
            tracing::error!(request_id = %request_id, error = %e, url = %url, "External rewrite failed");
            return response::bad_gateway();
        }
    };

    let status = external_response.status();
    let mut response_headers = external_response.headers().clone();
    let bytes = match external_response.bytes().await {
        Ok(bytes) => bytes,
        Err(e) => {
            metrics::record_upstream_error("external");
            tracing::error!(request_id = %request_id, error = %e, url = %url, "External response body failed");
            return response::bad_gateway();
        }
    };
    metrics::record_upstream("external", start);

    request::strip_hop_by_hop(&mut response_headers);
    response_headers.remove(header::CONTENT_LENGTH);
    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = status;
    *response.headers_mut() = response_headers;
    response
}
