//! Route resolver edge server.
//!
//! ```text
//!     Client Request
//!     ───────────────▶ http server ──▶ SharedResolver ──┬─▶ redirect (Location)
//!                                                       ├─▶ upstream (rewritten path)
//!                                                       └─▶ external origin
//!
//!     config file ──▶ ConfigWatcher / SIGHUP ──▶ SharedResolver::reload
//! ```

use std::path::PathBuf;

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;

use route_resolver::config::{load_config, ConfigWatcher};
use route_resolver::lifecycle::{signals, Shutdown};
use route_resolver::observability::{init_logging, init_prometheus};
use route_resolver::{EdgeServer, RequestContext, Resolver};

#[derive(Parser)]
#[command(name = "route-resolver")]
#[command(about = "Rewrite, redirect and header rules at the edge", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "router.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the edge server (default)
    Serve,
    /// Print the resolver outcome for one request as JSON
    Resolve {
        /// Request path, optionally with a query string
        path: String,
        /// Host header
        #[arg(long)]
        host: Option<String>,
        /// Extra request header as `name: value` (repeatable)
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,
    },
    /// Validate the configuration and exit
    Check,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Check => {
            let resolver = Resolver::from_config(&config)?;
            println!(
                "{}: ok ({} rules, {} pages)",
                cli.config.display(),
                resolver.rules().rule_count(),
                resolver.rules().pages.len()
            );
            Ok(())
        }
        Commands::Resolve {
            path,
            host,
            headers,
        } => {
            let resolver = Resolver::from_config(&config)?;
            let headers = parse_headers(host, &headers)?;
            let outcome = resolver.evaluate(&RequestContext::new(&path, &headers));
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            Ok(())
        }
        Commands::Serve => serve(cli.config, config).await,
    }
}

async fn serve(
    path: PathBuf,
    config: route_resolver::RouterConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    init_logging(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "route-resolver starting");

    if config.observability.metrics_enabled {
        let addr = init_prometheus(&config.observability.metrics_address)?;
        tracing::info!(address = %addr, "Metrics exporter listening");
    }

    let shutdown = Shutdown::new();
    shutdown.spawn_signal_listener();

    let (watcher, config_updates) = ConfigWatcher::new(&path);
    signals::spawn_reload_on_hangup(path, watcher.sender(), shutdown.subscribe())?;
    let _watcher = match watcher.run() {
        Ok(w) => Some(w),
        Err(e) => {
            tracing::warn!(error = %e, "Config watcher unavailable, reload with SIGHUP");
            None
        }
    };

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    let server = EdgeServer::new(config)?;
    server
        .run(listener, config_updates, shutdown.subscribe())
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

fn parse_headers(
    host: Option<String>,
    raw: &[String],
) -> Result<HeaderMap, Box<dyn std::error::Error>> {
    let mut headers = HeaderMap::new();
    if let Some(host) = host {
        headers.insert(axum::http::header::HOST, HeaderValue::from_str(&host)?);
    }
    for line in raw {
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| format!("header `{line}` is not `name: value`"))?;
        headers.append(
            HeaderName::from_bytes(name.trim().as_bytes())?,
            HeaderValue::from_str(value.trim())?,
        );
    }
    Ok(headers)
}
