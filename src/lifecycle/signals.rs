//! OS signal handling.
//!
//! # Responsibilities
//! - Wait for termination (ctrl-c, SIGTERM)
//! - Turn SIGHUP into a config reload
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - SIGHUP triggers config reload, not shutdown

use std::path::PathBuf;

use tokio::sync::{broadcast, mpsc};

use crate::config::schema::RouterConfig;
use crate::config::watcher::reload_into;

/// Resolves on ctrl-c or, on unix, SIGTERM.
pub async fn terminate() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = sigterm => {}
    }
}

/// Reload `path` into `tx` on every SIGHUP until shutdown.
#[cfg(unix)]
pub fn spawn_reload_on_hangup(
    path: PathBuf,
    tx: mpsc::UnboundedSender<RouterConfig>,
    mut shutdown: broadcast::Receiver<()>,
) -> std::io::Result<tokio::task::JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = signal(SignalKind::hangup())?;
    Ok(tokio::spawn(async move {
        loop {
            tokio::select! {
                received = hangup.recv() => {
                    if received.is_none() {
                        break;
                    }
                    tracing::info!(path = %path.display(), "SIGHUP received, reloading config");
                    reload_into(&path, &tx);
                }
                _ = shutdown.recv() => break,
            }
        }
    }))
}

#[cfg(not(unix))]
pub fn spawn_reload_on_hangup(
    _path: PathBuf,
    _tx: mpsc::UnboundedSender<RouterConfig>,
    _shutdown: broadcast::Receiver<()>,
) -> std::io::Result<tokio::task::JoinHandle<()>> {
    Ok(tokio::spawn(async {}))
}
