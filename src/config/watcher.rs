//! Configuration file watcher for hot reload.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::RouterConfig;
use crate::observability::metrics;

/// Watches the configuration file and sends every valid new version.
pub struct ConfigWatcher {
    path: PathBuf,
    update_tx: mpsc::UnboundedSender<RouterConfig>,
}

impl ConfigWatcher {
    /// Returns the watcher and a receiver for configuration updates.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<RouterConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        (
            Self {
                path: path.to_path_buf(),
                update_tx,
            },
            update_rx,
        )
    }

    /// Sender that other reload triggers (e.g. SIGHUP) can share.
    pub fn sender(&self) -> mpsc::UnboundedSender<RouterConfig> {
        self.update_tx.clone()
    }

    /// Start watching. The returned watcher must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx;
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                    tracing::info!(path = %path.display(), "Config file change detected, reloading");
                    reload_into(&path, &tx);
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;
        tracing::info!(path = %self.path.display(), "Config watcher started");
        Ok(watcher)
    }
}

/// Load `path` and send it on `tx`; invalid files are logged and dropped.
pub fn reload_into(path: &Path, tx: &mpsc::UnboundedSender<RouterConfig>) {
    match load_config(path) {
        Ok(config) => {
            if tx.send(config).is_err() {
                tracing::debug!("Config receiver closed, dropping reload");
            }
        }
        Err(e) => {
            metrics::record_config_reload(false);
            tracing::error!(error = %e, "Failed to reload config, keeping current configuration");
        }
    }
}
