//! File watcher for hot reload of configuration and resource snapshots.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

/// Watches one file and sends a freshly loaded value on every change.
///
/// `load` runs on the notify thread; failures are logged and the previous
/// value stays in effect.
pub struct FileWatcher<T> {
    path: PathBuf,
    load: fn(&Path) -> Result<T, crate::config::ConfigError>,
    update_tx: mpsc::UnboundedSender<T>,
}

impl<T: Send + 'static> FileWatcher<T> {
    /// Returns the watcher and a receiver for updates.
    pub fn new(
        path: &Path,
        load: fn(&Path) -> Result<T, crate::config::ConfigError>,
    ) -> (Self, mpsc::UnboundedReceiver<T>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                load,
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching. Keep the returned handle alive for as long as updates are wanted.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx.clone();
        let path = self.path.clone();
        let load = self.load;

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        tracing::info!(path = ?path, "File change detected, reloading");
                        match load(&path) {
                            Ok(value) => {
                                let _ = tx.send(value);
                            }
                            Err(e) => {
                                tracing::error!(path = ?path, error = %e, "Reload failed, keeping current state");
                            }
                        }
                    }
                }
                Err(e) => tracing::error!(error = ?e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "File watcher started");
        Ok(watcher)
    }
}
