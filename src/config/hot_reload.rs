//! Configuration file watcher emitting reload triggers.
//!
//! The watcher only detects changes; the actual reload (and the decision
//! that a failed reload is fatal) belongs to the supervision loop that owns
//! the [`ConfigStore`](super::ConfigStore).

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::error::WatcherError;

/// Watches the configuration file and reports changes.
pub struct ConfigWatcher {
    path: PathBuf,
}

impl ConfigWatcher {
    /// Creates a watcher for the given configuration file.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Starts watching the file.
    ///
    /// Sends one tick on `change_tx` per debounced modify/create event.
    /// Returns the underlying watcher handle; dropping it stops the watch.
    pub fn run(self, change_tx: mpsc::Sender<()>) -> Result<RecommendedWatcher, WatcherError> {
        let debounce = Duration::from_millis(500);
        let mut last_event: Option<Instant> = None;

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if !(event.kind.is_modify() || event.kind.is_create()) {
                        return;
                    }

                    // Editors save in bursts; collapse them into one tick.
                    let now = Instant::now();
                    if last_event.is_some_and(|t| now.duration_since(t) < debounce) {
                        return;
                    }
                    last_event = Some(now);

                    if change_tx.try_send(()).is_err() {
                        debug!("Reload trigger already pending, change coalesced");
                    }
                }
                Err(e) => error!(error = %e, "Config watch error"),
            },
            Config::default(),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;
        info!(path = %self.path.display(), "Config watcher started");

        Ok(watcher)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;
    use tokio::time::timeout;

    use super::*;

    #[tokio::test]
    async fn file_modification_emits_a_trigger() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"server: {}\n").unwrap();
        file.flush().unwrap();

        let (tx, mut rx) = mpsc::channel(1);
        let _watcher = ConfigWatcher::new(file.path()).run(tx).unwrap();

        std::fs::write(file.path(), "server:\n  upstream_port: 8087\n").unwrap();

        timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("no reload trigger within timeout")
            .expect("trigger channel closed");
    }
}
