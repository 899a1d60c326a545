//! Configuration store and hot-reload management.
//!
//! The [`ConfigStore`] owns the single current [`AppConfig`] and the path it
//! was loaded from. Loads decode the whole file into a fresh record and swap
//! it in atomically; readers take cheap snapshots and keep them for as long
//! as they like. Reload triggers (SIGHUP, the file watcher in
//! [`hot_reload`]) funnel into [`ConfigStore::reload`].

pub mod hot_reload;
pub mod loader;
pub mod model;

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::info;

use crate::error::ConfigError;
pub use model::AppConfig;

/// Process-wide configuration store.
///
/// One writer replaces the whole record while any number of readers hold
/// previously returned snapshots; a reader never observes a partially
/// decoded record. The store is an ordinary value: production code keeps
/// one per process, tests can keep as many as they like.
///
/// Before the first successful [`load`](Self::load) the store holds the
/// default record; callers are expected to load once at startup before
/// relying on [`get`](Self::get).
pub struct ConfigStore {
    inner: RwLock<Inner>,
}

struct Inner {
    current: Arc<AppConfig>,
    path: Option<PathBuf>,
}

impl ConfigStore {
    /// Creates an empty store holding the default record and no path.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                current: Arc::new(AppConfig::default()),
                path: None,
            }),
        }
    }

    /// Loads the configuration file at `path` and replaces the current
    /// record.
    ///
    /// The path is remembered before decoding starts, even if the load
    /// fails, so a later [`reload`](Self::reload) retries the same path once
    /// the file has been fixed. Decoding happens outside the lock; readers
    /// only block for the final pointer swap. On failure the previously
    /// stored record stays authoritative and the error is returned.
    pub fn load(&self, path: &Path) -> Result<(), ConfigError> {
        self.write().path = Some(path.to_path_buf());

        let config = loader::load_from_path(path)?;

        self.write().current = Arc::new(config);
        info!(path = %path.display(), "Configuration loaded");
        Ok(())
    }

    /// Reloads the configuration from the remembered path.
    ///
    /// Returns [`ConfigError::NotLoaded`] if no load was ever attempted. Any
    /// other error means the process is running on configuration that no
    /// longer matches its file; callers with no way to recover (the
    /// signal-driven supervision loop) treat that as fatal.
    pub fn reload(&self) -> Result<(), ConfigError> {
        let path = self.read().path.clone().ok_or(ConfigError::NotLoaded)?;
        self.load(&path)
    }

    /// Returns the current configuration snapshot.
    ///
    /// The read lock is held only long enough to clone the inner `Arc`; the
    /// snapshot stays valid and immutable for as long as the caller keeps
    /// it, regardless of later reloads.
    pub fn get(&self) -> Arc<AppConfig> {
        Arc::clone(&self.read().current)
    }

    /// Returns the path of the last load attempt, if any.
    pub fn path(&self) -> Option<PathBuf> {
        self.read().path.clone()
    }

    // Poisoning only occurs if a thread panics while holding the lock; the
    // guards here only swap or clone an Arc and record a path.
    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Arc;

    use tempfile::NamedTempFile;

    use super::*;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn get_before_load_returns_default_record() {
        let store = ConfigStore::new();

        let config = store.get();
        assert_eq!(config.server.listen, "0.0.0.0:8000");
        assert_eq!(store.path(), None);
    }

    #[test]
    fn load_replaces_record_and_remembers_path() {
        let file = write_config("server:\n  listen: \"10.0.0.1:9000\"\n");
        let store = ConfigStore::new();

        store.load(file.path()).unwrap();

        assert_eq!(store.get().server.listen, "10.0.0.1:9000");
        assert_eq!(store.path().as_deref(), Some(file.path()));
    }

    #[test]
    fn failed_load_leaves_previous_record_untouched() {
        let good = write_config("server:\n  listen: \"10.0.0.1:9000\"\n");
        let bad = write_config("server: [unclosed\n");
        let store = ConfigStore::new();

        store.load(good.path()).unwrap();
        let err = store.load(bad.path()).unwrap_err();

        assert!(matches!(err, ConfigError::ParseFailed { .. }));
        assert_eq!(store.get().server.listen, "10.0.0.1:9000");
    }

    #[test]
    fn failed_first_load_keeps_default_record() {
        let bad = write_config("server: [unclosed\n");
        let store = ConfigStore::new();

        store.load(bad.path()).unwrap_err();

        assert_eq!(store.get().server.listen, "0.0.0.0:8000");
    }

    #[test]
    fn reload_picks_up_edits_to_the_same_file() {
        let file = write_config("server:\n  upstream_port: 8087\n");
        let store = ConfigStore::new();

        store.load(file.path()).unwrap();
        assert_eq!(store.get().server.upstream_port, 8087);

        std::fs::write(file.path(), "server:\n  upstream_port: 8088\n").unwrap();
        store.reload().unwrap();

        assert_eq!(store.get().server.upstream_port, 8088);
    }

    #[test]
    fn reload_before_any_load_is_an_error() {
        let store = ConfigStore::new();

        let err = store.reload().unwrap_err();
        assert!(matches!(err, ConfigError::NotLoaded));
    }

    #[test]
    fn reload_surfaces_missing_file() {
        let file = write_config("server:\n  upstream_port: 8087\n");
        let store = ConfigStore::new();

        store.load(file.path()).unwrap();
        let path = file.path().to_path_buf();
        drop(file);

        let err = store.reload().unwrap_err();
        assert!(matches!(err, ConfigError::ReadFailed { .. }));
        assert_eq!(store.path(), Some(path));
    }

    #[test]
    fn path_is_remembered_even_when_the_load_fails() {
        // A failed load still records the path, so fixing the file and
        // reloading works without re-supplying it.
        let file = write_config("server: [unclosed\n");
        let store = ConfigStore::new();

        store.load(file.path()).unwrap_err();
        assert_eq!(store.path().as_deref(), Some(file.path()));

        std::fs::write(file.path(), "server:\n  upstream_port: 8090\n").unwrap();
        store.reload().unwrap();

        assert_eq!(store.get().server.upstream_port, 8090);
    }

    #[test]
    fn concurrent_readers_never_observe_a_torn_record() {
        // Both files keep upstream_port and expire_secs in agreement, so any
        // mixed old/new record shows up as a pair mismatch.
        let file_a = write_config(
            "server:\n  upstream_port: 1111\nregistry:\n  expire_secs: 1111\n",
        );
        let file_b = write_config(
            "server:\n  upstream_port: 2222\nregistry:\n  expire_secs: 2222\n",
        );

        let store = Arc::new(ConfigStore::new());
        store.load(file_a.path()).unwrap();

        let mut readers = Vec::new();
        for _ in 0..4 {
            let store = Arc::clone(&store);
            readers.push(std::thread::spawn(move || {
                for _ in 0..2000 {
                    let config = store.get();
                    assert_eq!(
                        u64::from(config.server.upstream_port),
                        config.registry.expire_secs,
                    );
                }
            }));
        }

        for i in 0..100 {
            let path = if i % 2 == 0 { file_b.path() } else { file_a.path() };
            store.load(path).unwrap();
        }

        for reader in readers {
            reader.join().unwrap();
        }
    }

    #[test]
    fn snapshots_survive_later_reloads() {
        let file = write_config("server:\n  upstream_port: 8087\n");
        let store = ConfigStore::new();

        store.load(file.path()).unwrap();
        let before = store.get();

        std::fs::write(file.path(), "server:\n  upstream_port: 8088\n").unwrap();
        store.reload().unwrap();

        assert_eq!(before.server.upstream_port, 8087);
        assert_eq!(store.get().server.upstream_port, 8088);
    }
}
