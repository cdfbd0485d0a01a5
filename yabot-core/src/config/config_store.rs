//! Shared config cells with change notification.
//!
//! `ConfigStore<T>` holds one reloadable config section. The economy and
//! sweeper sections are small `Copy` structs, so readers take a
//! [`snapshot`](ConfigStore::snapshot) instead of holding a lock across
//! their work. Updates bump a version counter carried inside a watch
//! channel; a [`ConfigWatcher`] awaits the next bump without polling.

use std::sync::Arc;
use tokio::sync::{RwLock, watch};

/// A shared, reloadable configuration cell.
pub struct ConfigStore<T> {
    inner: Arc<ConfigStoreInner<T>>,
}

struct ConfigStoreInner<T> {
    data: RwLock<T>,
    version_tx: watch::Sender<u64>,
}

/// Receives notifications when a [`ConfigStore`] is updated.
///
/// Call [`changed()`](ConfigWatcher::changed) to wait for the next update.
pub struct ConfigWatcher {
    version_rx: watch::Receiver<u64>,
}

// -- ConfigStore --------------------------------------------------------

impl<T: Copy> ConfigStore<T> {
    /// Create a new `ConfigStore` with the given initial value.
    pub fn new(initial: T) -> Self {
        let (version_tx, _) = watch::channel(0u64);
        Self {
            inner: Arc::new(ConfigStoreInner {
                data: RwLock::new(initial),
                version_tx,
            }),
        }
    }

    /// Replace the stored value and notify all watchers.
    pub async fn update(&self, value: T) {
        *self.inner.data.write().await = value;
        self.inner.version_tx.send_modify(|version| *version += 1);
    }

    /// Copy out the current value.
    pub async fn snapshot(&self) -> T {
        *self.inner.data.read().await
    }

    /// Subscribe to change notifications.
    pub fn subscribe(&self) -> ConfigWatcher {
        ConfigWatcher {
            version_rx: self.inner.version_tx.subscribe(),
        }
    }
}

impl<T> Clone for ConfigStore<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

// -- ConfigWatcher ------------------------------------------------------

impl ConfigWatcher {
    /// Wait until the config store is updated.
    ///
    /// Returns `Ok(())` when a new version is available, or `Err` if the
    /// [`ConfigStore`] has been dropped.
    pub async fn changed(&mut self) -> Result<(), watch::error::RecvError> {
        self.version_rx.changed().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SweeperConfig;

    #[tokio::test]
    async fn update_is_visible_and_notifies_watchers() {
        let store = ConfigStore::new(SweeperConfig::default());
        let mut watcher = store.subscribe();

        store
            .update(SweeperConfig {
                sweep_interval_secs: 5,
            })
            .await;

        assert!(watcher.changed().await.is_ok());
        assert_eq!(store.snapshot().await.sweep_interval_secs, 5);
    }

    #[tokio::test]
    async fn snapshots_are_independent_of_later_updates() {
        let store = ConfigStore::new(SweeperConfig::default());
        let before = store.snapshot().await;

        store
            .update(SweeperConfig {
                sweep_interval_secs: 7,
            })
            .await;

        assert_eq!(before.sweep_interval_secs, 60);
        assert_eq!(store.snapshot().await.sweep_interval_secs, 7);
    }
}
