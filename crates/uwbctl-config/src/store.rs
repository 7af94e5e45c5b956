// ── Watchable settings store ──
//
// Single source of truth for the current settings. Writers go through
// `update`, which validates, persists, and only then publishes.

use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info};

use uwbctl_core::DeviceSettings;

use crate::{ConfigError, Settings, load_settings, save_settings};

/// Current settings plus a change feed.
///
/// File-backed stores write every accepted update back to disk; in-memory
/// stores only publish.
#[derive(Debug)]
pub struct SettingsStore {
    path: Option<PathBuf>,
    tx: watch::Sender<Settings>,
}

impl SettingsStore {
    /// Load settings from `path`, generating and persisting a device uuid
    /// on first use.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let mut settings = load_settings(&path)?;
        if settings.ensure_device_uuid() {
            save_settings(&path, &settings)?;
            info!(path = %path.display(), "generated device uuid");
        }
        debug!(path = %path.display(), display_name = %settings.display_name, "settings loaded");

        let (tx, _) = watch::channel(settings);
        Ok(Self {
            path: Some(path),
            tx,
        })
    }

    /// [`open`](Self::open) at the platform config path.
    pub fn open_default() -> Result<Self, ConfigError> {
        Self::open(crate::config_path())
    }

    /// A store that never touches the filesystem.
    pub fn in_memory(mut settings: Settings) -> Result<Self, ConfigError> {
        settings.validate()?;
        settings.ensure_device_uuid();
        let (tx, _) = watch::channel(settings);
        Ok(Self { path: None, tx })
    }

    /// Backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn current(&self) -> Settings {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Settings> {
        self.tx.subscribe()
    }

    /// The settings as a [`DeviceSettings`] stream, starting with the
    /// current value. Intermediate values may coalesce; the latest always
    /// arrives.
    pub fn device_updates(&self) -> DeviceUpdates {
        DeviceUpdates {
            inner: WatchStream::new(self.tx.subscribe()),
        }
    }

    /// Apply `mutate` to a copy of the current settings.
    ///
    /// Invalid results are rejected without touching disk or subscribers.
    /// Unchanged results are a no-op. Returns the settings now in effect.
    pub fn update<F>(&self, mutate: F) -> Result<Settings, ConfigError>
    where
        F: FnOnce(&mut Settings),
    {
        let mut next = self.current();
        mutate(&mut next);
        next.validate()?;

        if next == *self.tx.borrow() {
            debug!("settings unchanged");
            return Ok(next);
        }

        if let Some(path) = &self.path {
            save_settings(path, &next)?;
        }
        self.tx.send_replace(next.clone());
        info!(
            display_name = %next.display_name,
            role = %next.role,
            profile = %next.profile,
            "settings updated"
        );
        Ok(next)
    }
}

// ── DeviceUpdates ───────────────────────────────────────────────────

/// Stream of [`DeviceSettings`] derived from a [`SettingsStore`].
///
/// Ends when the store is dropped.
pub struct DeviceUpdates {
    inner: WatchStream<Settings>,
}

impl Stream for DeviceUpdates {
    type Item = DeviceSettings;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner)
            .poll_next(cx)
            .map(|next| next.map(|settings| settings.device_settings()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use pretty_assertions::assert_eq;
    use uwbctl_core::Role;

    #[test]
    fn in_memory_store_assigns_uuid() {
        let store = SettingsStore::in_memory(Settings::default()).unwrap();
        assert!(store.current().device_uuid.is_some());
        assert!(store.path().is_none());
    }

    #[test]
    fn in_memory_store_rejects_invalid_settings() {
        let settings = Settings {
            display_name: String::new(),
            ..Settings::default()
        };
        assert!(SettingsStore::in_memory(settings).is_err());
    }

    #[test]
    fn invalid_update_leaves_store_untouched() {
        let store = SettingsStore::in_memory(Settings::default()).unwrap();
        let before = store.current();

        let err = store.update(|s| s.display_name = "a|b".into());

        assert!(err.is_err());
        assert_eq!(store.current(), before);
    }

    #[test]
    fn unchanged_update_does_not_notify() {
        let store = SettingsStore::in_memory(Settings::default()).unwrap();
        let rx = store.subscribe();

        store.update(|_| {}).unwrap();

        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn device_updates_start_with_current_value() {
        let store = SettingsStore::in_memory(Settings::default()).unwrap();
        let uuid = store.current().device_uuid.unwrap();
        let mut updates = store.device_updates();

        let first = updates.next().await.unwrap();
        assert_eq!(first.device_uuid, uuid);
        assert_eq!(first.role, Role::Initiator);

        store.update(|s| s.role = Role::Responder).unwrap();
        let second = updates.next().await.unwrap();
        assert_eq!(second.role, Role::Responder);
        assert_eq!(second.device_uuid, uuid);
    }

    #[tokio::test]
    async fn device_updates_end_with_the_store() {
        let store = SettingsStore::in_memory(Settings::default()).unwrap();
        let mut updates = store.device_updates();
        updates.next().await.unwrap();

        drop(store);

        assert!(updates.next().await.is_none());
    }
}
