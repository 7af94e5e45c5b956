// ── Settings-driven container ──
//
// Bridges the settings source to the controller. Construction is deferred
// until the first settings value arrives; after that every update re-drives
// the controller's mutators.

use std::sync::Arc;

use futures_core::Stream;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use uwbctl_backend::RangingBackend;

use crate::controller::RangingController;
use crate::error::CoreError;
use crate::session::{Profile, Role, SessionConfig};

/// Separator between display name and device uuid in an endpoint id.
pub const ENDPOINT_ID_SEPARATOR: char = '|';

type ReadyCallback = Box<dyn FnOnce() + Send>;

// ── DeviceSettings ───────────────────────────────────────────────

/// One settings record as published by the settings store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSettings {
    pub display_name: String,
    pub device_uuid: Uuid,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub profile: Profile,
}

impl DeviceSettings {
    /// `display_name|device_uuid`, opaque to everything below the container.
    pub fn endpoint_id(&self) -> String {
        format!(
            "{}{ENDPOINT_ID_SEPARATOR}{}",
            self.display_name, self.device_uuid
        )
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::new(self.role, self.profile)
    }
}

// ── AppContainer ─────────────────────────────────────────────────

/// Owns the settings pipeline and, once available, the controller.
///
/// The controller is never handed out half-built: use
/// [`controller()`](Self::controller) for a non-blocking peek or
/// [`ready()`](Self::ready) to wait for the first settings value.
pub struct AppContainer {
    controller: watch::Receiver<Option<RangingController>>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl AppContainer {
    /// Spawn the settings pipeline.
    ///
    /// `on_ready` fires exactly once, right after the controller is built
    /// from the first usable settings value.
    pub fn launch<S, F>(backend: Arc<dyn RangingBackend>, settings: S, on_ready: F) -> Self
    where
        S: Stream<Item = DeviceSettings> + Send + Unpin + 'static,
        F: FnOnce() + Send + 'static,
    {
        let (slot, controller) = watch::channel(None);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(settings_loop(
            backend,
            settings,
            slot,
            Box::new(on_ready),
            cancel.clone(),
        ));

        Self {
            controller,
            cancel,
            task: Mutex::new(Some(task)),
        }
    }

    /// The controller, if the first settings value has been applied.
    pub fn controller(&self) -> Option<RangingController> {
        self.controller.borrow().clone()
    }

    /// Wait until the controller exists.
    ///
    /// Fails with [`CoreError::SettingsClosed`] if the settings source ends
    /// (or the container shuts down) before a controller could be built.
    pub async fn ready(&self) -> Result<RangingController, CoreError> {
        let mut rx = self.controller.clone();
        let slot = rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| CoreError::SettingsClosed)?;
        (*slot).clone().ok_or(CoreError::SettingsClosed)
    }

    /// Stop consuming settings, then stop ranging and release the scope.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        if let Some(task) = self.task.lock().await.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "settings pipeline task failed");
            }
        }
        if let Some(controller) = self.controller() {
            controller.shutdown().await;
        }
        debug!("container shut down");
    }
}

impl Drop for AppContainer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ── Settings pipeline ────────────────────────────────────────────

async fn settings_loop<S>(
    backend: Arc<dyn RangingBackend>,
    mut settings: S,
    slot: watch::Sender<Option<RangingController>>,
    on_ready: ReadyCallback,
    cancel: CancellationToken,
) where
    S: Stream<Item = DeviceSettings> + Send + Unpin + 'static,
{
    let mut on_ready = Some(on_ready);

    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            next = settings.next() => next,
        };
        let Some(update) = next else {
            debug!("settings source closed");
            break;
        };
        apply_settings(&backend, &slot, &mut on_ready, update).await;
    }
}

async fn apply_settings(
    backend: &Arc<dyn RangingBackend>,
    slot: &watch::Sender<Option<RangingController>>,
    on_ready: &mut Option<ReadyCallback>,
    update: DeviceSettings,
) {
    let id = update.endpoint_id();
    let current = slot.borrow().clone();

    let Some(controller) = current else {
        match RangingController::new(Arc::clone(backend), id, update.session_config()) {
            Ok(controller) => {
                slot.send_replace(Some(controller));
                if let Some(callback) = on_ready.take() {
                    callback();
                }
                info!(display_name = %update.display_name, "ranging controller constructed");
            }
            Err(e) => {
                warn!(error = %e, "cannot build ranging controller, waiting for the next settings update");
            }
        }
        return;
    };

    if let Err(e) = controller.set_config(update.session_config()).await {
        warn!(error = %e, role = %update.role, profile = %update.profile, "session config update rejected");
    }
    if let Err(e) = controller.set_identity(id).await {
        warn!(error = %e, "identity update failed");
    }
}
