// ── Ranging session controller ──
//
// Owns the local identity, the session configuration, the resolved backend
// scope, and the ranging task. Every mutator runs stop → reconfigure →
// re-resolve under the state lock, so by the time it returns no event from
// the old scope can reach an observer.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use futures_util::StreamExt;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use uwbctl_backend::{Endpoint, EventStream, RangingBackend, SessionScope};

use crate::error::CoreError;
use crate::identity::EndpointIdentity;
use crate::scope::ScopeFactory;
use crate::session::{Profile, Role, SessionConfig};
use crate::stream::{RangingResults, ResultStream, RunningStream};

// ── RangingController ────────────────────────────────────────────

/// The session state machine: `Idle` until [`start()`](Self::start),
/// `Running` until [`stop()`](Self::stop) or until the backend run ends.
///
/// Cheaply cloneable via `Arc<ControllerInner>`. Mutators are serialized by
/// an internal lock, so concurrent callers are safe, but the intended usage
/// is a single update pipeline driving them in order.
///
/// A restart never resumes on its own: after a role, profile, or identity
/// change the controller is `Idle` and the caller decides when to start.
#[derive(Clone)]
pub struct RangingController {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    factory: ScopeFactory,
    state: Mutex<SessionState>,
    running: Arc<watch::Sender<bool>>,
    results: ResultStream,
    /// Parent of every run's token; cancelled when the controller is dropped.
    cancel: CancellationToken,
    /// Last generation handed out. Generation 0 is never used.
    generations: AtomicU64,
}

struct SessionState {
    identity: EndpointIdentity,
    config: SessionConfig,
    /// `None` only after a failed resolution. Shared so a send can run
    /// without holding the state lock.
    scope: Option<Arc<dyn SessionScope>>,
    active: Option<ActiveRun>,
}

struct ActiveRun {
    generation: u64,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl RangingController {
    /// Build a controller for `id` and resolve its first scope.
    ///
    /// Starts `Idle`. Fails if the backend refuses the scope or the
    /// configuration is an unsupported combination.
    pub fn new(
        backend: Arc<dyn RangingBackend>,
        id: impl Into<String>,
        config: SessionConfig,
    ) -> Result<Self, CoreError> {
        let factory = ScopeFactory::new(backend);
        let identity = EndpointIdentity::new(id);
        let scope = factory.resolve_scope(&identity, config.role, config.profile)?;
        let (running, _) = watch::channel(false);

        info!(endpoint = %identity, role = %config.role, profile = %config.profile, "ranging controller ready");

        Ok(Self {
            inner: Arc::new(ControllerInner {
                factory,
                state: Mutex::new(SessionState {
                    identity,
                    config,
                    scope: Some(Arc::from(scope)),
                    active: None,
                }),
                running: Arc::new(running),
                results: ResultStream::new(),
                cancel: CancellationToken::new(),
                generations: AtomicU64::new(0),
            }),
        })
    }

    // ── Observation ──────────────────────────────────────────────

    /// Whether a ranging run is live, as of the last completed transition.
    pub fn is_running(&self) -> bool {
        *self.inner.running.borrow()
    }

    /// Raw receiver for the running flag.
    pub fn running_receiver(&self) -> watch::Receiver<bool> {
        self.inner.running.subscribe()
    }

    /// Stream of the running flag, starting with its current value.
    pub fn watch_running(&self) -> RunningStream {
        RunningStream::new(self.inner.running.subscribe())
    }

    /// Subscribe to ranging events. May be called any number of times;
    /// each subscriber only sees events published after it joined.
    pub fn observe_ranging_results(&self) -> RangingResults {
        self.inner.results.subscribe()
    }

    pub async fn identity(&self) -> EndpointIdentity {
        self.inner.state.lock().await.identity.clone()
    }

    pub async fn config(&self) -> SessionConfig {
        self.inner.state.lock().await.config
    }

    /// Whether a scope is currently resolved.
    pub async fn is_resolved(&self) -> bool {
        self.inner.state.lock().await.scope.is_some()
    }

    // ── Start / stop ─────────────────────────────────────────────

    /// Start ranging. No-op if already running.
    ///
    /// Returns as soon as the run is spawned; events arrive on
    /// [`observe_ranging_results()`](Self::observe_ranging_results).
    pub async fn start(&self) -> Result<(), CoreError> {
        let mut state = self.inner.state.lock().await;

        if let Some(run) = &state.active {
            let live = self.inner.results.live_generation() == Some(run.generation);
            if live && !run.handle.is_finished() {
                debug!(generation = run.generation, "start requested while running");
                return Ok(());
            }
        }
        // The previous run ended on its own; reap it before opening a new one.
        if let Some(run) = state.active.take() {
            join_run(run).await;
        }

        let scope = state.scope.as_ref().ok_or(CoreError::NotResolved)?;
        let events = scope.prepare_session();

        let generation = self.inner.generations.fetch_add(1, Ordering::AcqRel) + 1;
        self.inner.results.open(generation);
        set_running(&self.inner.running, true);

        let cancel = self.inner.cancel.child_token();
        let handle = tokio::spawn(run_session(
            generation,
            events,
            self.inner.results.clone(),
            Arc::clone(&self.inner.running),
            cancel.clone(),
        ));
        state.active = Some(ActiveRun {
            generation,
            cancel,
            handle,
        });

        info!(
            generation,
            endpoint = %state.identity,
            role = %state.config.role,
            profile = %state.config.profile,
            "ranging started"
        );
        Ok(())
    }

    /// Stop ranging. No-op if idle.
    ///
    /// Does not return until the run's task has finished, so a following
    /// [`start()`](Self::start) always opens a fresh run.
    pub async fn stop(&self) {
        let mut state = self.inner.state.lock().await;
        self.stop_locked(&mut state).await;
    }

    async fn stop_locked(&self, state: &mut SessionState) {
        let Some(run) = state.active.take() else {
            // Nothing to cancel, but an earlier run may still have unread
            // events buffered.
            self.inner
                .results
                .retire(self.inner.generations.load(Ordering::Acquire));
            debug!("stop requested while idle");
            return;
        };

        let generation = run.generation;
        self.inner.results.retire(generation);
        run.cancel.cancel();
        join_run(run).await;
        set_running(&self.inner.running, false);

        info!(generation, "ranging stopped");
    }

    // ── Reconfiguration ──────────────────────────────────────────

    /// Switch role. No-op if unchanged and a scope is resolved.
    pub async fn set_role(&self, role: Role) -> Result<(), CoreError> {
        let mut state = self.inner.state.lock().await;
        let config = SessionConfig::new(role, state.config.profile);
        self.reconfigure_locked(&mut state, config).await
    }

    /// Switch profile. No-op if unchanged and a scope is resolved.
    pub async fn set_profile(&self, profile: Profile) -> Result<(), CoreError> {
        let mut state = self.inner.state.lock().await;
        let config = SessionConfig::new(state.config.role, profile);
        self.reconfigure_locked(&mut state, config).await
    }

    /// Switch role and profile together with a single restart.
    pub async fn set_config(&self, config: SessionConfig) -> Result<(), CoreError> {
        let mut state = self.inner.state.lock().await;
        self.reconfigure_locked(&mut state, config).await
    }

    /// Adopt a new endpoint id. No-op if the id is unchanged and a scope is
    /// resolved; otherwise a new identity generation (fresh token) is created.
    pub async fn set_identity(&self, id: impl Into<String>) -> Result<(), CoreError> {
        let id = id.into();
        let mut state = self.inner.state.lock().await;

        if state.identity.id() == id && state.scope.is_some() {
            debug!(endpoint = %id, "identity unchanged");
            return Ok(());
        }

        self.stop_locked(&mut state).await;
        state.identity = EndpointIdentity::new(id);
        info!(endpoint = %state.identity, "endpoint identity changed");
        self.resolve_locked(&mut state)
    }

    async fn reconfigure_locked(
        &self,
        state: &mut SessionState,
        config: SessionConfig,
    ) -> Result<(), CoreError> {
        if state.config == config && state.scope.is_some() {
            debug!(role = %config.role, profile = %config.profile, "session config unchanged");
            return Ok(());
        }

        self.stop_locked(state).await;
        state.config = config;
        info!(role = %config.role, profile = %config.profile, "session config changed");
        self.resolve_locked(state)
    }

    /// Drop the current scope, then resolve a new one. On failure the
    /// controller is left idle with no scope.
    fn resolve_locked(&self, state: &mut SessionState) -> Result<(), CoreError> {
        state.scope = None;
        let scope = self.inner.factory.resolve_scope(
            &state.identity,
            state.config.role,
            state.config.profile,
        )?;
        state.scope = Some(Arc::from(scope));
        Ok(())
    }

    // ── Out-of-band messaging ────────────────────────────────────

    /// Send a side-channel payload to `peer` through the current scope.
    ///
    /// Backend failures are returned unchanged and never retried. The send
    /// runs outside the state lock, so a slow peer does not hold up
    /// [`stop()`](Self::stop) or reconfiguration.
    pub async fn send_out_of_band(
        &self,
        peer: &Endpoint,
        payload: impl Into<Bytes>,
    ) -> Result<(), CoreError> {
        let scope = {
            let state = self.inner.state.lock().await;
            state.scope.clone().ok_or(CoreError::NotResolved)?
        };
        scope.send_message(peer, payload.into()).await?;
        Ok(())
    }

    // ── Teardown ─────────────────────────────────────────────────

    /// Stop ranging and release the scope. Any later start or send fails
    /// with [`CoreError::NotResolved`] until a mutator re-resolves.
    pub async fn shutdown(&self) {
        let mut state = self.inner.state.lock().await;
        self.stop_locked(&mut state).await;
        state.scope = None;
        debug!("ranging controller shut down");
    }
}

impl std::fmt::Debug for RangingController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RangingController")
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl Drop for ControllerInner {
    fn drop(&mut self) {
        // Runs hold child tokens; cancelling the parent ends them all.
        self.cancel.cancel();
    }
}

// ── Ranging task ─────────────────────────────────────────────────

enum RunOutcome {
    Cancelled,
    Ended,
    Failed(uwbctl_backend::Error),
}

/// Forward one run's events until cancelled or until the backend stops.
///
/// A run that ends on its own marks the controller idle, unless a newer
/// run has already taken over. Events it published before ending remain
/// deliverable, and the scope is left intact either way.
async fn run_session(
    generation: u64,
    mut events: EventStream,
    results: ResultStream,
    running: Arc<watch::Sender<bool>>,
    cancel: CancellationToken,
) {
    let outcome = loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break RunOutcome::Cancelled,
            next = events.next() => match next {
                Some(Ok(event)) => {
                    results.publish(generation, event);
                }
                Some(Err(e)) => break RunOutcome::Failed(e),
                None => break RunOutcome::Ended,
            },
        }
    };

    // Release the run's backend resources before anyone sees it idle.
    drop(events);

    match outcome {
        RunOutcome::Cancelled => {
            debug!(generation, "ranging run cancelled");
            return;
        }
        RunOutcome::Ended => info!(generation, "ranging run ended by backend"),
        RunOutcome::Failed(e) => warn!(generation, error = %e, "ranging run failed"),
    }

    if results.close(generation) {
        set_running(&running, false);
    }
}

async fn join_run(run: ActiveRun) {
    if let Err(e) = run.handle.await {
        if e.is_panic() {
            warn!(generation = run.generation, error = %e, "ranging task panicked");
        }
    }
}

fn set_running(running: &watch::Sender<bool>, value: bool) {
    // `send_if_modified` updates even with zero receivers and only wakes
    // observers on an actual change.
    running.send_if_modified(|current| {
        let changed = *current != value;
        *current = value;
        changed
    });
}
