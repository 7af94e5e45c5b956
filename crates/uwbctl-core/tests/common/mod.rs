// Scriptable in-memory backend shared by the integration tests.
#![allow(dead_code, clippy::unwrap_used)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use uwbctl_backend::{
    Endpoint, Error, EventStream, RangingBackend, RangingConfig, RangingEvent, RangingPosition,
    SessionScope,
};

/// One call into the backend's scope factory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveCall {
    Controller {
        local: Endpoint,
        config: RangingConfig,
    },
    Controlee {
        local: Endpoint,
    },
}

impl ResolveCall {
    pub fn local(&self) -> &Endpoint {
        match self {
            Self::Controller { local, .. } | Self::Controlee { local } => local,
        }
    }
}

type EventSender = mpsc::UnboundedSender<Result<RangingEvent, Error>>;

#[derive(Default)]
struct FakeState {
    resolves: Mutex<Vec<ResolveCall>>,
    sessions: Mutex<Vec<EventSender>>,
    sent: Mutex<Vec<(Endpoint, Bytes)>>,
    send_failure: Mutex<Option<Error>>,
    refuse_scopes: Mutex<Option<Error>>,
    hang_sends: AtomicBool,
    opened: AtomicUsize,
    closed: AtomicUsize,
}

/// Backend whose runs are fed by hand through [`FakeBackend::emit`].
#[derive(Clone, Default)]
pub struct FakeBackend {
    state: Arc<FakeState>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared(&self) -> Arc<dyn RangingBackend> {
        Arc::new(self.clone())
    }

    pub fn resolves(&self) -> Vec<ResolveCall> {
        self.state.resolves.lock().unwrap().clone()
    }

    pub fn resolve_count(&self) -> usize {
        self.state.resolves.lock().unwrap().len()
    }

    pub fn last_resolve(&self) -> ResolveCall {
        self.state.resolves.lock().unwrap().last().cloned().unwrap()
    }

    /// Runs opened via `prepare_session`.
    pub fn sessions_opened(&self) -> usize {
        self.state.opened.load(Ordering::Acquire)
    }

    /// Runs whose event stream has been dropped.
    pub fn sessions_closed(&self) -> usize {
        self.state.closed.load(Ordering::Acquire)
    }

    pub fn live_sessions(&self) -> usize {
        self.sessions_opened() - self.sessions_closed()
    }

    /// Push an event into the most recent run. Returns `false` if that run
    /// is gone.
    pub fn emit(&self, event: RangingEvent) -> bool {
        self.send(Ok(event))
    }

    /// End the most recent run with an error.
    pub fn fail(&self, error: Error) -> bool {
        self.send(Err(error))
    }

    /// End the most recent run cleanly.
    pub fn finish(&self) {
        self.state.sessions.lock().unwrap().pop();
    }

    pub fn sent_messages(&self) -> Vec<(Endpoint, Bytes)> {
        self.state.sent.lock().unwrap().clone()
    }

    pub fn fail_sends_with(&self, error: Error) {
        *self.state.send_failure.lock().unwrap() = Some(error);
    }

    /// Make every later `send_message` wait forever.
    pub fn hang_sends(&self) {
        self.state.hang_sends.store(true, Ordering::Release);
    }

    pub fn refuse_scopes_with(&self, error: Option<Error>) {
        *self.state.refuse_scopes.lock().unwrap() = error;
    }

    fn send(&self, item: Result<RangingEvent, Error>) -> bool {
        let sessions = self.state.sessions.lock().unwrap();
        sessions.last().is_some_and(|tx| tx.send(item).is_ok())
    }

    fn scope(&self, call: ResolveCall) -> Result<Box<dyn SessionScope>, Error> {
        if let Some(err) = self.state.refuse_scopes.lock().unwrap().clone() {
            return Err(err);
        }
        let local = call.local().clone();
        self.state.resolves.lock().unwrap().push(call);
        Ok(Box::new(FakeScope {
            local,
            state: Arc::clone(&self.state),
        }))
    }
}

impl RangingBackend for FakeBackend {
    fn controller_scope(
        &self,
        local: Endpoint,
        config: RangingConfig,
    ) -> Result<Box<dyn SessionScope>, Error> {
        self.scope(ResolveCall::Controller { local, config })
    }

    fn controlee_scope(&self, local: Endpoint) -> Result<Box<dyn SessionScope>, Error> {
        self.scope(ResolveCall::Controlee { local })
    }
}

struct FakeScope {
    local: Endpoint,
    state: Arc<FakeState>,
}

struct CloseGuard(Arc<FakeState>);

impl Drop for CloseGuard {
    fn drop(&mut self) {
        self.0.closed.fetch_add(1, Ordering::AcqRel);
    }
}

#[async_trait]
impl SessionScope for FakeScope {
    fn local_endpoint(&self) -> &Endpoint {
        &self.local
    }

    fn prepare_session(&self) -> EventStream {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state.sessions.lock().unwrap().push(tx);
        self.state.opened.fetch_add(1, Ordering::AcqRel);

        let guard = CloseGuard(Arc::clone(&self.state));
        Box::pin(UnboundedReceiverStream::new(rx).map(move |item| {
            let _ = &guard;
            item
        }))
    }

    async fn send_message(&self, peer: &Endpoint, payload: Bytes) -> Result<(), Error> {
        if self.state.hang_sends.load(Ordering::Acquire) {
            std::future::pending::<()>().await;
        }
        if let Some(err) = self.state.send_failure.lock().unwrap().clone() {
            return Err(err);
        }
        self.state.sent.lock().unwrap().push((peer.clone(), payload));
        Ok(())
    }
}

// ── Fixtures ────────────────────────────────────────────────────────

pub fn peer() -> Endpoint {
    Endpoint::new("B|2222", Bytes::from_static(&[9; 8]))
}

pub fn position(distance_m: f32) -> RangingEvent {
    RangingEvent::PositionUpdated {
        endpoint: peer(),
        position: RangingPosition {
            distance_m,
            azimuth_deg: Some(0.0),
            elevation_deg: None,
            elapsed_realtime_nanos: 0,
        },
    }
}

/// Give spawned tasks a chance to run.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}
