//! In-process simulated ranging backend.
//!
//! Every run emits `EndpointFound` for the virtual peers, then a
//! `PositionUpdated` per tick following a smooth deterministic walk.
//! Out-of-band messages sent to a peer are echoed back into the active
//! run as `EndpointMessage` events.
//!
//! The backend counts the scopes it hands out and the runs that are
//! currently alive, so callers can verify that cancelling a run really
//! releases it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_stream::stream;
use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, trace};

use crate::error::Error;
use crate::scope::{EventStream, RangingBackend, SessionScope};
use crate::types::{Endpoint, RangingConfig, RangingEvent, RangingPosition};

const PEER_METADATA: &[u8] = &[0x5a; 8];
const PHASE_STEP: f32 = 0.25;

// ── SimConfig ────────────────────────────────────────────────────────

/// Tuning knobs for the simulated radio.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Time between two measurements. Default: 200ms.
    pub interval: Duration,
    /// Id of the virtual peer. Multicast scopes add a second peer
    /// with a `-2` suffix.
    pub peer_id: String,
    /// Distance the walk oscillates around, in meters.
    pub base_distance_m: f32,
    /// Largest accepted out-of-band payload.
    pub max_message_len: usize,
    /// End every run with `SessionFailed` after this many measurements.
    pub fail_after: Option<u64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(200),
            peer_id: "sim-peer|00000000-0000-0000-0000-000000000000".into(),
            base_distance_m: 1.5,
            max_message_len: 128,
            fail_after: None,
        }
    }
}

#[derive(Debug, Default)]
struct SimStats {
    scopes_created: AtomicUsize,
    live_sessions: AtomicUsize,
}

// ── SimulatedBackend ─────────────────────────────────────────────────

/// A [`RangingBackend`] that never touches a radio.
#[derive(Debug, Clone, Default)]
pub struct SimulatedBackend {
    config: Arc<SimConfig>,
    stats: Arc<SimStats>,
}

impl SimulatedBackend {
    pub fn new(config: SimConfig) -> Self {
        Self {
            config: Arc::new(config),
            stats: Arc::new(SimStats::default()),
        }
    }

    /// Number of scopes handed out so far.
    pub fn scopes_created(&self) -> usize {
        self.stats.scopes_created.load(Ordering::Acquire)
    }

    /// Number of runs whose event stream is still alive.
    pub fn live_sessions(&self) -> usize {
        self.stats.live_sessions.load(Ordering::Acquire)
    }

    /// The primary virtual peer.
    pub fn peer(&self) -> Endpoint {
        Endpoint::new(self.config.peer_id.clone(), Bytes::from_static(PEER_METADATA))
    }

    fn scope(&self, local: Endpoint, kind: ScopeKind) -> Box<dyn SessionScope> {
        self.stats.scopes_created.fetch_add(1, Ordering::AcqRel);
        debug!(local = %local, ?kind, "simulated scope created");
        Box::new(SimScope {
            local,
            kind,
            config: Arc::clone(&self.config),
            stats: Arc::clone(&self.stats),
            loopback: Arc::new(Mutex::new(None)),
        })
    }
}

impl RangingBackend for SimulatedBackend {
    fn controller_scope(
        &self,
        local: Endpoint,
        config: RangingConfig,
    ) -> Result<Box<dyn SessionScope>, Error> {
        Ok(self.scope(local, ScopeKind::Controller(config)))
    }

    fn controlee_scope(&self, local: Endpoint) -> Result<Box<dyn SessionScope>, Error> {
        Ok(self.scope(local, ScopeKind::Controlee))
    }
}

// ── SimScope ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
enum ScopeKind {
    Controller(RangingConfig),
    Controlee,
}

type LoopbackSlot = Arc<Mutex<Option<mpsc::UnboundedSender<RangingEvent>>>>;

struct SimScope {
    local: Endpoint,
    kind: ScopeKind,
    config: Arc<SimConfig>,
    stats: Arc<SimStats>,
    loopback: LoopbackSlot,
}

impl SimScope {
    fn peers(&self) -> Vec<Endpoint> {
        let metadata = Bytes::from_static(PEER_METADATA);
        let mut peers = vec![Endpoint::new(self.config.peer_id.clone(), metadata.clone())];
        if matches!(self.kind, ScopeKind::Controller(RangingConfig::MulticastDsTwr)) {
            peers.push(Endpoint::new(format!("{}-2", self.config.peer_id), metadata));
        }
        peers
    }
}

#[async_trait]
impl SessionScope for SimScope {
    fn local_endpoint(&self) -> &Endpoint {
        &self.local
    }

    fn prepare_session(&self) -> EventStream {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let guard = SessionGuard::open(Arc::clone(&self.stats), Arc::clone(&self.loopback), tx);
        let peers = self.peers();
        let config = Arc::clone(&self.config);
        // Angle of arrival needs the controller's antenna array.
        let with_angles = matches!(self.kind, ScopeKind::Controller(_));

        Box::pin(stream! {
            let _guard = guard;
            for peer in &peers {
                yield Ok(RangingEvent::EndpointFound { endpoint: peer.clone() });
            }

            let started = Instant::now();
            let mut ticker = tokio::time::interval(config.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            let mut step: u64 = 0;
            let mut phase: f32 = 0.0;
            loop {
                let tick = tokio::select! {
                    _ = ticker.tick() => Tick::Measure,
                    msg = rx.recv() => Tick::Loopback(msg),
                };

                match tick {
                    Tick::Measure => {
                        if config.fail_after.is_some_and(|limit| step >= limit) {
                            yield Err(Error::SessionFailed {
                                message: format!("simulated radio failure after {step} measurements"),
                            });
                            break;
                        }
                        let Some(peer) = peers.get(peers_index(step, peers.len())) else {
                            break;
                        };
                        step += 1;
                        phase += PHASE_STEP;
                        let elapsed = u64::try_from(started.elapsed().as_nanos()).unwrap_or(u64::MAX);
                        yield Ok(RangingEvent::PositionUpdated {
                            endpoint: peer.clone(),
                            position: walk(config.base_distance_m, phase, with_angles, elapsed),
                        });
                    }
                    Tick::Loopback(Some(event)) => yield Ok(event),
                    Tick::Loopback(None) => break,
                }
            }
        })
    }

    async fn send_message(&self, peer: &Endpoint, payload: Bytes) -> Result<(), Error> {
        if payload.len() > self.config.max_message_len {
            return Err(Error::PayloadTooLarge {
                len: payload.len(),
                max: self.config.max_message_len,
            });
        }
        if !self.peers().iter().any(|p| p.id == peer.id) {
            return Err(Error::PeerUnreachable {
                peer: peer.id.clone(),
            });
        }

        let slot = self.loopback.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(tx) = slot.as_ref() else {
            return Err(Error::SessionNotActive);
        };
        trace!(peer = %peer, len = payload.len(), "echoing out-of-band message");
        tx.send(RangingEvent::EndpointMessage {
            endpoint: peer.clone(),
            payload,
        })
        .map_err(|_| Error::SessionNotActive)
    }
}

enum Tick {
    Measure,
    Loopback(Option<RangingEvent>),
}

fn peers_index(step: u64, len: usize) -> usize {
    let len = u64::try_from(len.max(1)).unwrap_or(1);
    usize::try_from(step % len).unwrap_or(0)
}

fn walk(base: f32, phase: f32, with_angles: bool, elapsed_realtime_nanos: u64) -> RangingPosition {
    RangingPosition {
        distance_m: (base + 0.5 * phase.sin()).max(0.0),
        azimuth_deg: with_angles.then(|| 30.0 * phase.cos()),
        elevation_deg: with_angles.then(|| 5.0 * (phase * 0.5).sin()),
        elapsed_realtime_nanos,
    }
}

// ── Run bookkeeping ──────────────────────────────────────────────────

/// Lives inside the event stream; dropping the stream drops the guard.
struct SessionGuard {
    stats: Arc<SimStats>,
    loopback: LoopbackSlot,
    tx: mpsc::UnboundedSender<RangingEvent>,
}

impl SessionGuard {
    fn open(
        stats: Arc<SimStats>,
        loopback: LoopbackSlot,
        tx: mpsc::UnboundedSender<RangingEvent>,
    ) -> Self {
        stats.live_sessions.fetch_add(1, Ordering::AcqRel);
        *loopback.lock().unwrap_or_else(PoisonError::into_inner) = Some(tx.clone());
        Self {
            stats,
            loopback,
            tx,
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let mut slot = self.loopback.lock().unwrap_or_else(PoisonError::into_inner);
        // A newer run on the same scope owns the slot now; leave it alone.
        if slot.as_ref().is_some_and(|current| current.same_channel(&self.tx)) {
            *slot = None;
        }
        self.stats.live_sessions.fetch_sub(1, Ordering::AcqRel);
        debug!("simulated session released");
    }
}
