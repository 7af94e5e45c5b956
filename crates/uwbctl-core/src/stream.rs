// ── Ranging result streams ──
//
// Live telemetry fan-out: recency over completeness. A single-slot
// broadcast buffer means a lagging observer skips straight to the newest
// event, and the producer never waits on anyone.

use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll, ready};

use futures_core::Stream;
use tokio::sync::{broadcast, watch};
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::{BroadcastStream, WatchStream};
use tracing::trace;

use uwbctl_backend::RangingEvent;

/// Slots in the broadcast buffer. One slot plus broadcast's overwrite
/// semantics gives drop-oldest coalescing.
const RESULT_BUFFER: usize = 1;

/// Generation value meaning "no run is live".
const IDLE: u64 = 0;

#[derive(Debug, Clone)]
struct TaggedEvent {
    generation: u64,
    event: Arc<RangingEvent>,
}

// ── ResultStream ─────────────────────────────────────────────────────

/// Producer side of the result fan-out.
///
/// Every ranging run gets a generation number. Only the live generation may
/// publish, so events from two runs never interleave. A run that ends on
/// its own keeps whatever observers have not read yet; a run that was
/// [retired](Self::retire) has its buffered events discarded.
#[derive(Debug, Clone)]
pub struct ResultStream {
    tx: broadcast::Sender<TaggedEvent>,
    live: Arc<AtomicU64>,
    /// Highest retired generation. Observers skip anything at or below it.
    retired: Arc<AtomicU64>,
}

impl ResultStream {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(RESULT_BUFFER);
        Self {
            tx,
            live: Arc::new(AtomicU64::new(IDLE)),
            retired: Arc::new(AtomicU64::new(IDLE)),
        }
    }

    /// Make `generation` the only one allowed to publish.
    pub fn open(&self, generation: u64) {
        debug_assert_ne!(generation, IDLE, "generation 0 is reserved for idle");
        self.live.store(generation, Ordering::Release);
    }

    /// Stop `generation` from publishing. Events it already published stay
    /// deliverable. Returns `false` if it was no longer live, i.e. someone
    /// else already closed it or a newer run took over.
    pub fn close(&self, generation: u64) -> bool {
        self.live
            .compare_exchange(generation, IDLE, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Close `generation` and discard every event of it, or of any older
    /// run, that an observer has not read yet.
    pub fn retire(&self, generation: u64) {
        self.close(generation);
        self.retired.fetch_max(generation, Ordering::AcqRel);
    }

    /// The generation currently allowed to publish, if any.
    pub fn live_generation(&self) -> Option<u64> {
        match self.live.load(Ordering::Acquire) {
            IDLE => None,
            generation => Some(generation),
        }
    }

    /// Best-effort publish. Returns `true` if at least one observer was
    /// subscribed; stale generations and empty audiences drop silently.
    pub fn publish(&self, generation: u64, event: RangingEvent) -> bool {
        if self.live.load(Ordering::Acquire) != generation {
            trace!(generation, "dropping event from a retired run");
            return false;
        }
        self.tx
            .send(TaggedEvent {
                generation,
                event: Arc::new(event),
            })
            .is_ok()
    }

    /// Join the fan-out. Nothing published before this call is replayed.
    pub fn subscribe(&self) -> RangingResults {
        RangingResults {
            inner: BroadcastStream::new(self.tx.subscribe()),
            retired: Arc::clone(&self.retired),
        }
    }

    pub fn observer_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ResultStream {
    fn default() -> Self {
        Self::new()
    }
}

// ── RangingResults ───────────────────────────────────────────────────

/// Observer side of the result fan-out.
///
/// Ends only when the owning controller is gone; a run that stops or fails
/// simply stops producing.
pub struct RangingResults {
    inner: BroadcastStream<TaggedEvent>,
    retired: Arc<AtomicU64>,
}

impl Stream for RangingResults {
    type Item = Arc<RangingEvent>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            match ready!(Pin::new(&mut self.inner).poll_next(cx)) {
                None => return Poll::Ready(None),
                Some(Ok(tagged)) => {
                    if tagged.generation > self.retired.load(Ordering::Acquire) {
                        return Poll::Ready(Some(tagged.event));
                    }
                    trace!(generation = tagged.generation, "skipping stale ranging event");
                }
                Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                    trace!(skipped, "observer lagged, coalescing to newest event");
                }
            }
        }
    }
}

// ── RunningStream ────────────────────────────────────────────────────

/// `Stream` adapter over the controller's running flag.
///
/// Yields the current value first, then every change.
pub struct RunningStream {
    inner: WatchStream<bool>,
}

impl RunningStream {
    pub(crate) fn new(receiver: watch::Receiver<bool>) -> Self {
        Self {
            inner: WatchStream::new(receiver),
        }
    }
}

impl Stream for RunningStream {
    type Item = bool;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
