// ── Backend seam ──
//
// The controller only ever talks to a backend through these two traits.
// A `SessionScope` is bound to one local endpoint and one parameter preset
// for its whole life; reconfiguration means asking for a new scope.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures_core::Stream;

use crate::error::Error;
use crate::types::{Endpoint, RangingConfig, RangingEvent};

/// Event sequence produced by one ranging run.
///
/// Dropping the stream ends the run and releases whatever the backend
/// allocated for it. The scope itself stays usable.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<RangingEvent, Error>> + Send + 'static>>;

/// A backend-resolved handle bound to one local endpoint and preset.
#[async_trait]
pub trait SessionScope: Send + Sync {
    /// The local endpoint this scope was created for.
    fn local_endpoint(&self) -> &Endpoint;

    /// Open a ranging run. Nothing happens on the radio until the
    /// returned stream is polled.
    fn prepare_session(&self) -> EventStream;

    /// Send a small payload to a peer over the side channel.
    async fn send_message(&self, peer: &Endpoint, payload: Bytes) -> Result<(), Error>;
}

/// Factory for session scopes.
///
/// Each call yields an independent scope. Callers own the result and
/// must drop the previous scope themselves.
pub trait RangingBackend: Send + Sync {
    /// Scope for the side that drives the session.
    fn controller_scope(
        &self,
        local: Endpoint,
        config: RangingConfig,
    ) -> Result<Box<dyn SessionScope>, Error>;

    /// Scope for the side that answers. The preset is dictated by the
    /// controller during negotiation.
    fn controlee_scope(&self, local: Endpoint) -> Result<Box<dyn SessionScope>, Error>;
}
