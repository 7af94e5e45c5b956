//! Ranging session control between `uwbctl-backend` and UI consumers (CLI).
//!
//! - **[`RangingController`]**: the session state machine. Owns the local
//!   [`EndpointIdentity`], the [`SessionConfig`] (role + profile), the
//!   resolved backend scope, and the running flag. [`start()`](RangingController::start)
//!   spawns a task forwarding backend events; [`stop()`](RangingController::stop)
//!   cancels and joins it. Role, profile, and identity mutators stop the
//!   session and re-resolve the scope before returning.
//!
//! - **[`ScopeFactory`]**: maps identity + configuration onto the right
//!   backend call and rejects combinations the radio cannot serve.
//!
//! - **[`ResultStream`] / [`RangingResults`]**: single-slot, drop-oldest
//!   broadcast of ranging events. No replay; a slow observer only ever sees
//!   the newest event, and never one from a stopped run.
//!
//! - **[`AppContainer`]**: consumes [`DeviceSettings`] updates, builds the
//!   controller on the first one, and re-drives the mutators afterwards.

pub mod container;
pub mod controller;
pub mod error;
pub mod identity;
pub mod scope;
pub mod session;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use container::{AppContainer, DeviceSettings};
pub use controller::RangingController;
pub use error::CoreError;
pub use identity::EndpointIdentity;
pub use scope::ScopeFactory;
pub use session::{Profile, Role, SessionConfig};
pub use stream::{RangingResults, ResultStream, RunningStream};

// Backend types that show up in this crate's public API.
pub use uwbctl_backend::{
    Endpoint, RangingBackend, RangingConfig, RangingEvent, RangingPosition, SessionScope,
};
