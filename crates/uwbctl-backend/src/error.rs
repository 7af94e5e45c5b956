use thiserror::Error;

/// Top-level error type for the `uwbctl-backend` crate.
///
/// Covers every failure a backend can report: scope allocation,
/// the event-producing session, and out-of-band messaging.
/// `uwbctl-core` wraps these without reinterpreting them.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    // ── Scope allocation ────────────────────────────────────────────
    /// The radio is absent, disabled, or refused to hand out a scope.
    #[error("Ranging backend unavailable: {0}")]
    Unavailable(String),

    /// The backend does not know the requested parameter preset.
    #[error("Unsupported ranging configuration id {config_id}")]
    UnsupportedConfig { config_id: u8 },

    // ── Session ─────────────────────────────────────────────────────
    /// The event-producing session failed mid-flight.
    #[error("Ranging session failed: {message}")]
    SessionFailed { message: String },

    /// No session is currently running on this scope.
    #[error("No active ranging session on this scope")]
    SessionNotActive,

    // ── Out-of-band messaging ───────────────────────────────────────
    /// The peer is not reachable over the side channel.
    #[error("Peer unreachable: {peer}")]
    PeerUnreachable { peer: String },

    /// Out-of-band payloads are small by nature; the backend caps them.
    #[error("Out-of-band payload too large: {len} bytes (max {max})")]
    PayloadTooLarge { len: usize, max: usize },
}

impl Error {
    /// Returns `true` if the failure is tied to the session rather than the scope.
    pub fn is_session_failure(&self) -> bool {
        matches!(self, Self::SessionFailed { .. } | Self::SessionNotActive)
    }
}
