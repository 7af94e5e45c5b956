// ── Core error types ──
//
// Errors surfaced by the controller and container. Backend failures are
// carried through unchanged; this layer never retries them.

use thiserror::Error;

use crate::session::{Profile, Role};

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Configuration errors ─────────────────────────────────────────
    #[error("Profile {profile} cannot be used by a {role}: it requires initiator-only setup")]
    UnsupportedCombination { role: Role, profile: Profile },

    // ── Lifecycle errors ─────────────────────────────────────────────
    /// No scope is resolved, either because construction never finished
    /// or because the last resolution failed.
    #[error("No ranging scope resolved")]
    NotResolved,

    /// The settings pipeline ended before a controller could be built.
    #[error("Settings source closed before the ranging controller was ready")]
    SettingsClosed,

    // ── Backend errors (carried as-is) ───────────────────────────────
    #[error(transparent)]
    Backend(#[from] uwbctl_backend::Error),
}

impl CoreError {
    /// Returns `true` if re-driving the mutators with a different
    /// configuration could clear this error.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::UnsupportedCombination { .. } | Self::NotResolved)
    }
}
