//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use uwbctl_backend::Error as BackendError;
use uwbctl_config::ConfigError;
use uwbctl_core::{CoreError, Profile, Role};

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CONFIG: i32 = 3;
    pub const BACKEND: i32 = 4;
    pub const SESSION_ENDED: i32 = 5;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Session ──────────────────────────────────────────────────────
    #[error("{role} cannot use the {profile} profile")]
    #[diagnostic(
        code(uwbctl::unsupported_combination),
        help(
            "Only an initiator can set up a multicast session.\n\
             Try: --role initiator, or --profile unicast-precision"
        )
    )]
    UnsupportedCombination { role: Role, profile: Profile },

    #[error("No ranging scope is available")]
    #[diagnostic(
        code(uwbctl::not_resolved),
        help("The last reconfiguration failed. Re-run with -v to see why.")
    )]
    NotResolved,

    #[error("Ranging session ended unexpectedly")]
    #[diagnostic(
        code(uwbctl::session_ended),
        help("The backend stopped the run. Re-run with -v to see the reason.")
    )]
    SessionEnded,

    #[error("Settings source closed before a controller was built")]
    #[diagnostic(code(uwbctl::settings_closed))]
    SettingsClosed,

    // ── Backend ──────────────────────────────────────────────────────
    #[error("Ranging backend error: {source}")]
    #[diagnostic(code(uwbctl::backend))]
    Backend {
        #[source]
        source: BackendError,
    },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(uwbctl::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Could not load settings from {path}")]
    #[diagnostic(
        code(uwbctl::config),
        help(
            "Fix or remove the settings file, or point --config elsewhere.\n\
             Expected at: {path}"
        )
    )]
    Config {
        path: String,
        #[source]
        source: ConfigError,
    },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(code(uwbctl::io))]
    Io(#[from] std::io::Error),

    #[error("Failed to render JSON: {0}")]
    #[diagnostic(code(uwbctl::json))]
    Json(#[from] serde_json::Error),

    #[error("Failed to render YAML: {0}")]
    #[diagnostic(code(uwbctl::yaml))]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to render TOML: {0}")]
    #[diagnostic(code(uwbctl::toml))]
    Toml(#[from] toml::ser::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::UnsupportedCombination { .. } | Self::Validation { .. } => exit_code::USAGE,
            Self::Config { .. } => exit_code::CONFIG,
            Self::Backend { .. } | Self::NotResolved => exit_code::BACKEND,
            Self::SessionEnded => exit_code::SESSION_ENDED,
            _ => exit_code::GENERAL,
        }
    }

    /// Wrap a settings failure for the file at `path`. Validation problems
    /// stay usage errors.
    pub fn from_config(err: ConfigError, path: &std::path::Path) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            other => Self::Config {
                path: path.display().to_string(),
                source: other,
            },
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::UnsupportedCombination { role, profile } => {
                Self::UnsupportedCombination { role, profile }
            }
            CoreError::NotResolved => Self::NotResolved,
            CoreError::SettingsClosed => Self::SettingsClosed,
            CoreError::Backend(source) => Self::Backend { source },
        }
    }
}
