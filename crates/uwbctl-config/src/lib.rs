//! Device settings for uwbctl.
//!
//! One TOML file holds the device's display name, its persistent uuid, the
//! preferred role and profile, and the simulated-radio knobs. Values are
//! layered defaults → file → `UWBCTL_*` environment, and handed to the core
//! container through a watchable [`SettingsStore`].

mod store;

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use uwbctl_core::container::ENDPOINT_ID_SEPARATOR;
use uwbctl_core::{DeviceSettings, Profile, Role, SessionConfig};

pub use store::{DeviceUpdates, SettingsStore};

/// Prefix for environment overrides, e.g. `UWBCTL_DISPLAY_NAME`.
/// Nested keys use a double underscore: `UWBCTL_SIMULATION__INTERVAL_MS`.
pub const ENV_PREFIX: &str = "UWBCTL_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize settings: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("settings loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

impl ConfigError {
    fn invalid(field: &str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

// ── TOML settings structs ───────────────────────────────────────────

/// Top-level settings file.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Settings {
    /// Human-readable device name, the first half of the endpoint id.
    pub display_name: String,

    /// Stable device uuid. Generated and persisted on first open.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_uuid: Option<Uuid>,

    #[serde(default)]
    pub role: Role,

    #[serde(default)]
    pub profile: Profile,

    /// Simulated radio knobs.
    #[serde(default)]
    pub simulation: SimulationSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            display_name: default_display_name(),
            device_uuid: None,
            role: Role::default(),
            profile: Profile::default(),
            simulation: SimulationSettings::default(),
        }
    }
}

fn default_display_name() -> String {
    "uwbctl".into()
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SimulationSettings {
    /// Milliseconds between two simulated measurements.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Endpoint id of the virtual peer.
    #[serde(default = "default_peer_id")]
    pub peer_id: String,

    /// Distance the simulated peer hovers around, in meters.
    #[serde(default = "default_base_distance")]
    pub base_distance_m: f32,

    /// Fail every simulated run after this many measurements.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fail_after: Option<u64>,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            peer_id: default_peer_id(),
            base_distance_m: default_base_distance(),
            fail_after: None,
        }
    }
}

fn default_interval_ms() -> u64 {
    200
}
fn default_peer_id() -> String {
    format!("sim-peer{ENDPOINT_ID_SEPARATOR}{}", Uuid::nil())
}
fn default_base_distance() -> f32 {
    1.5
}

impl Settings {
    /// Reject settings the container could never turn into a controller.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let name = self.display_name.trim();
        if name.is_empty() {
            return Err(ConfigError::invalid("display_name", "must not be empty"));
        }
        if name.contains(ENDPOINT_ID_SEPARATOR) {
            return Err(ConfigError::invalid(
                "display_name",
                format!("must not contain '{ENDPOINT_ID_SEPARATOR}'"),
            ));
        }
        SessionConfig::new(self.role, self.profile)
            .validate()
            .map_err(|e| ConfigError::invalid("profile", e.to_string()))?;
        if self.simulation.interval_ms == 0 {
            return Err(ConfigError::invalid(
                "simulation.interval_ms",
                "must be greater than zero",
            ));
        }
        if !self.simulation.base_distance_m.is_finite() || self.simulation.base_distance_m < 0.0 {
            return Err(ConfigError::invalid(
                "simulation.base_distance_m",
                "must be a non-negative number",
            ));
        }
        Ok(())
    }

    /// Fill in `device_uuid` if absent. Returns `true` if one was generated.
    pub fn ensure_device_uuid(&mut self) -> bool {
        if self.device_uuid.is_some() {
            return false;
        }
        self.device_uuid = Some(Uuid::new_v4());
        true
    }

    /// The record the core container consumes.
    ///
    /// A store-managed value always carries a uuid; a bare `Settings`
    /// without one maps to the nil uuid.
    pub fn device_settings(&self) -> DeviceSettings {
        DeviceSettings {
            display_name: self.display_name.trim().to_owned(),
            device_uuid: self.device_uuid.unwrap_or_default(),
            role: self.role,
            profile: self.profile,
        }
    }
}

// ── Settings file path ──────────────────────────────────────────────

/// Resolve the settings file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "uwbctl", "uwbctl").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("uwbctl");
    p
}

// ── Loading ─────────────────────────────────────────────────────────

/// Load settings from `path` + environment. A missing file yields defaults.
pub fn load_settings(path: &Path) -> Result<Settings, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Settings::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let settings: Settings = figment.extract()?;
    settings.validate()?;
    Ok(settings)
}

// ── Saving ──────────────────────────────────────────────────────────

/// Serialize settings to TOML and write them to `path`.
pub fn save_settings(path: &Path, settings: &Settings) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(settings)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}
