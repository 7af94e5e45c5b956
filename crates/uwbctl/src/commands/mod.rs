//! Command handlers and the glue between CLI args and the workspace crates.

pub mod config_cmd;
pub mod range;

use std::path::PathBuf;
use std::time::Duration;

use uwbctl_backend::SimConfig;
use uwbctl_config::{SettingsStore, SimulationSettings};
use uwbctl_core::{Profile, Role};

use crate::cli::{GlobalOpts, ProfileArg, RoleArg};
use crate::error::CliError;

impl From<RoleArg> for Role {
    fn from(arg: RoleArg) -> Self {
        match arg {
            RoleArg::Initiator => Self::Initiator,
            RoleArg::Responder => Self::Responder,
        }
    }
}

impl From<ProfileArg> for Profile {
    fn from(arg: ProfileArg) -> Self {
        match arg {
            ProfileArg::UnicastPrecision => Self::UnicastPrecision,
            ProfileArg::MulticastPrecision => Self::MulticastPrecision,
        }
    }
}

/// Settings file selected by `--config`, or the platform default.
pub fn settings_path(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(uwbctl_config::config_path)
}

/// Open the file-backed settings store.
pub fn open_store(global: &GlobalOpts) -> Result<SettingsStore, CliError> {
    let path = settings_path(global);
    SettingsStore::open(&path).map_err(|e| CliError::from_config(e, &path))
}

/// Translate the `[simulation]` table into backend knobs.
pub fn sim_config(settings: &SimulationSettings) -> SimConfig {
    SimConfig {
        interval: Duration::from_millis(settings.interval_ms),
        peer_id: settings.peer_id.clone(),
        base_distance_m: settings.base_distance_m,
        fail_after: settings.fail_after,
        ..SimConfig::default()
    }
}
