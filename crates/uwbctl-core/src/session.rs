// ── Session configuration ──
//
// Which side of the exchange this device plays, and which parameter preset
// it asks the backend for.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use uwbctl_backend::RangingConfig;

use crate::error::CoreError;

/// Which side of the ranging exchange the device plays.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    /// Drives the session (controller side).
    #[default]
    #[strum(to_string = "initiator", serialize = "controller")]
    #[serde(alias = "controller")]
    Initiator,
    /// Answers the initiator (controlee side).
    #[strum(to_string = "responder", serialize = "controlee")]
    #[serde(alias = "controlee")]
    Responder,
}

/// Parameter preset requested from the backend.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
#[serde(rename_all = "kebab-case")]
pub enum Profile {
    /// One-to-one precision ranging.
    #[default]
    UnicastPrecision,
    /// One-to-many precision ranging; the initiator sets up the group.
    MulticastPrecision,
}

impl Profile {
    /// Whether only the initiator can set this profile up.
    pub fn initiator_only(self) -> bool {
        matches!(self, Self::MulticastPrecision)
    }

    pub fn ranging_config(self) -> RangingConfig {
        match self {
            Self::UnicastPrecision => RangingConfig::UnicastDsTwr,
            Self::MulticastPrecision => RangingConfig::MulticastDsTwr,
        }
    }
}

/// The (role, profile) pair that selects a backend scope.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionConfig {
    pub role: Role,
    pub profile: Profile,
}

impl SessionConfig {
    pub fn new(role: Role, profile: Profile) -> Self {
        Self { role, profile }
    }

    /// Reject combinations the backend cannot serve.
    pub fn validate(self) -> Result<Self, CoreError> {
        if self.role == Role::Responder && self.profile.initiator_only() {
            return Err(CoreError::UnsupportedCombination {
                role: self.role,
                profile: self.profile,
            });
        }
        Ok(self)
    }
}
