// ── Wire-neutral ranging types ──
//
// Everything that crosses the backend seam. Events are immutable once
// emitted; consumers share them behind `Arc`.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

// ── Endpoint ─────────────────────────────────────────────────────────

/// A participant as seen by the ranging backend.
///
/// `metadata` carries the per-generation session token bound into the
/// scope at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub id: String,
    pub metadata: Bytes,
}

impl Endpoint {
    pub fn new(id: impl Into<String>, metadata: impl Into<Bytes>) -> Self {
        Self {
            id: id.into(),
            metadata: metadata.into(),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

// ── RangingConfig ────────────────────────────────────────────────────

/// Backend parameter presets for a controller-side scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
pub enum RangingConfig {
    /// One-to-one double-sided two-way ranging.
    #[strum(serialize = "CONFIG_UNICAST_DS_TWR")]
    #[serde(rename = "CONFIG_UNICAST_DS_TWR")]
    UnicastDsTwr,
    /// One-to-many double-sided two-way ranging.
    #[strum(serialize = "CONFIG_MULTICAST_DS_TWR")]
    #[serde(rename = "CONFIG_MULTICAST_DS_TWR")]
    MulticastDsTwr,
}

impl RangingConfig {
    /// Numeric preset id understood by the radio stack.
    pub fn config_id(self) -> u8 {
        match self {
            Self::UnicastDsTwr => 1,
            Self::MulticastDsTwr => 2,
        }
    }
}

// ── RangingPosition ──────────────────────────────────────────────────

/// One ranging measurement relative to the local device.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangingPosition {
    /// Distance in meters.
    pub distance_m: f32,
    /// Horizontal angle in degrees, when the antenna array supports it.
    pub azimuth_deg: Option<f32>,
    /// Vertical angle in degrees, when the antenna array supports it.
    pub elevation_deg: Option<f32>,
    /// Monotonic timestamp of the measurement.
    pub elapsed_realtime_nanos: u64,
}

// ── RangingEvent ─────────────────────────────────────────────────────

/// A single update produced by a running session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RangingEvent {
    /// A peer joined the session.
    EndpointFound { endpoint: Endpoint },
    /// A peer left the session or stopped responding.
    EndpointLost { endpoint: Endpoint },
    /// A new measurement for a peer.
    PositionUpdated {
        endpoint: Endpoint,
        position: RangingPosition,
    },
    /// An out-of-band payload received from a peer.
    EndpointMessage { endpoint: Endpoint, payload: Bytes },
    /// The radio dropped the session with this peer.
    Disconnected { endpoint: Endpoint },
}

impl RangingEvent {
    /// The peer this event concerns.
    pub fn endpoint(&self) -> &Endpoint {
        match self {
            Self::EndpointFound { endpoint }
            | Self::EndpointLost { endpoint }
            | Self::PositionUpdated { endpoint, .. }
            | Self::EndpointMessage { endpoint, .. }
            | Self::Disconnected { endpoint } => endpoint,
        }
    }
}
