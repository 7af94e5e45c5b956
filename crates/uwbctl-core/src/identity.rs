// ── Endpoint identity ──
//
// One generation of the local radio identity. The token is bound into the
// backend scope at creation time, so a new identity always means a new scope.

use std::fmt;

use bytes::Bytes;
use rand::RngCore;
use rand::rngs::OsRng;

use uwbctl_backend::Endpoint;

/// Length of the per-generation session token.
pub const TOKEN_LEN: usize = 8;

/// The local participant: a stable, externally derived id plus a random
/// token that is fresh for every generation.
#[derive(Clone, PartialEq, Eq)]
pub struct EndpointIdentity {
    id: String,
    token: [u8; TOKEN_LEN],
}

impl EndpointIdentity {
    /// Create a new generation for `id`, drawing the token from the OS CSPRNG.
    pub fn new(id: impl Into<String>) -> Self {
        let mut token = [0u8; TOKEN_LEN];
        OsRng.fill_bytes(&mut token);
        Self {
            id: id.into(),
            token,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn token(&self) -> &[u8; TOKEN_LEN] {
        &self.token
    }

    /// The backend-facing view of this identity.
    pub fn to_endpoint(&self) -> Endpoint {
        Endpoint::new(self.id.clone(), Bytes::copy_from_slice(&self.token))
    }
}

// The token is session material; keep it out of logs.
impl fmt::Debug for EndpointIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointIdentity")
            .field("id", &self.id)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl fmt::Display for EndpointIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}
