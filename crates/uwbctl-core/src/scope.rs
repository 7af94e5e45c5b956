// ── Session scope factory ──
//
// Turns (identity, role, profile) into a backend scope. Resolution never
// starts ranging; it only allocates. The caller owns the scope and is the
// one who drops the previous one.

use std::sync::Arc;

use tracing::debug;

use uwbctl_backend::{RangingBackend, SessionScope};

use crate::error::CoreError;
use crate::identity::EndpointIdentity;
use crate::session::{Profile, Role, SessionConfig};

/// Obtains session scopes from the ranging backend.
#[derive(Clone)]
pub struct ScopeFactory {
    backend: Arc<dyn RangingBackend>,
}

impl ScopeFactory {
    pub fn new(backend: Arc<dyn RangingBackend>) -> Self {
        Self { backend }
    }

    /// Resolve a fresh scope bound to `identity`.
    ///
    /// Fails with [`CoreError::UnsupportedCombination`] before contacting the
    /// backend when a responder asks for an initiator-only profile.
    pub fn resolve_scope(
        &self,
        identity: &EndpointIdentity,
        role: Role,
        profile: Profile,
    ) -> Result<Box<dyn SessionScope>, CoreError> {
        SessionConfig::new(role, profile).validate()?;

        let local = identity.to_endpoint();
        let scope = match role {
            Role::Initiator => self
                .backend
                .controller_scope(local, profile.ranging_config())?,
            Role::Responder => self.backend.controlee_scope(local)?,
        };

        debug!(endpoint = %identity, %role, %profile, "resolved session scope");
        Ok(scope)
    }
}

impl std::fmt::Debug for ScopeFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeFactory").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use uwbctl_backend::SimulatedBackend;

    fn factory() -> (SimulatedBackend, ScopeFactory) {
        let backend = SimulatedBackend::default();
        let factory = ScopeFactory::new(Arc::new(backend.clone()));
        (backend, factory)
    }

    #[test]
    fn each_resolution_yields_an_independent_scope() {
        let (backend, factory) = factory();
        let identity = EndpointIdentity::new("A|1111");

        let first = factory
            .resolve_scope(&identity, Role::Initiator, Profile::UnicastPrecision)
            .unwrap();
        let second = factory
            .resolve_scope(&identity, Role::Responder, Profile::UnicastPrecision)
            .unwrap();

        assert_eq!(backend.scopes_created(), 2);
        assert_eq!(first.local_endpoint(), second.local_endpoint());
        assert_eq!(first.local_endpoint(), &identity.to_endpoint());
    }

    #[test]
    fn unsupported_combination_never_reaches_the_backend() {
        let (backend, factory) = factory();
        let identity = EndpointIdentity::new("A|1111");

        let result =
            factory.resolve_scope(&identity, Role::Responder, Profile::MulticastPrecision);

        assert!(matches!(
            result,
            Err(CoreError::UnsupportedCombination {
                role: Role::Responder,
                profile: Profile::MulticastPrecision,
            })
        ));
        assert_eq!(backend.scopes_created(), 0);
    }
}
