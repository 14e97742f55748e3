// crates/agent-gate-core/src/runtime/registry.rs
// ============================================================================
// Module: Trust Provider Registry
// Description: Startup-built set of trust providers consulted per decision.
// Purpose: Hold providers under unique identifiers and expose them read-only.
// Dependencies: crate::interfaces
// ============================================================================

//! ## Overview
//! The registry is an explicit value built once at startup and shared behind
//! an `Arc`. Providers are iterated in registration order; identifiers must
//! be unique.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::sync::Arc;

use thiserror::Error;

use crate::core::identifiers::ProviderId;
use crate::interfaces::TrustProvider;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Provider registration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// A provider with the same identifier is already registered.
    #[error("trust provider already registered: {0}")]
    Duplicate(String),
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Ordered collection of trust providers.
///
/// # Invariants
/// - Provider identifiers are unique.
#[derive(Default)]
pub struct ProviderRegistry {
    /// Providers in registration order.
    providers: Vec<Arc<dyn TrustProvider>>,
    /// Registered identifiers.
    ids: BTreeSet<ProviderId>,
}

impl ProviderRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a provider.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Duplicate`] when the identifier is taken.
    pub fn register(&mut self, provider: Arc<dyn TrustProvider>) -> Result<(), RegistryError> {
        let id = provider.provider_id().clone();
        if self.ids.contains(&id) {
            return Err(RegistryError::Duplicate(id.to_string()));
        }
        self.ids.insert(id);
        self.providers.push(provider);
        Ok(())
    }

    /// Returns every registered provider in registration order.
    #[must_use]
    pub fn all(&self) -> &[Arc<dyn TrustProvider>] {
        &self.providers
    }

    /// Returns true when `id` is registered.
    #[must_use]
    pub fn contains(&self, id: &ProviderId) -> bool {
        self.ids.contains(id)
    }

    /// Returns the number of registered providers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Returns true when no providers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions are permitted.")]

    use std::sync::Arc;

    use async_trait::async_trait;

    use super::ProviderRegistry;
    use super::RegistryError;
    use crate::core::identifiers::AgentId;
    use crate::core::identifiers::ProviderId;
    use crate::interfaces::TrustProvider;

    /// Provider that permits everyone.
    struct Permissive(ProviderId);

    #[async_trait]
    impl TrustProvider for Permissive {
        fn provider_id(&self) -> &ProviderId {
            &self.0
        }

        async fn authorize(&self, _agent: &AgentId) -> bool {
            true
        }

        async fn authorize_offline(&self, _agent: &AgentId) -> bool {
            true
        }
    }

    fn provider(id: &str) -> Arc<dyn TrustProvider> {
        Arc::new(Permissive(ProviderId::new(id)))
    }

    #[test]
    fn duplicate_identifiers_are_rejected() {
        let mut registry = ProviderRegistry::new();
        registry.register(provider("reputation")).unwrap();
        registry.register(provider("community")).unwrap();
        assert_eq!(
            registry.register(provider("reputation")),
            Err(RegistryError::Duplicate("reputation".to_string()))
        );
        assert_eq!(registry.len(), 2);
        assert!(registry.contains(&ProviderId::new("community")));
    }

    #[test]
    fn providers_keep_registration_order() {
        let mut registry = ProviderRegistry::new();
        for id in ["b", "a", "c"] {
            registry.register(provider(id)).unwrap();
        }
        let ids: Vec<_> =
            registry.all().iter().map(|provider| provider.provider_id().as_str()).collect();
        assert_eq!(ids, ["b", "a", "c"]);
        assert!(!registry.is_empty());
    }
}
