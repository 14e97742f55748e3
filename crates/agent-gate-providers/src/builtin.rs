// crates/agent-gate-providers/src/builtin.rs
// ============================================================================
// Module: Built-in Provider Registration
// Description: Wires the reputation and community sources into a registry.
// Purpose: Build cached providers from settings at startup.
// Dependencies: agent-gate-core, crate::{cached, community, reputation}
// ============================================================================

//! ## Overview
//! Hosts describe which built-in providers are enabled and pass shared
//! collaborators once; each enabled provider is wrapped in a
//! [`CachedTrustProvider`] and registered.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use agent_gate_core::AuditSink;
use agent_gate_core::Clock;
use agent_gate_core::ProviderRegistry;
use agent_gate_core::RegistryError;
use agent_gate_core::TrustCache;
use thiserror::Error;

use crate::cached::CachePolicy;
use crate::cached::CachedTrustProvider;
use crate::community::CommunitySource;
use crate::http::HttpSourceConfig;
use crate::reputation::ReputationSource;
use crate::source::ProviderError;
use crate::source::TrustSource;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Settings for one built-in provider.
#[derive(Debug, Clone)]
pub struct BuiltinProviderSettings {
    /// Connection settings.
    pub http: HttpSourceConfig,
    /// Caching and pacing policy.
    pub policy: CachePolicy,
}

/// Enabled built-in providers.
#[derive(Debug, Clone, Default)]
pub struct BuiltinProviders {
    /// Reputation service settings, when enabled.
    pub reputation: Option<BuiltinProviderSettings>,
    /// Community service settings, when enabled.
    pub community: Option<BuiltinProviderSettings>,
}

/// Collaborators shared by every cached provider.
#[derive(Clone)]
pub struct ProviderContext {
    /// Trust record cache.
    pub cache: Arc<dyn TrustCache>,
    /// Time source.
    pub clock: Arc<dyn Clock>,
    /// Audit sink.
    pub audit: Arc<dyn AuditSink>,
}

/// Registration failures.
#[derive(Debug, Error)]
pub enum BuiltinProviderError {
    /// A source could not be built.
    #[error(transparent)]
    Provider(#[from] ProviderError),
    /// Registration was rejected.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

// ============================================================================
// SECTION: Registration
// ============================================================================

/// Registers every enabled built-in provider.
///
/// # Errors
///
/// Returns [`BuiltinProviderError`] when a source cannot be built or its
/// identifier is already registered.
pub fn register_builtin_providers(
    registry: &mut ProviderRegistry,
    providers: &BuiltinProviders,
    context: &ProviderContext,
) -> Result<(), BuiltinProviderError> {
    if let Some(settings) = &providers.reputation {
        let source = ReputationSource::new(&settings.http)?;
        registry.register(Arc::new(wrap(source, settings.policy, context)))?;
    }
    if let Some(settings) = &providers.community {
        let source = CommunitySource::new(&settings.http)?;
        registry.register(Arc::new(wrap(source, settings.policy, context)))?;
    }
    Ok(())
}

/// Wraps a source with the shared collaborators.
fn wrap<S: TrustSource>(
    source: S,
    policy: CachePolicy,
    context: &ProviderContext,
) -> CachedTrustProvider<S> {
    CachedTrustProvider::new(
        source,
        Arc::clone(&context.cache),
        Arc::clone(&context.clock),
        Arc::clone(&context.audit),
        policy,
    )
}
