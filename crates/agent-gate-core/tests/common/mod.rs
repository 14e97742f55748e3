// crates/agent-gate-core/tests/common/mod.rs
// ============================================================================
// Module: Common Test Fixtures
// Description: Scripted trust providers and authorizer builders.
// Purpose: Provide deterministic providers for orchestrator tests.
// Dependencies: agent-gate-core
// ============================================================================

//! ## Overview
//! Scripted providers return fixed verdicts, sleep past deadlines, or panic,
//! so orchestrator behavior can be asserted without any network.

#![allow(dead_code, reason = "Shared test helpers may be unused in some cases.")]
#![allow(
    clippy::panic,
    clippy::unwrap_used,
    reason = "Fixtures panic on setup failure and script provider panics."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use agent_gate_core::AccountDirectory;
use agent_gate_core::AgentId;
use agent_gate_core::AuditSink;
use agent_gate_core::Authorizer;
use agent_gate_core::AuthorizerConfig;
use agent_gate_core::InMemoryAccountDirectory;
use agent_gate_core::MemoryAuditSink;
use agent_gate_core::ProviderId;
use agent_gate_core::ProviderRegistry;
use agent_gate_core::TrustProvider;
use async_trait::async_trait;

// ============================================================================
// SECTION: Providers
// ============================================================================

/// Provider behavior script.
#[derive(Debug, Clone, Copy)]
pub enum Script {
    /// Answer immediately.
    Answer(bool),
    /// Sleep before answering online; answer `offline` from cache.
    Slow {
        /// Online delay.
        delay: Duration,
        /// Online verdict.
        online: bool,
        /// Cache-only verdict.
        offline: bool,
    },
    /// Panic inside `authorize`.
    Panic,
}

/// Provider that follows a [`Script`] and counts calls.
pub struct ScriptedProvider {
    /// Provider identifier.
    id: ProviderId,
    /// Behavior script.
    script: Script,
    /// Online call count.
    pub online_calls: AtomicUsize,
    /// Offline call count.
    pub offline_calls: AtomicUsize,
}

impl ScriptedProvider {
    /// Creates a scripted provider.
    pub fn new(id: &str, script: Script) -> Arc<Self> {
        Arc::new(Self {
            id: ProviderId::new(id),
            script,
            online_calls: AtomicUsize::new(0),
            offline_calls: AtomicUsize::new(0),
        })
    }

    /// Returns the online call count.
    pub fn online(&self) -> usize {
        self.online_calls.load(Ordering::SeqCst)
    }

    /// Returns the offline call count.
    pub fn offline(&self) -> usize {
        self.offline_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TrustProvider for ScriptedProvider {
    fn provider_id(&self) -> &ProviderId {
        &self.id
    }

    async fn authorize(&self, _agent: &AgentId) -> bool {
        self.online_calls.fetch_add(1, Ordering::SeqCst);
        match self.script {
            Script::Answer(verdict) => verdict,
            Script::Slow { delay, online, .. } => {
                tokio::time::sleep(delay).await;
                online
            }
            Script::Panic => panic!("scripted provider failure"),
        }
    }

    async fn authorize_offline(&self, _agent: &AgentId) -> bool {
        self.offline_calls.fetch_add(1, Ordering::SeqCst);
        match self.script {
            Script::Answer(verdict) => verdict,
            Script::Slow { offline, .. } => offline,
            Script::Panic => false,
        }
    }
}

// ============================================================================
// SECTION: Builders
// ============================================================================

/// Authorizer plus the collaborators tests inspect.
pub struct Harness {
    /// Orchestrator under test.
    pub authorizer: Authorizer,
    /// Account directory backing the orchestrator.
    pub accounts: Arc<InMemoryAccountDirectory>,
    /// Captured audit events.
    pub audit: Arc<MemoryAuditSink>,
}

/// Builds an authorizer over the given providers with the default deadline.
pub fn harness(providers: &[Arc<ScriptedProvider>]) -> Harness {
    harness_with_deadline(providers, AuthorizerConfig::default().deadline)
}

/// Builds an authorizer over the given providers and deadline.
pub fn harness_with_deadline(providers: &[Arc<ScriptedProvider>], deadline: Duration) -> Harness {
    let mut registry = ProviderRegistry::new();
    for provider in providers {
        registry.register(Arc::clone(provider) as Arc<dyn TrustProvider>).unwrap();
    }
    let accounts = Arc::new(InMemoryAccountDirectory::new());
    let audit = Arc::new(MemoryAuditSink::new());
    let directory: Arc<dyn AccountDirectory> = Arc::clone(&accounts) as Arc<dyn AccountDirectory>;
    let sink: Arc<dyn AuditSink> = Arc::clone(&audit) as Arc<dyn AuditSink>;
    let authorizer =
        Authorizer::new(Arc::new(registry), directory, sink, AuthorizerConfig { deadline });
    Harness {
        authorizer,
        accounts,
        audit,
    }
}

/// Returns a test agent identifier.
pub fn agent(name: &str) -> AgentId {
    AgentId::new(name)
}
