// crates/agent-gate-core/src/runtime/authorizer.rs
// ============================================================================
// Module: Authorization Orchestrator
// Description: Local account gates followed by a unanimous provider fan-out.
// Purpose: Decide whether an agent may use the service.
// Dependencies: crate::{core, interfaces, audit}, tokio
// ============================================================================

//! ## Overview
//! [`Authorizer::authorize`] applies three local gates (first-login
//! bootstrap, security lock, self-disqualification) and then asks every
//! registered provider concurrently. The agent is permitted only when every
//! provider answers `true`.
//!
//! Invariants:
//! - Local denials never reach the network.
//! - A provider that panics counts as a denial.
//! - A provider that misses the overall deadline is re-evaluated from cache
//!   only; it can deny only on cached negative evidence.
//! - Callers see a single generic denial; the denying provider is recorded in
//!   the audit log only.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinSet;
use tokio::time::Instant;

use crate::audit::AuditSink;
use crate::audit::AuthorizeAuditEvent;
use crate::core::identifiers::AgentId;
use crate::interfaces::AccountDirectory;
use crate::interfaces::StoreError;
use crate::runtime::registry::ProviderRegistry;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default overall deadline for the provider fan-out.
pub const DEFAULT_FAN_OUT_DEADLINE: Duration = Duration::from_secs(5);

/// Denied-by label for a provider task that did not complete.
const UNRESOLVED_PROVIDER: &str = "unresolved";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Authorization failures visible to callers.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthorizeError {
    /// The agent is not permitted.
    #[error("access denied")]
    AccessDenied,
    /// An account collaborator failed; the decision fails closed.
    #[error("authorization storage error: {0}")]
    Storage(String),
}

impl From<StoreError> for AuthorizeError {
    fn from(error: StoreError) -> Self {
        Self::Storage(error.to_string())
    }
}

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Orchestrator tuning.
#[derive(Debug, Clone, Copy)]
pub struct AuthorizerConfig {
    /// Overall deadline for the provider fan-out.
    pub deadline: Duration,
}

impl Default for AuthorizerConfig {
    fn default() -> Self {
        Self {
            deadline: DEFAULT_FAN_OUT_DEADLINE,
        }
    }
}

// ============================================================================
// SECTION: Authorizer
// ============================================================================

/// Authorization orchestrator.
pub struct Authorizer {
    /// Providers consulted on every decision.
    registry: Arc<ProviderRegistry>,
    /// Local account state.
    accounts: Arc<dyn AccountDirectory>,
    /// Audit sink for decisions.
    audit: Arc<dyn AuditSink>,
    /// Orchestrator tuning.
    config: AuthorizerConfig,
}

impl Authorizer {
    /// Creates an orchestrator over the given registry and account directory.
    #[must_use]
    pub fn new(
        registry: Arc<ProviderRegistry>,
        accounts: Arc<dyn AccountDirectory>,
        audit: Arc<dyn AuditSink>,
        config: AuthorizerConfig,
    ) -> Self {
        Self {
            registry,
            accounts,
            audit,
            config,
        }
    }

    /// Returns the provider registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// Decides whether `agent` is permitted.
    ///
    /// # Errors
    ///
    /// Returns [`AuthorizeError::AccessDenied`] when a local gate or any
    /// provider denies, and [`AuthorizeError::Storage`] when the account
    /// directory fails.
    pub async fn authorize(&self, agent: &AgentId) -> Result<(), AuthorizeError> {
        match self.local_gates(agent) {
            Ok(None) => {}
            Ok(Some(reason)) => {
                self.audit.record_authorize(&AuthorizeAuditEvent::new(
                    agent.as_str(),
                    false,
                    reason,
                ));
                return Err(AuthorizeError::AccessDenied);
            }
            Err(err) => {
                self.audit.record_authorize(&AuthorizeAuditEvent::new(
                    agent.as_str(),
                    false,
                    "storage_error",
                ));
                return Err(err.into());
            }
        }

        let fan_out = self.fan_out(agent).await;
        let permitted = fan_out.denied_by.is_empty();
        let mut event = AuthorizeAuditEvent::new(
            agent.as_str(),
            permitted,
            if permitted { "permitted" } else { "provider_denied" },
        );
        event.denied_by = fan_out.denied_by;
        event.deadline_fallback = fan_out.deadline_fallback;
        self.audit.record_authorize(&event);
        if permitted { Ok(()) } else { Err(AuthorizeError::AccessDenied) }
    }

    /// Returns true when [`Self::authorize`] succeeds.
    pub async fn is_permitted(&self, agent: &AgentId) -> bool {
        self.authorize(agent).await.is_ok()
    }

    /// Applies bootstrap, lock, and self-disqualification gates.
    ///
    /// Returns the denial reason label when a gate denies.
    fn local_gates(&self, agent: &AgentId) -> Result<Option<&'static str>, StoreError> {
        if !self.accounts.is_known_agent(agent)? {
            self.accounts.bootstrap_first_login(agent)?;
        }
        if self.accounts.is_locked(agent)? {
            return Ok(Some("locked"));
        }
        if self.accounts.is_self_disqualified(agent)? {
            return Ok(Some("self_disqualified"));
        }
        Ok(None)
    }

    /// Runs every provider concurrently under the overall deadline.
    async fn fan_out(&self, agent: &AgentId) -> FanOutResult {
        let providers = self.registry.all();
        let mut resolved = vec![false; providers.len()];
        let mut result = FanOutResult::default();
        let mut tasks = JoinSet::new();
        for (index, provider) in providers.iter().enumerate() {
            let provider = Arc::clone(provider);
            let agent = agent.clone();
            tasks.spawn(async move { (index, provider.authorize(&agent).await) });
        }

        let deadline = Instant::now() + self.config.deadline;
        let mut timed_out = false;
        loop {
            match tokio::time::timeout_at(deadline, tasks.join_next()).await {
                Ok(Some(Ok((index, permitted)))) => {
                    resolved[index] = true;
                    if !permitted {
                        result.denied_by.push(providers[index].provider_id().to_string());
                    }
                }
                Ok(Some(Err(_))) => {
                    result.denied_by.push(UNRESOLVED_PROVIDER.to_string());
                }
                Ok(None) => break,
                Err(_) => {
                    timed_out = true;
                    break;
                }
            }
        }
        tasks.abort_all();

        if timed_out && result.denied_by.is_empty() {
            for (index, provider) in providers.iter().enumerate() {
                if resolved[index] {
                    continue;
                }
                let id = provider.provider_id().to_string();
                if !provider.authorize_offline(agent).await {
                    result.denied_by.push(id.clone());
                }
                result.deadline_fallback.push(id);
            }
        }
        result
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Collected fan-out verdicts.
#[derive(Debug, Default)]
struct FanOutResult {
    /// Providers that denied or did not resolve.
    denied_by: Vec<String>,
    /// Providers evaluated from cache after the deadline.
    deadline_fallback: Vec<String>,
}
