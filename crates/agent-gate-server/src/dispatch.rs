// crates/agent-gate-server/src/dispatch.rs
// ============================================================================
// Module: Security Event Dispatcher
// Description: Serial application of security events to account state.
// Purpose: Turn verified events into locks, purges, and forced logouts.
// Dependencies: agent-gate-core, tokio
// ============================================================================

//! ## Overview
//! One dispatcher consumes the bounded event queue and applies each event in
//! arrival order. Every event maps to a fixed list of steps; a failing step
//! is audited and the remaining steps still run. A forced logout marks the
//! agent in the [`RevocationLedger`] and invalidates its active sessions.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use agent_gate_core::AccountDirectory;
use agent_gate_core::AgentId;
use agent_gate_core::AuditSink;
use agent_gate_core::RevocationLedger;
use agent_gate_core::SecurityEvent;
use agent_gate_core::SecurityEventKind;
use agent_gate_core::SessionInvalidator;
use agent_gate_core::StoreError;
use agent_gate_core::audit::SecurityEventAuditEvent;
use agent_gate_core::audit::SecurityEventAuditParams;
use tokio::sync::mpsc;
use tokio::sync::watch;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Reason recorded when an event carries none.
const DEFAULT_REASON: &str = "security event";

// ============================================================================
// SECTION: Types
// ============================================================================

/// Result of applying one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Every step succeeded.
    Applied,
    /// At least one step failed; the rest still ran.
    Failed,
    /// A mutation event without a subject.
    Skipped,
    /// A verification or unknown event; nothing to do.
    Ignored,
}

impl DispatchOutcome {
    /// Returns a stable label for audit logs.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
            Self::Ignored => "ignored",
        }
    }
}

/// One mutation applied for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    /// Lock the account.
    Lock,
    /// Unlock the account.
    Unlock,
    /// Delete the account.
    Delete,
    /// Revoke every push token.
    RevokePushTokens,
    /// Force logout.
    Logout,
}

/// Returns the steps and audit action label for an event kind.
const fn plan(kind: &SecurityEventKind) -> (&'static [Step], &'static str) {
    match kind {
        SecurityEventKind::AccountDisabled => {
            (&[Step::Lock, Step::RevokePushTokens, Step::Logout], "lock_account")
        }
        SecurityEventKind::AccountEnabled => (&[Step::Unlock], "unlock_account"),
        SecurityEventKind::AccountPurged => (&[Step::Logout, Step::Delete], "purge_account"),
        SecurityEventKind::CredentialChangeRequired
        | SecurityEventKind::SessionsRevoked
        | SecurityEventKind::TokensRevoked => {
            (&[Step::RevokePushTokens, Step::Logout], "revoke_sessions")
        }
        SecurityEventKind::Verification | SecurityEventKind::Unknown(_) => (&[], "none"),
    }
}

// ============================================================================
// SECTION: Dispatcher
// ============================================================================

/// Applies security events to account state.
#[derive(Clone)]
pub struct EventDispatcher {
    /// Account state.
    accounts: Arc<dyn AccountDirectory>,
    /// Session layer hook.
    sessions: Arc<dyn SessionInvalidator>,
    /// Forced logout signals.
    ledger: Arc<RevocationLedger>,
    /// Audit sink.
    audit: Arc<dyn AuditSink>,
}

impl EventDispatcher {
    /// Creates a dispatcher over the given collaborators.
    #[must_use]
    pub fn new(
        accounts: Arc<dyn AccountDirectory>,
        sessions: Arc<dyn SessionInvalidator>,
        ledger: Arc<RevocationLedger>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            accounts,
            sessions,
            ledger,
            audit,
        }
    }

    /// Applies one event and audits the result.
    pub fn apply(&self, event: &SecurityEvent) -> DispatchOutcome {
        let (steps, action) = plan(&event.kind);
        let event_uri = match &event.kind {
            SecurityEventKind::Unknown(uri) => Some(uri.clone()),
            _ => None,
        };
        if !event.kind.requires_subject() {
            self.record(event, action, DispatchOutcome::Ignored, event_uri, None);
            return DispatchOutcome::Ignored;
        }
        let Some(agent) = &event.subject else {
            self.record(
                event,
                action,
                DispatchOutcome::Skipped,
                event_uri,
                Some("event has no subject".to_string()),
            );
            return DispatchOutcome::Skipped;
        };

        let reason = event.reason.as_deref().unwrap_or(DEFAULT_REASON);
        let mut errors = Vec::new();
        for step in steps {
            if let Err(err) = self.run_step(*step, agent, reason) {
                errors.push(err.to_string());
            }
        }
        let (outcome, error) = if errors.is_empty() {
            (DispatchOutcome::Applied, None)
        } else {
            (DispatchOutcome::Failed, Some(errors.join("; ")))
        };
        self.record(event, action, outcome, event_uri, error);
        outcome
    }

    /// Consumes `events` serially until shutdown is signalled, then drains
    /// events already queued and returns.
    ///
    /// The loop also ends when every sender is dropped.
    pub async fn run(
        self,
        mut events: mpsc::Receiver<SecurityEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                next = events.recv() => {
                    match next {
                        Some(event) => {
                            self.apply(&event);
                        }
                        None => return,
                    }
                }
            }
        }
        events.close();
        while let Some(event) = events.recv().await {
            self.apply(&event);
        }
    }

    /// Runs one mutation step.
    fn run_step(&self, step: Step, agent: &AgentId, reason: &str) -> Result<(), StoreError> {
        match step {
            Step::Lock => self.accounts.lock_account(agent, reason),
            Step::Unlock => self.accounts.unlock_account(agent, reason),
            Step::Delete => self.accounts.delete_account(agent),
            Step::RevokePushTokens => self.accounts.revoke_all_push_tokens(agent),
            Step::Logout => {
                self.ledger.logout(agent);
                self.sessions.invalidate_active_sessions(agent)
            }
        }
    }

    /// Emits the audit record for one event.
    fn record(
        &self,
        event: &SecurityEvent,
        action: &'static str,
        outcome: DispatchOutcome,
        event_uri: Option<String>,
        error: Option<String>,
    ) {
        self.audit.record_security_event(&SecurityEventAuditEvent::new(SecurityEventAuditParams {
            kind: event.kind.label(),
            event_uri,
            subject: event.subject.as_ref().map(|agent| agent.as_str().to_string()),
            action,
            outcome: outcome.label(),
            error,
        }));
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::print_stdout,
        clippy::print_stderr,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::use_debug,
        clippy::dbg_macro,
        clippy::panic_in_result_fn,
        clippy::unwrap_in_result,
        reason = "Test-only assertions and helpers are permitted."
    )]

    use super::*;

    #[test]
    fn only_subject_events_plan_mutations() {
        let kinds = [
            SecurityEventKind::AccountDisabled,
            SecurityEventKind::AccountEnabled,
            SecurityEventKind::AccountPurged,
            SecurityEventKind::CredentialChangeRequired,
            SecurityEventKind::SessionsRevoked,
            SecurityEventKind::TokensRevoked,
            SecurityEventKind::Verification,
            SecurityEventKind::Unknown("urn:example:event".to_string()),
        ];
        for kind in &kinds {
            let (steps, _) = plan(kind);
            assert_eq!(steps.is_empty(), !kind.requires_subject(), "{kind}");
        }
    }
}
