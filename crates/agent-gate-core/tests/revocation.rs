// crates/agent-gate-core/tests/revocation.rs
// ============================================================================
// Module: Revocation Ledger Tests
// Description: Consume-once semantics across both namespaces.
// ============================================================================

//! Revocation ledger behavior tests.

use std::sync::Arc;

use agent_gate_core::AgentId;
use agent_gate_core::CredentialId;
use agent_gate_core::RevocationLedger;

#[test]
fn logout_is_observed_exactly_once() {
    let ledger = RevocationLedger::new();
    let agent = AgentId::new("alice");
    assert!(!ledger.is_logged_out(&agent));
    ledger.logout(&agent);
    assert!(ledger.is_logged_out(&agent));
    assert!(!ledger.is_logged_out(&agent));
}

#[test]
fn credential_revocation_is_observed_exactly_once() {
    let ledger = RevocationLedger::new();
    let token = CredentialId::new("tok-1");
    ledger.revoke_credential(&token);
    assert!(ledger.is_revoked_credential(&token));
    assert!(!ledger.is_revoked_credential(&token));
}

#[test]
fn namespaces_do_not_collide() {
    let ledger = RevocationLedger::new();
    ledger.logout(&AgentId::new("shared"));
    assert!(!ledger.is_revoked_credential(&CredentialId::new("shared")));
    assert!(ledger.is_logged_out(&AgentId::new("shared")));

    ledger.revoke_credential(&CredentialId::new("shared"));
    assert!(!ledger.is_logged_out(&AgentId::new("shared")));
    assert!(ledger.is_revoked_credential(&CredentialId::new("shared")));
}

#[test]
fn concurrent_readers_observe_one_signal() {
    let ledger = Arc::new(RevocationLedger::new());
    let agent = AgentId::new("racer");
    ledger.logout(&agent);
    let handles: Vec<_> = (0 .. 8)
        .map(|_| {
            let ledger = Arc::clone(&ledger);
            let agent = agent.clone();
            std::thread::spawn(move || ledger.is_logged_out(&agent))
        })
        .collect();
    let observed =
        handles.into_iter().filter_map(|handle| handle.join().ok()).filter(|seen| *seen).count();
    assert_eq!(observed, 1);
}
