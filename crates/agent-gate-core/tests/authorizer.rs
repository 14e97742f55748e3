// crates/agent-gate-core/tests/authorizer.rs
// ============================================================================
// Module: Authorizer Tests
// Description: Local gates, unanimity, deadline fallback, and audit output.
// Purpose: Validate the authorization orchestrator against scripted providers.
// ============================================================================

//! ## Overview
//! Exercises [`agent_gate_core::Authorizer`] end to end with scripted
//! providers and the in-memory account directory.

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

mod common;

use std::time::Duration;

use agent_gate_core::AccountDirectory;
use agent_gate_core::AccountState;
use agent_gate_core::AuthorizeError;
use common::Script;
use common::ScriptedProvider;
use common::agent;
use common::harness;
use common::harness_with_deadline;

#[tokio::test]
async fn unanimous_permit_allows_agent() {
    let a = ScriptedProvider::new("reputation", Script::Answer(true));
    let b = ScriptedProvider::new("community", Script::Answer(true));
    let h = harness(&[a.clone(), b.clone()]);
    assert_eq!(h.authorizer.authorize(&agent("alice")).await, Ok(()));
    assert_eq!(a.online(), 1);
    assert_eq!(b.online(), 1);
}

#[tokio::test]
async fn single_denial_denies_with_generic_error() {
    let a = ScriptedProvider::new("reputation", Script::Answer(true));
    let b = ScriptedProvider::new("community", Script::Answer(false));
    let h = harness(&[a, b]);
    let err = h.authorizer.authorize(&agent("mallory")).await.unwrap_err();
    assert_eq!(err, AuthorizeError::AccessDenied);
    assert_eq!(err.to_string(), "access denied");
    let decisions = h.audit.events_named("authorize_decision");
    assert_eq!(decisions.len(), 1);
    assert_eq!(decisions[0]["reason"], "provider_denied");
    assert_eq!(decisions[0]["denied_by"][0], "community");
}

#[tokio::test]
async fn first_login_bootstraps_account() {
    let h = harness(&[]);
    let alice = agent("alice");
    assert!(!h.accounts.is_known_agent(&alice).unwrap());
    assert!(h.authorizer.is_permitted(&alice).await);
    assert!(h.accounts.is_known_agent(&alice).unwrap());
}

#[tokio::test]
async fn locked_account_is_denied_without_provider_calls() {
    let provider = ScriptedProvider::new("reputation", Script::Answer(true));
    let h = harness(&[provider.clone()]);
    let bob = agent("bob");
    h.accounts.lock_account(&bob, "account disabled").unwrap();
    assert_eq!(h.authorizer.authorize(&bob).await, Err(AuthorizeError::AccessDenied));
    assert_eq!(provider.online(), 0);
    assert_eq!(h.audit.events_named("authorize_decision")[0]["reason"], "locked");
}

#[tokio::test]
async fn self_disqualified_agent_is_denied_without_provider_calls() {
    let provider = ScriptedProvider::new("reputation", Script::Answer(true));
    let h = harness(&[provider.clone()]);
    let carol = agent("carol");
    h.accounts
        .insert_account(
            &carol,
            AccountState {
                self_disqualified: true,
                ..AccountState::default()
            },
        )
        .unwrap();
    assert!(!h.authorizer.is_permitted(&carol).await);
    assert_eq!(provider.online(), 0);
}

#[tokio::test]
async fn panicking_provider_denies() {
    let ok = ScriptedProvider::new("reputation", Script::Answer(true));
    let broken = ScriptedProvider::new("community", Script::Panic);
    let h = harness(&[ok, broken]);
    assert_eq!(h.authorizer.authorize(&agent("dave")).await, Err(AuthorizeError::AccessDenied));
}

#[tokio::test(start_paused = true)]
async fn slow_provider_falls_back_to_cached_verdict_after_deadline() {
    let fast = ScriptedProvider::new("reputation", Script::Answer(true));
    let slow = ScriptedProvider::new(
        "community",
        Script::Slow {
            delay: Duration::from_secs(60),
            online: false,
            offline: true,
        },
    );
    let h = harness_with_deadline(&[fast.clone(), slow.clone()], Duration::from_secs(5));
    assert_eq!(h.authorizer.authorize(&agent("erin")).await, Ok(()));
    assert_eq!(fast.offline(), 0);
    assert_eq!(slow.offline(), 1);
    let decision = &h.audit.events_named("authorize_decision")[0];
    assert_eq!(decision["deadline_fallback"][0], "community");
}

#[tokio::test(start_paused = true)]
async fn slow_provider_with_cached_denial_denies_after_deadline() {
    let slow = ScriptedProvider::new(
        "community",
        Script::Slow {
            delay: Duration::from_secs(60),
            online: true,
            offline: false,
        },
    );
    let h = harness_with_deadline(&[slow.clone()], Duration::from_secs(1));
    assert!(!h.authorizer.is_permitted(&agent("frank")).await);
    assert_eq!(slow.offline(), 1);
}

#[tokio::test]
async fn empty_registry_permits() {
    let h = harness(&[]);
    assert!(h.authorizer.is_permitted(&agent("grace")).await);
}
