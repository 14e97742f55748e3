// crates/agent-gate-core/src/lib.rs
// ============================================================================
// Module: Agent Gate Core Library
// Description: Public API surface for the Agent Gate trust engine.
// Purpose: Expose core types, collaborator interfaces, audit sinks, and runtime.
// Dependencies: crate::{core, interfaces, runtime, audit}
// ============================================================================

//! ## Overview
//! Agent Gate decides whether an agent may use the service by combining
//! local account state with the verdicts of several partially trusted
//! reputation providers. It also owns the revocation ledger that the
//! security event pipeline writes and the session layer reads. Storage,
//! sessions, and providers integrate through explicit interfaces.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use audit::AuditSink;
pub use audit::FileAuditSink;
pub use audit::MemoryAuditSink;
pub use audit::NoopAuditSink;
pub use audit::StderrAuditSink;
pub use interfaces::AccountDirectory;
pub use interfaces::SessionInvalidator;
pub use interfaces::StoreError;
pub use interfaces::TrustCache;
pub use interfaces::TrustProvider;
pub use runtime::AccountState;
pub use runtime::AuthorizeError;
pub use runtime::Authorizer;
pub use runtime::AuthorizerConfig;
pub use runtime::InMemoryAccountDirectory;
pub use runtime::InMemorySessionInvalidator;
pub use runtime::InMemoryTrustCache;
pub use runtime::ProviderRegistry;
pub use runtime::RegistryError;
pub use runtime::RevocationLedger;
