// crates/agent-gate-core/src/runtime/mod.rs
// ============================================================================
// Module: Agent Gate Runtime
// Description: Provider registry, authorization orchestrator, and revocation ledger.
// Purpose: Execute authorization decisions against registered trust providers.
// Dependencies: crate::{core, interfaces, audit}, tokio
// ============================================================================

//! ## Overview
//! Runtime modules hold the stateful pieces of the trust engine. Every value
//! here is built at startup and shared behind an `Arc`; none are global.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod authorizer;
pub mod memory;
pub mod registry;
pub mod revocation;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use authorizer::AuthorizeError;
pub use authorizer::Authorizer;
pub use authorizer::AuthorizerConfig;
pub use authorizer::DEFAULT_FAN_OUT_DEADLINE;
pub use memory::AccountState;
pub use memory::InMemoryAccountDirectory;
pub use memory::InMemorySessionInvalidator;
pub use memory::InMemoryTrustCache;
pub use registry::ProviderRegistry;
pub use registry::RegistryError;
pub use revocation::RevocationLedger;
