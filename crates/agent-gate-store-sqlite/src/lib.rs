// crates/agent-gate-store-sqlite/src/lib.rs
// ============================================================================
// Module: Agent Gate SQLite Store
// Description: Durable SQLite-backed trust cache and account directory.
// Purpose: Persist trust records and account state across restarts.
// Dependencies: agent-gate-core, rusqlite
// ============================================================================

//! ## Overview
//! This crate provides [`SqliteTrustStore`], a single-file store implementing
//! both [`agent_gate_core::TrustCache`] and
//! [`agent_gate_core::AccountDirectory`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::MAX_RECORD_BYTES;
pub use store::SqliteJournalMode;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteSyncMode;
pub use store::SqliteTrustStore;
