// crates/agent-gate-core/src/core/mod.rs
// ============================================================================
// Module: Agent Gate Core Types
// Description: Identifiers, time, trust records, and security events.
// Purpose: Provide stable, serializable types shared by every Agent Gate crate.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Core types are the canonical vocabulary of the trust engine. They carry no
//! I/O and are safe to share across threads.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod events;
pub mod identifiers;
pub mod time;
pub mod trust;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use events::SecurityEvent;
pub use events::SecurityEventKind;
pub use identifiers::AgentId;
pub use identifiers::CredentialId;
pub use identifiers::ProviderId;
pub use time::Clock;
pub use time::ManualClock;
pub use time::SystemClock;
pub use time::Timestamp;
pub use trust::TRUST_RECORD_TTL;
pub use trust::TrustRecord;
