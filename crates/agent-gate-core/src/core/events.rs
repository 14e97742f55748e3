// crates/agent-gate-core/src/core/events.rs
// ============================================================================
// Module: Security Events
// Description: Typed account-security events pushed by the identity issuer.
// Purpose: Decode event-type URIs into an exhaustive enum with an explicit fallback.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Security events arrive as entries of a signed bundle keyed by event-type
//! URI. Each entry becomes one [`SecurityEvent`] that lives only on the
//! in-process channel between webhook receipt and dispatch. Unknown URIs are
//! preserved in [`SecurityEventKind::Unknown`] so they can be logged and
//! acknowledged without a retry loop.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Serialize;

use crate::core::identifiers::AgentId;

// ============================================================================
// SECTION: Event Type URIs
// ============================================================================

/// Account disabled by the issuer.
pub const ACCOUNT_DISABLED_URI: &str =
    "https://schemas.openid.net/secevent/risc/event-type/account-disabled";
/// Account re-enabled by the issuer.
pub const ACCOUNT_ENABLED_URI: &str =
    "https://schemas.openid.net/secevent/risc/event-type/account-enabled";
/// Account permanently deleted by the issuer.
pub const ACCOUNT_PURGED_URI: &str =
    "https://schemas.openid.net/secevent/risc/event-type/account-purged";
/// Issuer requires a credential change.
pub const CREDENTIAL_CHANGE_REQUIRED_URI: &str =
    "https://schemas.openid.net/secevent/risc/event-type/account-credential-change-required";
/// All sessions for the subject were revoked.
pub const SESSIONS_REVOKED_URI: &str =
    "https://schemas.openid.net/secevent/risc/event-type/sessions-revoked";
/// All OAuth tokens for the subject were revoked.
pub const TOKENS_REVOKED_URI: &str =
    "https://schemas.openid.net/secevent/oauth/event-type/tokens-revoked";
/// A single OAuth token for the subject was revoked.
pub const TOKEN_REVOKED_URI: &str =
    "https://schemas.openid.net/secevent/oauth/event-type/token-revoked";
/// Stream verification ping.
pub const VERIFICATION_URI: &str =
    "https://schemas.openid.net/secevent/risc/event-type/verification";

// ============================================================================
// SECTION: Event Kinds
// ============================================================================

/// Security event classification.
///
/// # Invariants
/// - Every URI maps to exactly one variant; unrecognized URIs map to `Unknown`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityEventKind {
    /// Account disabled.
    AccountDisabled,
    /// Account enabled.
    AccountEnabled,
    /// Account purged.
    AccountPurged,
    /// Credential change required.
    CredentialChangeRequired,
    /// Sessions revoked.
    SessionsRevoked,
    /// Tokens revoked (either URI variant).
    TokensRevoked,
    /// Verification ping.
    Verification,
    /// Unrecognized event type URI.
    Unknown(String),
}

impl SecurityEventKind {
    /// Classifies an event-type URI.
    #[must_use]
    pub fn from_uri(uri: &str) -> Self {
        match uri {
            ACCOUNT_DISABLED_URI => Self::AccountDisabled,
            ACCOUNT_ENABLED_URI => Self::AccountEnabled,
            ACCOUNT_PURGED_URI => Self::AccountPurged,
            CREDENTIAL_CHANGE_REQUIRED_URI => Self::CredentialChangeRequired,
            SESSIONS_REVOKED_URI => Self::SessionsRevoked,
            TOKENS_REVOKED_URI | TOKEN_REVOKED_URI => Self::TokensRevoked,
            VERIFICATION_URI => Self::Verification,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Returns a stable label for audit logs.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::AccountDisabled => "account_disabled",
            Self::AccountEnabled => "account_enabled",
            Self::AccountPurged => "account_purged",
            Self::CredentialChangeRequired => "credential_change_required",
            Self::SessionsRevoked => "sessions_revoked",
            Self::TokensRevoked => "tokens_revoked",
            Self::Verification => "verification",
            Self::Unknown(_) => "unknown",
        }
    }

    /// Returns true when the event mutates account state for a subject.
    #[must_use]
    pub const fn requires_subject(&self) -> bool {
        !matches!(self, Self::Verification | Self::Unknown(_))
    }
}

impl fmt::Display for SecurityEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(uri) => write!(f, "unknown({uri})"),
            other => f.write_str(other.label()),
        }
    }
}

// ============================================================================
// SECTION: Security Event
// ============================================================================

/// One decoded entry of a verified security event bundle.
///
/// # Invariants
/// - `subject` is `None` only when the bundle entry carried no subject.
/// - `issuer` is the verified bundle issuer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecurityEvent {
    /// Event classification.
    pub kind: SecurityEventKind,
    /// Affected agent.
    pub subject: Option<AgentId>,
    /// Bundle issuer.
    pub issuer: String,
    /// Issuer-supplied reason, when present.
    pub reason: Option<String>,
}

// ============================================================================
// SECTION: Tests
// ============================================================================
