// crates/agent-gate-server/src/token.rs
// ============================================================================
// Module: Security Event Token Verification
// Description: Signature and claim checks for inbound event bundles.
// Purpose: Turn a compact signed bundle into typed security events.
// Dependencies: agent-gate-core, jsonwebtoken, serde
// ============================================================================

//! ## Overview
//! A bundle is a compact JWS. The header `kid` picks the verification key
//! from the [`SigningKeySet`]; a set holding a single key may be used without
//! a `kid`. Only RS256, ES256, and `EdDSA` signatures are accepted. The `iss`
//! claim must match the configured issuer and, when audiences are
//! configured, `aud` must contain one of them. Bundles carry no expiry;
//! `jti` and `iat` are passed through for the receiver's replay guard.
//!
//! Security posture: bundle bytes are untrusted; error messages never echo
//! the raw token.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use agent_gate_core::AgentId;
use agent_gate_core::SecurityEvent;
use agent_gate_core::SecurityEventKind;
use jsonwebtoken::Algorithm;
use jsonwebtoken::DecodingKey;
use jsonwebtoken::Validation;
use jsonwebtoken::decode;
use jsonwebtoken::decode_header;
use jsonwebtoken::jwk::Jwk;
use jsonwebtoken::jwk::JwkSet;
use serde::Deserialize;
use thiserror::Error;

use crate::keys::SigningKeySet;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum number of events accepted in one bundle.
pub const MAX_EVENTS_PER_BUNDLE: usize = 32;

/// Signature algorithms accepted for bundles.
const ALLOWED_ALGORITHMS: [Algorithm; 3] = [Algorithm::RS256, Algorithm::ES256, Algorithm::EdDSA];

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Bundle rejection reasons.
///
/// # Invariants
/// - Every variant maps to a 4xx webhook response; none is retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BundleError {
    /// The body is not a well-formed compact JWS.
    #[error("malformed bundle: {0}")]
    Malformed(String),
    /// The header names an algorithm outside the allow-list.
    #[error("unsupported bundle algorithm: {0}")]
    UnsupportedAlgorithm(String),
    /// No signing keys are loaded.
    #[error("no signing keys available")]
    NoKeys,
    /// The header omits `kid` while several keys are loaded.
    #[error("bundle kid is required when several keys are loaded")]
    MissingKid,
    /// No loaded key matches the header `kid`.
    #[error("no signing key for kid: {0}")]
    UnknownKey(String),
    /// Signature, issuer, or audience verification failed.
    #[error("bundle verification failed: {0}")]
    Verification(String),
    /// The verified claims are unusable.
    #[error("invalid bundle claims: {0}")]
    Claims(String),
}

// ============================================================================
// SECTION: Claims
// ============================================================================

/// Bundle claims consumed by the receiver.
#[derive(Debug, Deserialize)]
struct BundleClaims {
    /// Issuer.
    iss: String,
    /// Unique bundle identifier.
    #[serde(default)]
    jti: Option<String>,
    /// Issue time (unix seconds).
    #[serde(default)]
    iat: Option<i64>,
    /// Events keyed by event-type URI.
    events: BTreeMap<String, EventPayload>,
}

/// One event entry of a bundle.
#[derive(Debug, Default, Deserialize)]
struct EventPayload {
    /// Affected subject.
    #[serde(default)]
    subject: Option<EventSubject>,
    /// Issuer-supplied reason.
    #[serde(default)]
    reason: Option<String>,
    /// Verification state echo.
    #[serde(default)]
    state: Option<String>,
}

/// Subject identifier of an event entry.
#[derive(Debug, Default, Deserialize)]
struct EventSubject {
    /// Identifier format, such as `iss_sub` or `email`.
    #[serde(default)]
    subject_type: Option<String>,
    /// Issuer that minted `sub`.
    #[serde(default)]
    iss: Option<String>,
    /// Subject identifier at the issuer.
    #[serde(default)]
    sub: Option<String>,
}

impl EventSubject {
    /// Returns the agent identity carried by the subject.
    ///
    /// Agents are keyed by the issuer's stable `sub`. Formats without a `sub`
    /// (email, phone) and subjects minted by another issuer identify no agent.
    fn agent(&self, bundle_issuer: &str) -> Option<AgentId> {
        match self.subject_type.as_deref() {
            None | Some("iss_sub" | "id_token_claims") => {}
            Some(_) => return None,
        }
        if self.iss.as_deref().is_some_and(|iss| iss != bundle_issuer) {
            return None;
        }
        self.sub.as_deref().map(str::trim).filter(|sub| !sub.is_empty()).map(AgentId::new)
    }
}

// ============================================================================
// SECTION: Verifier
// ============================================================================

/// Verified bundle contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedBundle {
    /// Bundle identifier, when present.
    pub jti: Option<String>,
    /// Issue time in unix seconds, when present.
    pub issued_at: Option<i64>,
    /// Decoded events in event-type URI order.
    pub events: Vec<SecurityEvent>,
}

/// Security event bundle verifier.
#[derive(Debug, Clone)]
pub struct BundleVerifier {
    /// Required issuer.
    issuer: String,
    /// Accepted audiences; empty disables the audience check.
    audiences: Vec<String>,
    /// Verification keys.
    keys: Arc<SigningKeySet>,
}

impl BundleVerifier {
    /// Creates a verifier.
    #[must_use]
    pub fn new(
        issuer: impl Into<String>,
        audiences: Vec<String>,
        keys: Arc<SigningKeySet>,
    ) -> Self {
        Self {
            issuer: issuer.into(),
            audiences,
            keys,
        }
    }

    /// Returns the shared key set.
    #[must_use]
    pub const fn keys(&self) -> &Arc<SigningKeySet> {
        &self.keys
    }

    /// Verifies `token` and decodes its events.
    ///
    /// # Errors
    ///
    /// Returns [`BundleError`] when the token is malformed, signed with an
    /// unknown key or algorithm, fails issuer or audience checks, or carries
    /// unusable claims.
    pub fn verify(&self, token: &str) -> Result<VerifiedBundle, BundleError> {
        let token = token.trim();
        if token.split('.').count() != 3 {
            return Err(BundleError::Malformed("expected compact serialization".to_string()));
        }
        let header =
            decode_header(token).map_err(|err| BundleError::Malformed(err.to_string()))?;
        if !ALLOWED_ALGORITHMS.contains(&header.alg) {
            return Err(BundleError::UnsupportedAlgorithm(algorithm_name(header.alg).to_string()));
        }
        let jwks = self.keys.snapshot();
        let jwk = select_jwk(&jwks, header.kid.as_deref())?;
        let key = DecodingKey::from_jwk(jwk)
            .map_err(|err| BundleError::Verification(format!("unusable key: {err}")))?;

        let mut validation = Validation::new(header.alg);
        validation.required_spec_claims.clear();
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.set_issuer(&[self.issuer.as_str()]);
        if self.audiences.is_empty() {
            validation.validate_aud = false;
        } else {
            validation.set_audience(self.audiences.as_slice());
        }

        let data = decode::<BundleClaims>(token, &key, &validation)
            .map_err(|err| BundleError::Verification(err.to_string()))?;
        let claims = data.claims;
        if claims.events.is_empty() {
            return Err(BundleError::Claims("bundle carries no events".to_string()));
        }
        if claims.events.len() > MAX_EVENTS_PER_BUNDLE {
            return Err(BundleError::Claims(format!(
                "bundle carries more than {MAX_EVENTS_PER_BUNDLE} events"
            )));
        }
        let events = claims
            .events
            .into_iter()
            .map(|(uri, payload)| {
                let kind = SecurityEventKind::from_uri(&uri);
                let reason = payload.reason.or(payload.state);
                SecurityEvent {
                    kind,
                    subject: payload
                        .subject
                        .as_ref()
                        .and_then(|subject| subject.agent(&claims.iss)),
                    issuer: claims.iss.clone(),
                    reason,
                }
            })
            .collect();
        Ok(VerifiedBundle {
            jti: claims.jti,
            issued_at: claims.iat,
            events,
        })
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the JOSE name of an algorithm.
const fn algorithm_name(alg: Algorithm) -> &'static str {
    match alg {
        Algorithm::HS256 => "HS256",
        Algorithm::HS384 => "HS384",
        Algorithm::HS512 => "HS512",
        Algorithm::ES256 => "ES256",
        Algorithm::ES384 => "ES384",
        Algorithm::RS256 => "RS256",
        Algorithm::RS384 => "RS384",
        Algorithm::RS512 => "RS512",
        Algorithm::PS256 => "PS256",
        Algorithm::PS384 => "PS384",
        Algorithm::PS512 => "PS512",
        Algorithm::EdDSA => "EdDSA",
    }
}

/// Selects the verification key for a header `kid`.
fn select_jwk<'a>(jwks: &'a JwkSet, kid: Option<&str>) -> Result<&'a Jwk, BundleError> {
    match (kid, jwks.keys.as_slice()) {
        (_, []) => Err(BundleError::NoKeys),
        (Some(kid), keys) => keys
            .iter()
            .find(|jwk| jwk.common.key_id.as_deref() == Some(kid))
            .ok_or_else(|| BundleError::UnknownKey(kid.to_string())),
        (None, [only]) => Ok(only),
        (None, _) => Err(BundleError::MissingKid),
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

    fn jwk(kid: Option<&str>) -> Jwk {
        let mut value = serde_json::json!({
            "kty": "OKP",
            "crv": "Ed25519",
            "x": "meeMIGiSTU_wZftfLjtxAAf5ZY0frmG0qwFZVlqRD9s",
            "alg": "EdDSA",
        });
        if let Some(kid) = kid {
            value["kid"] = serde_json::Value::String(kid.to_string());
        }
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn select_jwk_requires_kid_for_multiple_keys() {
        let set = JwkSet {
            keys: vec![jwk(Some("a")), jwk(Some("b"))],
        };
        assert_eq!(select_jwk(&set, None).unwrap_err(), BundleError::MissingKid);
        assert_eq!(select_jwk(&set, Some("b")).unwrap().common.key_id.as_deref(), Some("b"));
        assert_eq!(
            select_jwk(&set, Some("c")).unwrap_err(),
            BundleError::UnknownKey("c".to_string())
        );
    }

    #[test]
    fn select_jwk_allows_missing_kid_for_single_key() {
        let set = JwkSet {
            keys: vec![jwk(None)],
        };
        assert!(select_jwk(&set, None).is_ok());
        let empty = JwkSet {
            keys: Vec::new(),
        };
        assert_eq!(select_jwk(&empty, None).unwrap_err(), BundleError::NoKeys);
    }

    #[test]
    fn subject_agent_follows_issuer_and_format() {
        let subject = EventSubject {
            subject_type: Some("email".to_string()),
            iss: None,
            sub: None,
        };
        assert!(subject.agent("iss").is_none());
        let subject = EventSubject {
            subject_type: Some("iss_sub".to_string()),
            iss: Some("iss".to_string()),
            sub: Some(" 1234 ".to_string()),
        };
        assert_eq!(subject.agent("iss"), Some(AgentId::new("1234")));
        assert!(subject.agent("other").is_none());
        let subject = EventSubject {
            subject_type: None,
            iss: None,
            sub: Some("5678".to_string()),
        };
        assert_eq!(subject.agent("iss"), Some(AgentId::new("5678")));
    }

    #[test]
    fn verify_rejects_non_compact_input() {
        let verifier = BundleVerifier::new("iss", Vec::new(), Arc::new(SigningKeySet::new()));
        assert!(matches!(verifier.verify("not a token"), Err(BundleError::Malformed(_))));
    }
}
