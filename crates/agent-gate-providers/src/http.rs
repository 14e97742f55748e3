// crates/agent-gate-providers/src/http.rs
// ============================================================================
// Module: Provider HTTP Client
// Description: Shared async GET client for reputation provider APIs.
// Purpose: Apply timeouts, path encoding, and JSON decoding consistently.
// Dependencies: reqwest, serde
// ============================================================================

//! ## Overview
//! Every built-in source issues a single authenticated `GET` per lookup with
//! a fixed request timeout. The agent identifier is appended as an encoded
//! path segment; API keys travel as query parameters and are never logged.
//! Response bodies are read incrementally and never buffered past the size
//! limit.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use reqwest::Client;
use reqwest::StatusCode;
use reqwest::Url;
use reqwest::redirect::Policy;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::source::ProviderError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default request timeout for provider lookups.
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(3);

/// Maximum accepted response size in bytes.
const MAX_RESPONSE_BYTES: usize = 256 * 1024;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Connection settings shared by HTTP trust sources.
///
/// # Invariants
/// - `base_url` is an absolute http(s) URL.
/// - `timeout` bounds the full request lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpSourceConfig {
    /// Provider API base URL.
    pub base_url: String,
    /// API key sent as a query parameter.
    pub api_key: String,
    /// Request timeout.
    pub timeout: Duration,
    /// User agent string for outbound requests.
    pub user_agent: String,
}

impl HttpSourceConfig {
    /// Creates settings with the default timeout and user agent.
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout: DEFAULT_PROVIDER_TIMEOUT,
            user_agent: format!("agent-gate/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

// ============================================================================
// SECTION: Client
// ============================================================================

/// JSON GET client bound to one provider base URL.
#[derive(Debug, Clone)]
pub struct ProviderHttpClient {
    /// Parsed base URL (no trailing slash).
    base_url: Url,
    /// API key query value.
    api_key: String,
    /// HTTP client configured with timeouts.
    client: Client,
}

impl ProviderHttpClient {
    /// Builds a client for the given settings.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Config`] when the URL is invalid or the client
    /// cannot be built.
    pub fn new(config: &HttpSourceConfig) -> Result<Self, ProviderError> {
        let trimmed = config.base_url.trim_end_matches('/');
        let base_url = Url::parse(trimmed)
            .map_err(|err| ProviderError::Config(format!("invalid base url: {err}")))?;
        match base_url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(ProviderError::Config(format!("unsupported url scheme: {other}")));
            }
        }
        if base_url.cannot_be_a_base() {
            return Err(ProviderError::Config("base url cannot carry a path".to_string()));
        }
        let client = Client::builder()
            .connect_timeout(config.timeout)
            .timeout(config.timeout)
            .redirect(Policy::none())
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|err| ProviderError::Config(err.to_string()))?;
        Ok(Self {
            base_url,
            api_key: config.api_key.clone(),
            client,
        })
    }

    /// Builds `{base}/{segments...}?{key_param}={api_key}` with each segment
    /// percent-encoded.
    fn url_for(&self, segments: &[&str], key_param: &str) -> Result<Url, ProviderError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ProviderError::Config("base url cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(segments);
        url.query_pairs_mut().append_pair(key_param, &self.api_key);
        Ok(url)
    }

    /// Issues `GET {base}/{segments}?{key_param}={api_key}` and decodes JSON.
    ///
    /// Returns `Ok(None)` on HTTP 404.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on transport failure, a non-success status,
    /// an oversized body, or a decode failure.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        key_param: &str,
    ) -> Result<Option<T>, ProviderError> {
        let url = self.url_for(segments, key_param)?;
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| ProviderError::Network(redact(&err)))?;
        match response.status() {
            StatusCode::NOT_FOUND => return Ok(None),
            status if status.is_success() => {}
            status => return Err(ProviderError::Status(status.as_u16())),
        }
        let body = read_response_limited(&mut response, MAX_RESPONSE_BYTES)
            .await
            .map_err(|err| match err {
                ResponseReadError::Transport(message) => ProviderError::Network(message),
                other => ProviderError::Decode(other.to_string()),
            })?;
        serde_json::from_slice(&body)
            .map(Some)
            .map_err(|err| ProviderError::Decode(err.to_string()))
    }
}

// ============================================================================
// SECTION: Bounded Reads
// ============================================================================

/// Failures while reading a size-limited response body.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResponseReadError {
    /// The declared or received body exceeds the limit.
    #[error("response exceeds size limit of {0} bytes")]
    TooLarge(usize),
    /// Fewer bytes arrived than the declared length.
    #[error("response truncated")]
    Truncated,
    /// The body stream failed.
    #[error("failed to read response: {0}")]
    Transport(String),
}

/// Reads at most `max_bytes` of `response`, rejecting on `Content-Length`
/// before any body bytes are buffered.
///
/// # Errors
///
/// Returns [`ResponseReadError`] when the body is too large, truncated, or
/// the stream fails.
pub async fn read_response_limited(
    response: &mut reqwest::Response,
    max_bytes: usize,
) -> Result<Vec<u8>, ResponseReadError> {
    let expected_len = response.content_length();
    let max_bytes_u64 =
        u64::try_from(max_bytes).map_err(|_| ResponseReadError::TooLarge(max_bytes))?;
    if let Some(expected) = expected_len
        && expected > max_bytes_u64
    {
        return Err(ResponseReadError::TooLarge(max_bytes));
    }
    let mut buf = Vec::new();
    while let Some(chunk) =
        response.chunk().await.map_err(|err| ResponseReadError::Transport(redact(&err)))?
    {
        if buf.len().saturating_add(chunk.len()) > max_bytes {
            return Err(ResponseReadError::TooLarge(max_bytes));
        }
        buf.extend_from_slice(&chunk);
    }
    if let Some(expected) = expected_len
        && !u64::try_from(buf.len()).is_ok_and(|received| received >= expected)
    {
        return Err(ResponseReadError::Truncated);
    }
    Ok(buf)
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Renders a transport error without the request URL (which carries the key).
fn redact(err: &reqwest::Error) -> String {
    let kind = if err.is_timeout() {
        "timeout"
    } else if err.is_connect() {
        "connect failed"
    } else {
        "request failed"
    };
    err.status().map_or_else(|| kind.to_string(), |status| format!("{kind}: status {status}"))
}
