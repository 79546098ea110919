//! Error types for the RunHub backend.
//!
//! Uses `thiserror` for structured error handling with automatic `From` implementations.

use std::time::Duration;

/// Missing or unusable static configuration. Never retryable.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// OAuth client id is not configured
    #[error("client_id is not configured")]
    MissingClientId,

    /// OAuth redirect URI is not configured
    #[error("redirect_uri is not configured")]
    MissingRedirectUri,

    /// OAuth client secret is not configured
    #[error("client_secret is not configured")]
    MissingClientSecret,

    /// Authorization page URL does not parse
    #[error("authorize_url is not a valid URL: {0}")]
    InvalidAuthorizeUrl(String),
}

/// Errors from token endpoint exchanges.
///
/// None of these are retried automatically: an authorization code is
/// single-use and a failed refresh is retried on the next request instead.
#[derive(thiserror::Error, Debug)]
pub enum ExchangeError {
    /// Static configuration missing; the request was never sent
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// No refresh token has been obtained yet
    #[error("no refresh token available")]
    NoRefreshToken,

    /// HTTP transport error (connection, DNS, TLS, etc.)
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    /// Request timed out
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Provider rejected the grant (non-2xx response)
    #[error("provider returned {status}: {code}")]
    Provider {
        /// HTTP status code
        status: u16,
        /// OAuth error code from the body, or a body snippet
        code: String,
        /// Optional `error_description` from the body
        description: Option<String>,
    },

    /// Success response missing required token fields
    #[error("malformed token response: {0}")]
    MalformedResponse(String),
}

impl ExchangeError {
    /// Wrap a reqwest error, surfacing timeouts as their own variant.
    #[must_use]
    pub fn transport(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() { Self::Timeout(timeout) } else { Self::Http(err) }
    }

    /// Create a provider rejection error.
    #[must_use]
    pub fn provider(status: u16, code: impl Into<String>, description: Option<String>) -> Self {
        Self::Provider { status, code: code.into(), description }
    }

    /// Create a malformed response error.
    #[must_use]
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedResponse(message.into())
    }

    /// HTTP status of the provider response, if one was received.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Provider { status, .. } => Some(*status),
            Self::Http(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Returns true if the request never reached a provider decision.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Timeout(_))
    }
}

/// Errors from the visit counter store.
#[derive(thiserror::Error, Debug)]
pub enum VisitStoreError {
    /// Connection pool checkout or setup failed
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// SQL execution failed
    #[error("sqlite error: {0}")]
    Sql(#[from] rusqlite::Error),

    /// Blocking task panicked or was cancelled
    #[error("storage task failed: {0}")]
    Task(String),
}

/// Result type alias for token exchange operations.
pub type ExchangeResult<T> = Result<T, ExchangeError>;

/// Result type alias for visit store operations.
pub type VisitResult<T> = Result<T, VisitStoreError>;
