//! Outbound client for the provider's OAuth endpoints.
//!
//! Speaks the two grants the backend needs: `authorization_code` for the
//! first consent and `refresh_token` afterwards. Requests are form-encoded
//! POSTs with an explicit timeout and no retry policy; an authorization code
//! is single-use, so a failed exchange is surfaced, never replayed.

use std::time::Duration;

use serde::Deserialize;
use url::Url;

use super::state::TokenPair;
use crate::config::Config;
use crate::error::{ConfigError, ExchangeError, ExchangeResult};

/// Longest provider error body fragment carried into an error value.
const ERROR_SNIPPET_LEN: usize = 200;

/// HTTP client for the provider's authorize and token endpoints.
#[derive(Clone)]
pub struct TokenClient {
    /// Underlying HTTP client.
    client: reqwest::Client,

    /// OAuth client id.
    client_id: String,

    /// OAuth client secret (may be empty; exchanges then fail fast).
    client_secret: String,

    /// Redirect URI sent to the consent page.
    redirect_uri: String,

    /// Scope requested on first authorization.
    requested_scope: String,

    /// Authorization page URL.
    authorize_url: String,

    /// Token endpoint URL.
    token_url: String,

    /// Request timeout, reported in timeout errors.
    request_timeout: Duration,
}

/// Success body from the token endpoint.
///
/// Strava returns an absolute `expires_at` in epoch seconds. `scope` is only
/// present on code exchanges, not on refreshes.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_at: Option<i64>,
    scope: Option<String>,
}

/// Error body from the token endpoint (best effort).
#[derive(Debug, Default, Deserialize)]
struct TokenErrorResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

impl TokenClient {
    /// Create a new client from the configuration.
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;

        Ok(Self {
            client,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
            requested_scope: config.requested_scope.clone(),
            authorize_url: config.authorize_url.clone(),
            token_url: config.token_url.clone(),
            request_timeout: config.request_timeout,
        })
    }

    /// Build the provider consent page redirect.
    ///
    /// Query parameters are percent-encoded by the `url` crate; callers can
    /// hand the result straight to a `Location` header.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the client id or redirect URI is empty,
    /// or when the configured authorization URL does not parse.
    pub fn authorize_url(&self) -> Result<Url, ConfigError> {
        if self.client_id.is_empty() {
            return Err(ConfigError::MissingClientId);
        }
        if self.redirect_uri.is_empty() {
            return Err(ConfigError::MissingRedirectUri);
        }

        let mut url = Url::parse(&self.authorize_url)
            .map_err(|err| ConfigError::InvalidAuthorizeUrl(err.to_string()))?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("scope", &self.requested_scope);
        Ok(url)
    }

    /// Redeem an authorization code for a token pair.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError`] on missing configuration, transport
    /// failure, provider rejection, or a malformed success body.
    pub async fn exchange_code(&self, code: &str) -> ExchangeResult<TokenPair> {
        self.require_credentials()?;

        let form = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
        ];
        self.post_token(&form).await
    }

    /// Redeem a refresh token for a new token pair.
    ///
    /// The provider may rotate the refresh token; the returned pair carries
    /// whatever the provider sent back.
    ///
    /// # Errors
    ///
    /// Same contract as [`TokenClient::exchange_code`].
    pub async fn refresh(&self, refresh_token: &str) -> ExchangeResult<TokenPair> {
        self.require_credentials()?;

        let form = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];
        self.post_token(&form).await
    }

    fn require_credentials(&self) -> Result<(), ExchangeError> {
        if self.client_id.is_empty() {
            return Err(ConfigError::MissingClientId.into());
        }
        if self.client_secret.is_empty() {
            return Err(ConfigError::MissingClientSecret.into());
        }
        Ok(())
    }

    async fn post_token(&self, form: &[(&str, &str)]) -> ExchangeResult<TokenPair> {
        let response = self
            .client
            .post(&self.token_url)
            .form(form)
            .send()
            .await
            .map_err(|err| ExchangeError::transport(err, self.request_timeout))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| ExchangeError::transport(err, self.request_timeout))?;

        if !status.is_success() {
            return Err(provider_error(status.as_u16(), &body));
        }

        parse_token_pair(&body)
    }
}

impl std::fmt::Debug for TokenClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenClient")
            .field("client_id", &self.client_id)
            .field("has_client_secret", &!self.client_secret.is_empty())
            .field("token_url", &self.token_url)
            .finish()
    }
}

fn parse_token_pair(body: &str) -> ExchangeResult<TokenPair> {
    let parsed: TokenResponse = serde_json::from_str(body)
        .map_err(|err| ExchangeError::malformed(format!("invalid JSON: {err}")))?;

    let access_token = parsed
        .access_token
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ExchangeError::malformed("missing access_token"))?;
    let refresh_token = parsed
        .refresh_token
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ExchangeError::malformed("missing refresh_token"))?;
    let expires_at =
        parsed.expires_at.ok_or_else(|| ExchangeError::malformed("missing expires_at"))?;

    Ok(TokenPair {
        access_token,
        refresh_token,
        expires_at,
        scope: parsed.scope.unwrap_or_default(),
    })
}

fn provider_error(status: u16, body: &str) -> ExchangeError {
    let parsed: TokenErrorResponse = serde_json::from_str(body).unwrap_or_default();

    let code = parsed
        .error
        .filter(|code| !code.is_empty())
        .unwrap_or_else(|| body.chars().take(ERROR_SNIPPET_LEN).collect());
    ExchangeError::provider(status, code, parsed.error_description)
}
