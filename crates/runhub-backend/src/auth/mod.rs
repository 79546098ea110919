//! Token lifecycle management for the provider link.
//!
//! [`TokenManager`] owns the process-wide [`AuthorizationState`] behind an
//! async `RwLock` and pairs it with the outbound [`TokenClient`]. All
//! mutation funnels through [`TokenManager::apply_token_pair`], and the lock
//! is held only to read a snapshot or install a result; never across a
//! network call. Expiry is detected lazily when a caller asks for a
//! decision, so two racing requests may both see `RefreshRequired` and both
//! refresh; applies are serialized and the last one wins wholesale.

pub mod client;
pub mod state;

use std::sync::Arc;

use tokio::sync::RwLock;

pub use client::TokenClient;
pub use state::{AuthorizationState, Decision, TokenPair};

use crate::config::Config;
use crate::error::{ConfigError, ExchangeError, ExchangeResult};

/// Owns the authorization state and the provider client.
#[derive(Clone)]
pub struct TokenManager {
    state: Arc<RwLock<AuthorizationState>>,
    client: TokenClient,
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager").field("client", &self.client).finish()
    }
}

impl TokenManager {
    /// Create a manager with an empty (unauthorized) state.
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            state: Arc::new(RwLock::new(AuthorizationState::default())),
            client: TokenClient::new(config)?,
        })
    }

    /// Decide what is needed before the access token can be used.
    pub async fn needs_authorization(&self) -> Decision {
        let state = self.state.read().await;
        state.decide(chrono::Utc::now().timestamp())
    }

    /// Build the provider consent page redirect.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the client id or redirect URI is empty.
    pub fn authorize_url(&self) -> Result<url::Url, ConfigError> {
        self.client.authorize_url()
    }

    /// Redeem an authorization code for a token pair.
    ///
    /// The pair is returned without being installed; callers decide what to
    /// apply (the callback handler patches in the granted scope first). On
    /// error the stored state is untouched.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError`] on missing configuration, transport
    /// failure, provider rejection, or a malformed success body.
    pub async fn exchange_code(&self, code: &str) -> ExchangeResult<TokenPair> {
        self.client.exchange_code(code).await
    }

    /// Refresh the access token using the stored refresh token and install
    /// the result.
    ///
    /// The refresh token snapshot is taken under the read lock, the network
    /// call runs with no lock held, and the returned pair is installed
    /// through [`TokenManager::apply_token_pair`]. The provider may rotate
    /// the refresh token; whatever comes back overwrites the stored one. A
    /// refresh response carries no scope, so the previously granted scope is
    /// kept. On error the stored state is untouched and the refresh token
    /// remains available for the next attempt.
    ///
    /// # Errors
    ///
    /// Returns [`ExchangeError::NoRefreshToken`] when called before any
    /// authorization completed, otherwise the [`TokenClient::refresh`]
    /// contract.
    pub async fn refresh(&self) -> ExchangeResult<TokenPair> {
        let (refresh_token, prior_scope) = {
            let state = self.state.read().await;
            match state.refresh_token.clone().filter(|token| !token.is_empty()) {
                Some(token) => (token, state.scope.clone()),
                None => return Err(ExchangeError::NoRefreshToken),
            }
        };

        let mut pair = self.client.refresh(&refresh_token).await?;
        if pair.scope.is_empty() {
            pair.scope = prior_scope;
        }
        self.apply_token_pair(pair.clone()).await;
        Ok(pair)
    }

    /// Install a token pair, replacing all four state fields at once.
    ///
    /// The single mutation point. Idempotent: applying the same pair twice
    /// leaves the same state as applying it once.
    pub async fn apply_token_pair(&self, pair: TokenPair) {
        let mut state = self.state.write().await;
        state.apply(pair);
    }

    /// A consistent copy of the current state.
    ///
    /// Taken under the read lock, so the fields always belong to one applied
    /// pair, never a mix of two.
    pub async fn snapshot(&self) -> AuthorizationState {
        self.state.read().await.clone()
    }
}
