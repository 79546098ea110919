//! Authorization state and the decision function over it.

/// What must happen before the access token can be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// No refresh token yet; the user must consent at the provider.
    FreshAuthorizationRequired,
    /// A refresh token exists but the access token has expired.
    RefreshRequired,
    /// The access token is still valid.
    Valid,
}

impl Decision {
    /// Returns true if the stored access token can be used as-is.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        matches!(self, Self::Valid)
    }
}

/// A complete credential set returned by the token endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    /// Bearer token for provider API calls.
    pub access_token: String,
    /// Long-lived token redeemable for a new access token.
    pub refresh_token: String,
    /// Access token expiry, epoch seconds.
    pub expires_at: i64,
    /// Scope granted with this pair.
    pub scope: String,
}

/// The single mutable authorization record for this process.
///
/// Starts empty and moves through `Unauthorized -> Authorized -> Expired ->
/// Authorized` as pairs are applied and wall-clock time passes `expires_at`.
/// Expiry is detected lazily by [`AuthorizationState::decide`]; nothing in
/// the system runs on a timer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorizationState {
    /// Current access token, absent until the first successful exchange.
    pub access_token: Option<String>,
    /// Current refresh token. Once set it is only ever replaced by a
    /// successful refresh, never cleared.
    pub refresh_token: Option<String>,
    /// Access token expiry, epoch seconds. Zero until the first exchange.
    pub expires_at: i64,
    /// Last granted scope.
    pub scope: String,
}

impl AuthorizationState {
    /// Decide what is needed before the access token can be used.
    ///
    /// Pure over `(self, now)`: no clock reads, no side effects. A token
    /// whose `expires_at` equals `now` is already expired.
    #[must_use]
    pub fn decide(&self, now: i64) -> Decision {
        if self.refresh_token.as_deref().is_none_or(str::is_empty) {
            return Decision::FreshAuthorizationRequired;
        }
        if self.expires_at <= now {
            return Decision::RefreshRequired;
        }
        Decision::Valid
    }

    /// Install a token pair, replacing all four fields at once.
    ///
    /// This is the only mutation point for the state.
    pub fn apply(&mut self, pair: TokenPair) {
        self.access_token = Some(pair.access_token);
        self.refresh_token = Some(pair.refresh_token);
        self.expires_at = pair.expires_at;
        self.scope = pair.scope;
    }
}
