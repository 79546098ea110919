//! Configuration for the RunHub backend.

use std::time::Duration;

use crate::secrets;

/// Provider and service constants.
pub mod api {
    use std::time::Duration;

    /// Strava authorization (consent) page.
    pub const AUTHORIZE_URL: &str = "https://www.strava.com/oauth/authorize";

    /// Strava token endpoint.
    pub const TOKEN_URL: &str = "https://www.strava.com/oauth/token";

    /// OAuth client id registered with Strava.
    pub const DEFAULT_CLIENT_ID: &str = "29349";

    /// Redirect URI registered with Strava.
    pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:3001/strava/redirect";

    /// Scope requested on first authorization.
    pub const DEFAULT_SCOPE: &str = "read";

    /// Landing page the browser returns to after auth flows.
    pub const DEFAULT_LANDING_URL: &str = "http://localhost:3000";

    /// Client secret file, one YAML document with a `secret` key.
    pub const DEFAULT_SECRET_FILE: &str = "./secret.yml";

    /// Token endpoint request timeout.
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

    /// Connection timeout.
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// OAuth client id.
    pub client_id: String,

    /// OAuth client secret. Empty when the secret file was missing or
    /// unreadable; token exchanges then fail with a configuration error.
    pub client_secret: String,

    /// Redirect URI sent to the provider's consent page.
    pub redirect_uri: String,

    /// Scope requested on first authorization.
    pub requested_scope: String,

    /// Authorization page URL (overridable for tests).
    pub authorize_url: String,

    /// Token endpoint URL (overridable for tests).
    pub token_url: String,

    /// Landing page for post-auth redirects.
    pub landing_url: String,

    /// SQLite file for the visit counter. `None` disables page counting.
    pub visits_db_path: Option<String>,

    /// Token endpoint request timeout.
    pub request_timeout: Duration,

    /// Connection timeout.
    pub connect_timeout: Duration,
}

impl Config {
    /// Create a configuration with the given credentials and the default
    /// provider endpoints.
    #[must_use]
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self {
            client_id,
            client_secret,
            redirect_uri: api::DEFAULT_REDIRECT_URI.to_string(),
            requested_scope: api::DEFAULT_SCOPE.to_string(),
            authorize_url: api::AUTHORIZE_URL.to_string(),
            token_url: api::TOKEN_URL.to_string(),
            landing_url: api::DEFAULT_LANDING_URL.to_string(),
            visits_db_path: None,
            request_timeout: api::REQUEST_TIMEOUT,
            connect_timeout: api::CONNECT_TIMEOUT,
        }
    }

    /// Create a test configuration pointing both provider URLs at a mock
    /// server.
    #[must_use]
    pub fn for_testing(base_url: &str) -> Self {
        Self {
            client_id: api::DEFAULT_CLIENT_ID.to_string(),
            client_secret: "test-secret".to_string(),
            redirect_uri: api::DEFAULT_REDIRECT_URI.to_string(),
            requested_scope: api::DEFAULT_SCOPE.to_string(),
            authorize_url: format!("{}/oauth/authorize", base_url),
            token_url: format!("{}/oauth/token", base_url),
            landing_url: api::DEFAULT_LANDING_URL.to_string(),
            visits_db_path: None,
            request_timeout: Duration::from_secs(2),
            connect_timeout: Duration::from_secs(1),
        }
    }

    /// Create configuration from environment variables.
    ///
    /// The client secret resolves from `STRAVA_CLIENT_SECRET` first, then
    /// from the secret file. A missing or unreadable secret is logged and
    /// leaves the secret empty rather than failing startup.
    ///
    /// # Errors
    ///
    /// Returns error if environment variables are invalid.
    pub fn from_env() -> anyhow::Result<Self> {
        let client_id = std::env::var("STRAVA_CLIENT_ID")
            .unwrap_or_else(|_| api::DEFAULT_CLIENT_ID.to_string());
        let secret_file = std::env::var("STRAVA_SECRET_FILE")
            .unwrap_or_else(|_| api::DEFAULT_SECRET_FILE.to_string());
        let client_secret = secrets::load_client_secret(&secret_file);

        let mut config = Self::new(client_id, client_secret);
        if let Ok(redirect_uri) = std::env::var("STRAVA_REDIRECT_URI") {
            config.redirect_uri = redirect_uri;
        }
        if let Ok(scope) = std::env::var("STRAVA_SCOPE") {
            config.requested_scope = scope;
        }
        if let Ok(landing_url) = std::env::var("LANDING_URL") {
            config.landing_url = landing_url;
        }
        config.visits_db_path = std::env::var("VISITS_DB_PATH").ok();

        Ok(config)
    }

    /// Check if a client secret is configured.
    #[must_use]
    pub fn has_client_secret(&self) -> bool {
        !self.client_secret.is_empty()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(api::DEFAULT_CLIENT_ID.to_string(), String::new())
    }
}
