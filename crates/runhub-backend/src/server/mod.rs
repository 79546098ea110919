//! HTTP server for the RunHub backend.

pub mod routes;

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

pub use routes::create_router;

use crate::auth::TokenManager;
use crate::config::Config;
use crate::visits::VisitStore;

/// Shared state for HTTP handlers.
#[derive(Debug)]
pub struct AppState {
    /// Server configuration.
    pub config: Config,

    /// Token lifecycle manager for the provider link.
    pub tokens: TokenManager,

    /// Visit counter, absent when no database is configured or it failed
    /// to open.
    pub visits: Option<VisitStore>,
}

/// RunHub backend server.
pub struct RunHubServer {
    state: Arc<AppState>,
}

impl RunHubServer {
    /// Assemble the server from configuration.
    ///
    /// A visit store that fails to open disables page counting but never
    /// prevents startup; the token manager is always available.
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let tokens = TokenManager::new(&config)?;

        let visits = match config.visits_db_path.as_deref() {
            Some(path) => match VisitStore::open(path) {
                Ok(store) => {
                    tracing::info!(path, "visit store opened");
                    Some(store)
                }
                Err(err) => {
                    tracing::warn!(path, error = %err, "visit store unavailable, page counting disabled");
                    None
                }
            },
            None => {
                tracing::info!("no visits database configured, page counting disabled");
                None
            }
        };

        Ok(Self { state: Arc::new(AppState { config, tokens, visits }) })
    }

    /// Run the HTTP server until shutdown.
    ///
    /// # Errors
    ///
    /// Returns error on bind or server failure.
    pub async fn run(self, ip: IpAddr, port: u16) -> anyhow::Result<()> {
        let router = routes::create_router(Arc::clone(&self.state));
        let addr = SocketAddr::new(ip, port);

        tracing::info!("HTTP server listening on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("HTTP server shut down");
        Ok(())
    }

    /// Shared handler state, for embedding the router in tests.
    #[must_use]
    pub fn state(&self) -> Arc<AppState> {
        Arc::clone(&self.state)
    }
}

impl std::fmt::Debug for RunHubServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunHubServer").field("state", &self.state).finish()
    }
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c().await.expect("Failed to install CTRL+C handler");
    tracing::info!("Received shutdown signal");
}
