//! # RunHub Backend
//!
//! Backend for the RunHub landing page: a visit counter backed by SQLite
//! and a Strava account link driven by the OAuth authorization-code flow.
//!
//! ## Features
//!
//! - **Visit counter**: every landing-page hit is recorded; `/pagecount`
//!   exposes the running total as JSON
//! - **Strava authorization**: lazy token lifecycle with explicit
//!   fresh-authorization / refresh / valid decisions, no background timers
//! - **Atomic token state**: readers always observe a matching
//!   access/refresh pair, even while a refresh is in flight
//!
//! ## Example
//!
//! ```no_run
//! use runhub_backend::{Config, RunHubServer};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let server = RunHubServer::new(config)?;
//!     server.run("0.0.0.0".parse()?, 8080).await
//! }
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod secrets;
pub mod server;
pub mod visits;

pub use auth::{AuthorizationState, Decision, TokenManager, TokenPair};
pub use config::Config;
pub use error::{ConfigError, ExchangeError, VisitStoreError};
pub use server::RunHubServer;
pub use visits::VisitStore;
