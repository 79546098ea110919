//! RunHub backend - entry point.
//!
//! Serves the visit-counting landing page and the Strava authorization
//! flow over HTTP.

use std::net::IpAddr;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use runhub_backend::{Config, RunHubServer};

#[derive(Parser, Debug)]
#[command(name = "runhub-backend")]
#[command(about = "Backend for the RunHub page counter and Strava account linking")]
#[command(version)]
struct Cli {
    /// Address to bind the HTTP server to
    #[arg(long, default_value = "0.0.0.0", env = "IP")]
    ip: IpAddr,

    /// HTTP server port
    #[arg(long, default_value = "8080", env = "PORT")]
    port: u16,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,
}

fn init_tracing(log_level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if json {
        subscriber
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        subscriber
            .with(tracing_subscriber::fmt::layer().compact())
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env before clap so `env =` arguments can pick values up.
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    init_tracing(&cli.log_level, cli.json_logs);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        ip = %cli.ip,
        port = cli.port,
        "Starting RunHub backend"
    );

    let config = Config::from_env()?;
    let server = RunHubServer::new(config)?;
    server.run(cli.ip, cli.port).await?;

    Ok(())
}
