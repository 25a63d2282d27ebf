//! ci-bridge server binary.
//!
//! Loads the bridge configuration, wires the GitHub and Jenkins clients into
//! the router and serves webhook, notification and manual build endpoints.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use ci_bridge::config::BridgeConfig;
use ci_bridge::routes::{self, AppState};
use ci_bridge::services::github_service::GitHubClient;
use ci_bridge::services::jenkins_service::JenkinsClient;

#[derive(Parser)]
#[command(name = "ci-bridge", version, about = "GitHub to Jenkins CI bridge")]
struct Cli {
    /// Server port
    #[arg(short, long, env = "CI_PORT", default_value = "80")]
    port: u16,

    /// Path to the JSON config file
    #[arg(short, long, env = "CI_CONFIG", default_value = "/etc/ci-bridge/config.json")]
    config: PathBuf,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    debug: bool,

    /// Upper bound for handling a single inbound request
    #[arg(long, env = "CI_REQUEST_TIMEOUT_SECS", default_value = "60")]
    request_timeout_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let default_level = if cli.debug { "debug" } else { "info" };
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    if log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| default_level.into()),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| default_level.into()),
            )
            .init();
    }

    tracing::info!("Starting ci-bridge...");

    let config = BridgeConfig::load(&cli.config)
        .map_err(|e| anyhow::anyhow!("loading {}: {e}", cli.config.display()))?;
    tracing::info!(
        builds = config.builds.len(),
        build_commits = ?config.build_commits,
        check_dco = config.check_dco,
        "Configuration loaded"
    );

    let state = AppState {
        github: Arc::new(GitHubClient::from_config(&config)),
        jenkins: Arc::new(JenkinsClient::new(&config.jenkins)),
        config: Arc::new(config),
    };

    let app = routes::router(state, Duration::from_secs(cli.request_timeout_secs));

    // Initialize metrics
    ci_bridge::metrics::init_metrics();

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
    tracing::info!("ci-bridge listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
