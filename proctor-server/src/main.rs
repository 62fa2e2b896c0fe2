//! proctor-server - Main entry point
//!
//! Online exam proctoring and automated grading service: session
//! lifecycle, multi-channel violation ingestion, integrity scoring,
//! and detached grading, over one SQLite database.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use proctor_common::db::init_database;
use proctor_server::api;
use proctor_server::config::Config;
use proctor_server::grading::judge::{CodeJudge, DisabledJudge, HttpCodeJudge};
use proctor_server::grading::scorers::TokenOverlapSimilarity;
use proctor_server::signal::DisabledDetector;
use proctor_server::state::AppContext;

/// Command-line arguments for proctor-server
#[derive(Parser, Debug)]
#[command(name = "proctor-server")]
#[command(about = "Exam proctoring and grading service")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "5800", env = "PROCTOR_PORT")]
    port: u16,

    /// Path to the SQLite database file
    #[arg(short, long, default_value = "proctor.db", env = "PROCTOR_DB")]
    db: PathBuf,

    /// Base URL of the external code-execution judge
    #[arg(long, env = "PROCTOR_JUDGE_URL")]
    judge_url: Option<String>,

    /// API key for the code-execution judge
    #[arg(long, env = "PROCTOR_JUDGE_KEY")]
    judge_key: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "proctor_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = Config {
        port: args.port,
        db_path: args.db,
        judge_url: args.judge_url,
        judge_key: args.judge_key,
    };

    info!("Starting proctor-server on port {}", config.port);
    info!("Database: {}", config.db_path.display());

    let db = init_database(&config.db_path)
        .await
        .context("Failed to initialize database")?;
    info!("Database initialized");

    let judge: Arc<dyn CodeJudge> = match &config.judge_url {
        Some(url) => {
            info!("Code judge: {}", url);
            Arc::new(
                HttpCodeJudge::new(url.clone(), config.judge_key.clone())
                    .context("Failed to build judge client")?,
            )
        }
        None => {
            info!("Code judge not configured; code questions will score 0");
            Arc::new(DisabledJudge)
        }
    };

    let ctx = AppContext::new(
        db,
        Arc::new(DisabledDetector),
        Arc::new(TokenOverlapSimilarity),
        judge,
    );

    let app = api::create_router(ctx);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
