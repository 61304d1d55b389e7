//! Lockbox server binary.

use clap::Parser;
use lockbox_server::auth::TokenService;
use lockbox_server::storage::Storage;
use lockbox_server::{build_router, BuildInfo, RecordService, ServerConfig};
use rand::RngCore;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lockbox-server", about = "Lockbox encrypted record server")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "lockbox-server.toml")]
    config: PathBuf,

    /// Listen address override
    #[arg(short, long, env = "RUN_ADDRESS")]
    listen: Option<String>,

    /// Database path override
    #[arg(short, long, env = "DATABASE_PATH")]
    database: Option<PathBuf>,

    /// Token signing secret
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    jwt_secret: Option<String>,

    /// Token lifetime in seconds
    #[arg(long, env = "TOKEN_TTL_SECS")]
    token_ttl_secs: Option<u64>,

    /// Build date reported by /version (YYYY-MM-DD)
    #[arg(long, env = "BUILD_DATE")]
    build_date: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cli = Cli::parse();

    let mut cfg = if cli.config.exists() {
        ServerConfig::load(&cli.config)?
    } else {
        tracing::info!("No config file found, using defaults");
        ServerConfig::default()
    };

    if let Some(listen) = cli.listen {
        cfg.listen_addr = listen;
    }
    if let Some(database) = cli.database {
        cfg.database_path = database;
    }
    if let Some(secret) = cli.jwt_secret {
        cfg.jwt_secret = secret;
    }
    if let Some(ttl) = cli.token_ttl_secs {
        cfg.token_ttl_secs = ttl;
    }
    if let Some(date) = cli.build_date {
        cfg.build_date = Some(date);
    }
    cfg.validate()?;

    let secret = if cfg.jwt_secret.is_empty() {
        tracing::warn!("No JWT secret configured, tokens will not survive a restart");
        let mut secret = vec![0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut secret);
        secret
    } else {
        cfg.jwt_secret.clone().into_bytes()
    };

    let storage = Storage::open(&cfg.database_path)?;
    let tokens = TokenService::new(&secret, Duration::from_secs(cfg.token_ttl_secs));
    let service = RecordService::new(storage, tokens, BuildInfo::current(cfg.parsed_build_date()?));
    let app = build_router(service, cfg.max_payload_size);

    tracing::info!("Starting lockbox server on {}", cfg.listen_addr);
    let listener = tokio::net::TcpListener::bind(&cfg.listen_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
