//! Tokenpost server binary

use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tokenpost::{
    auth::JwtValidator,
    config::{Args, Command, LogFormat},
    db::Database,
    seed,
    server::{self, AppState},
    services::{events::spawn_logging_listener, expiry_service::spawn_expiry_sweep, Services},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let log_level = args.log_level.clone();
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("tokenpost={},info", log_level).into());
    match args.log_format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    let db = match &args.database_path {
        Some(path) => Some(Arc::new(Database::open(path)?)),
        None => None,
    };

    if matches!(args.command, Some(Command::Seed)) {
        let Some(db) = db else {
            anyhow::bail!("DATABASE_PATH is required to seed");
        };
        let report = seed::seed(&db)?;
        info!(
            "Seeded: admin {} ({} posts created)",
            seed::ADMIN_EMAIL,
            report.posts_created
        );
        return Ok(());
    }

    info!("======================================");
    info!("  Tokenpost");
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("Settlement: {:?}", args.settlement);
    info!("======================================");

    let services = match db {
        Some(db) => {
            let services = Arc::new(Services::new(db, args.ledger_settings()));
            spawn_logging_listener(services.events.clone());
            spawn_expiry_sweep(
                services.expiry.clone(),
                Duration::from_secs(args.sweep_interval_secs),
            );
            Some(services)
        }
        None => {
            warn!("DATABASE_PATH not set; data-backed routes will answer 503");
            None
        }
    };

    let jwt = match args.jwt_secret() {
        Some(secret) => JwtValidator::new(secret, args.jwt_expiry_seconds)?,
        None => JwtValidator::new_dev(),
    };

    let state = AppState::new(services, jwt, args.dev_mode);
    server::run(args.listen, state).await
}
