//! HTTP server and shared application state

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use crate::auth::{ChallengeStore, JwtValidator};
use crate::error::AppError;
use crate::routes;
use crate::services::Services;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// None when no database is configured; every data-backed route is 503
    pub services: Option<Arc<Services>>,
    pub jwt: Arc<JwtValidator>,
    pub challenges: Arc<ChallengeStore>,
    pub dev_mode: bool,
}

impl AppState {
    pub fn new(services: Option<Arc<Services>>, jwt: JwtValidator, dev_mode: bool) -> Self {
        Self {
            services,
            jwt: Arc::new(jwt),
            challenges: Arc::new(ChallengeStore::new()),
            dev_mode,
        }
    }

    /// Services, or 503 when the database is not configured
    pub fn services(&self) -> Result<&Arc<Services>, AppError> {
        self.services
            .as_ref()
            .ok_or_else(|| AppError::Unavailable("Database not configured".into()))
    }
}

/// Serve the API until ctrl-c or SIGTERM
pub async fn run(listen: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let app = routes::create_router(state);
    let listener = TcpListener::bind(listen).await?;
    info!(addr = %listen, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("Shutting down...");
}
