//! HTTP routes
//!
//! Handlers stay thin: extract the caller and body, call one service method,
//! shape the JSON. Business rules live in `crate::services`.
//!
//! - `posts`: timeline, posting, like/share
//! - `exchange`: market listing, portfolio, trades
//! - `dividends`: distribution and claims per post
//! - `governance`: proposals and votes per post
//! - `account`: wallet connection, premium/admin status, exchange rates
//! - `auth_routes`: wallet sign-in, dev login, current user
//! - `health`: liveness and storage stats
//! - `extract`: JSON body extractor with the crate's error shape

pub mod account;
pub mod auth_routes;
pub mod dividends;
pub mod exchange;
pub mod extract;
pub mod governance;
pub mod health;
pub mod posts;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::server::AppState;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Posts
        .route("/posts", get(posts::timeline).post(posts::create))
        .route("/posts/like", post(posts::like))
        .route("/posts/share", post(posts::share))
        // Exchange
        .route("/exchange", get(exchange::market))
        .route("/exchange/portfolio", get(exchange::portfolio))
        .route("/exchange/trade", post(exchange::trade))
        // Dividends
        .route(
            "/posts/:post_id/dividends",
            get(dividends::list).post(dividends::distribute),
        )
        .route(
            "/posts/:post_id/dividends/:distribution_id/claim",
            get(dividends::claim_status).post(dividends::claim),
        )
        // Governance
        .route(
            "/posts/:post_id/governance",
            get(governance::overview).post(governance::propose),
        )
        .route(
            "/posts/:post_id/governance/:proposal_id/vote",
            get(governance::results).post(governance::vote),
        )
        // Account
        .route(
            "/wallet/connect",
            get(account::list_wallets).post(account::connect_wallet),
        )
        .route("/user/premium-status", get(account::premium_status))
        .route("/admin/status", get(account::admin_status))
        .route("/exchange-rates", get(account::exchange_rates))
        // Auth
        .route("/auth/wallet/challenge", get(auth_routes::wallet_challenge))
        .route("/auth/wallet", post(auth_routes::wallet_login))
        .route("/auth/dev-login", post(auth_routes::dev_login))
        .route("/auth/me", get(auth_routes::me))
        // Health
        .route("/health", get(health::health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
