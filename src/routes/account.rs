//! Wallet connection, account status and exchange rates

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::Principal;
use crate::error::AppError;
use crate::rates;
use crate::server::AppState;
use crate::services::user_service::{AdminStatus, PremiumStatus};
use crate::services::wallet_service::{ConnectOutcome, ConnectRequest};

use super::extract::ApiJson;

/// GET /wallet/connect
pub async fn list_wallets(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<Value>, AppError> {
    let wallets = state.services()?.wallets.list(principal.user_id())?;
    Ok(Json(json!({ "wallets": wallets })))
}

/// POST /wallet/connect
pub async fn connect_wallet(
    State(state): State<AppState>,
    principal: Principal,
    ApiJson(body): ApiJson<ConnectRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let outcome = state.services()?.wallets.connect(
        principal.user_id(),
        body,
        &state.challenges,
        Utc::now(),
    )?;
    match outcome {
        ConnectOutcome::AlreadyConnected => Ok((
            StatusCode::OK,
            Json(json!({ "message": "Wallet already connected" })),
        )),
        ConnectOutcome::Connected(wallet) => {
            let message = format!(
                "{} wallet connected successfully!",
                wallet.wallet_type.to_uppercase()
            );
            Ok((
                StatusCode::CREATED,
                Json(json!({ "wallet": wallet, "message": message })),
            ))
        }
    }
}

/// GET /user/premium-status
pub async fn premium_status(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<PremiumStatus>, AppError> {
    let status = state
        .services()?
        .users
        .premium_status(principal.user_id(), Utc::now())?;
    Ok(Json(status))
}

/// GET /admin/status
pub async fn admin_status(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<AdminStatus>, AppError> {
    let status = state.services()?.users.admin_status(principal.user_id())?;
    Ok(Json(status))
}

#[derive(Debug, Deserialize)]
pub struct RatesQuery {
    pub from: Option<String>,
    pub to: Option<String>,
}

/// GET /exchange-rates?from&to
///
/// Needs no database; answers from the static table.
pub async fn exchange_rates(Query(query): Query<RatesQuery>) -> Json<Value> {
    let timestamp = Utc::now().to_rfc3339();

    if let (Some(from), Some(to)) = (&query.from, &query.to) {
        if let Some(rate) = rates::rate(from, to) {
            return Json(json!({
                "from": from.to_ascii_uppercase(),
                "to": to.to_ascii_uppercase(),
                "rate": rate,
                "timestamp": timestamp,
            }));
        }
    }

    Json(json!({
        "rates": rates::all_rates(),
        "timestamp": timestamp,
        "note": rates::RATES_NOTE,
    }))
}
