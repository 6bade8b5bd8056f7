//! Dividend distribution and claims

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};

use crate::auth::Principal;
use crate::error::AppError;
use crate::server::AppState;
use crate::services::dividend_service::{ClaimOutcome, DistributeRequest, DistributionOutcome};

use super::extract::ApiJson;

/// GET /posts/:post_id/dividends
pub async fn list(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let distributions = state.services()?.dividends.list(&post_id, Utc::now())?;
    Ok(Json(json!({ "distributions": distributions })))
}

/// POST /posts/:post_id/dividends
pub async fn distribute(
    State(state): State<AppState>,
    principal: Principal,
    Path(post_id): Path<String>,
    ApiJson(body): ApiJson<DistributeRequest>,
) -> Result<(StatusCode, Json<DistributionOutcome>), AppError> {
    let outcome = state.services()?.dividends.distribute(
        principal.user_id(),
        &post_id,
        body,
        Utc::now(),
    )?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// GET /posts/:post_id/dividends/:distribution_id/claim
pub async fn claim_status(
    State(state): State<AppState>,
    principal: Principal,
    Path((post_id, distribution_id)): Path<(String, String)>,
) -> Result<Json<Value>, AppError> {
    let claim = state.services()?.dividends.claim_status(
        principal.user_id(),
        &post_id,
        &distribution_id,
        Utc::now(),
    )?;
    Ok(Json(json!({ "claim": claim })))
}

/// POST /posts/:post_id/dividends/:distribution_id/claim
pub async fn claim(
    State(state): State<AppState>,
    principal: Principal,
    Path((post_id, distribution_id)): Path<(String, String)>,
) -> Result<Json<ClaimOutcome>, AppError> {
    let outcome = state.services()?.dividends.claim(
        principal.user_id(),
        &post_id,
        &distribution_id,
        Utc::now(),
    )?;
    Ok(Json(outcome))
}
