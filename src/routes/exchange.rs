//! Exchange listing, portfolio and trades

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::{MaybePrincipal, Principal};
use crate::db::posts::MarketSort;
use crate::error::AppError;
use crate::server::AppState;
use crate::services::trade_service::{TradeOutcome, TradeRequest};

use super::extract::ApiJson;

#[derive(Debug, Deserialize)]
pub struct MarketQuery {
    pub sort: Option<String>,
}

/// GET /exchange?sort=volume|price|newest
pub async fn market(
    State(state): State<AppState>,
    MaybePrincipal(viewer): MaybePrincipal,
    Query(query): Query<MarketQuery>,
) -> Result<Json<Value>, AppError> {
    let sort = MarketSort::parse(query.sort.as_deref());
    let posts = state
        .services()?
        .market
        .list(sort, viewer.as_ref().map(Principal::user_id))?;
    Ok(Json(json!({ "posts": posts })))
}

/// GET /exchange/portfolio
pub async fn portfolio(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<Value>, AppError> {
    let portfolio = state.services()?.market.portfolio(principal.user_id())?;
    Ok(Json(json!({ "portfolio": portfolio })))
}

/// POST /exchange/trade
pub async fn trade(
    State(state): State<AppState>,
    principal: Principal,
    ApiJson(body): ApiJson<TradeRequest>,
) -> Result<Json<TradeOutcome>, AppError> {
    let outcome = state.services()?.trades.execute(principal.user_id(), body)?;
    Ok(Json(outcome))
}
