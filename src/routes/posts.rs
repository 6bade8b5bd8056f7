//! Timeline, posting and like/share engagement

use axum::{extract::State, Json};
use chrono::Utc;
use serde_json::{json, Value};

use crate::auth::Principal;
use crate::db::models::EngagementKind;
use crate::error::AppError;
use crate::server::AppState;
use crate::services::post_service::{CreatePostRequest, EngageOutcome, EngageRequest};

use super::extract::ApiJson;

/// GET /posts
pub async fn timeline(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let posts = state.services()?.posts.timeline()?;
    Ok(Json(json!({ "posts": posts })))
}

/// POST /posts
pub async fn create(
    State(state): State<AppState>,
    principal: Principal,
    ApiJson(body): ApiJson<CreatePostRequest>,
) -> Result<Json<Value>, AppError> {
    let post = state
        .services()?
        .posts
        .create(principal.user_id(), body, Utc::now())?;
    Ok(Json(json!({ "post": post })))
}

/// POST /posts/like
pub async fn like(
    State(state): State<AppState>,
    principal: Principal,
    ApiJson(body): ApiJson<EngageRequest>,
) -> Result<Json<EngageOutcome>, AppError> {
    let outcome = state
        .services()?
        .posts
        .engage(principal.user_id(), EngagementKind::Like, body)?;
    Ok(Json(outcome))
}

/// POST /posts/share
pub async fn share(
    State(state): State<AppState>,
    principal: Principal,
    ApiJson(body): ApiJson<EngageRequest>,
) -> Result<Json<EngageOutcome>, AppError> {
    let outcome = state
        .services()?
        .posts
        .engage(principal.user_id(), EngagementKind::Share, body)?;
    Ok(Json(outcome))
}
