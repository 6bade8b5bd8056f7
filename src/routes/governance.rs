//! Proposals and votes

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;

use crate::auth::Principal;
use crate::db::governance::{ProposalView, VoteRow};
use crate::error::AppError;
use crate::server::AppState;
use crate::services::governance_service::{
    GovernanceOverview, ProposalRequest, VoteRequest, VoteResults,
};

use super::extract::ApiJson;

/// GET /posts/:post_id/governance
pub async fn overview(
    State(state): State<AppState>,
    principal: Principal,
    Path(post_id): Path<String>,
) -> Result<Json<GovernanceOverview>, AppError> {
    let overview = state
        .services()?
        .governance
        .overview(principal.user_id(), &post_id, Utc::now())?;
    Ok(Json(overview))
}

/// POST /posts/:post_id/governance
pub async fn propose(
    State(state): State<AppState>,
    principal: Principal,
    Path(post_id): Path<String>,
    ApiJson(body): ApiJson<ProposalRequest>,
) -> Result<(StatusCode, Json<ProposalView>), AppError> {
    let proposal = state.services()?.governance.propose(
        principal.user_id(),
        &post_id,
        body,
        Utc::now(),
    )?;
    Ok((StatusCode::CREATED, Json(proposal)))
}

/// POST /posts/:post_id/governance/:proposal_id/vote
///
/// 201 for a first ballot, 200 when an earlier one was overwritten.
pub async fn vote(
    State(state): State<AppState>,
    principal: Principal,
    Path((post_id, proposal_id)): Path<(String, String)>,
    ApiJson(body): ApiJson<VoteRequest>,
) -> Result<(StatusCode, Json<VoteRow>), AppError> {
    let (vote, created) = state.services()?.governance.vote(
        principal.user_id(),
        &post_id,
        &proposal_id,
        body,
        Utc::now(),
    )?;
    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(vote)))
}

/// GET /posts/:post_id/governance/:proposal_id/vote
pub async fn results(
    State(state): State<AppState>,
    Path((post_id, proposal_id)): Path<(String, String)>,
) -> Result<Json<VoteResults>, AppError> {
    let results = state.services()?.governance.results(&post_id, &proposal_id)?;
    Ok(Json(results))
}
