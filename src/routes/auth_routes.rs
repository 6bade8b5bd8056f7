//! HTTP routes for authentication
//!
//! - GET  /auth/wallet/challenge?address=  - issue a sign-in nonce
//! - POST /auth/wallet                     - exchange a signed nonce for a token
//! - POST /auth/dev-login                  - dev mode only, social sign-in stand-in
//! - GET  /auth/me                         - current user
//!
//! Social sign-in in production is handled by the external OAuth bridge,
//! which mints tokens with the same secret.

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::auth::{is_key_address, verify_signature, Principal, PrincipalKind, TokenInput};
use crate::db::users::UserRow;
use crate::error::AppError;
use crate::server::AppState;

use super::extract::ApiJson;

/// Key scheme recorded for wallets that sign in with a challenge
const WALLET_KEY_TYPE: &str = "ed25519";

#[derive(Debug, Deserialize)]
pub struct ChallengeQuery {
    pub address: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeResponse {
    pub address: String,
    pub message: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WalletLoginRequest {
    pub address: Option<String>,
    pub message: Option<String>,
    pub signature: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DevLoginRequest {
    pub email: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    pub expires_in: u64,
    pub user: UserRow,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: UserRow,
    pub kind: PrincipalKind,
}

fn issue(state: &AppState, input: TokenInput, user: UserRow) -> Result<Json<AuthResponse>, AppError> {
    let token = state.jwt.generate_token(input)?;
    Ok(Json(AuthResponse {
        token,
        expires_in: state.jwt.expiry_seconds(),
        user,
    }))
}

/// GET /auth/wallet/challenge?address=
pub async fn wallet_challenge(
    State(state): State<AppState>,
    Query(query): Query<ChallengeQuery>,
) -> Result<Json<ChallengeResponse>, AppError> {
    let address = query
        .address
        .map(|a| a.trim().to_ascii_lowercase())
        .filter(|a| is_key_address(a))
        .ok_or_else(|| {
            AppError::Validation("A hex-encoded ed25519 public key is required".into())
        })?;

    let (message, expires_at) = state.challenges.issue(&address, Utc::now());
    Ok(Json(ChallengeResponse {
        address,
        message,
        expires_at,
    }))
}

/// POST /auth/wallet
pub async fn wallet_login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<WalletLoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let services = state.services()?;

    let (address, message, signature) = match (body.address, body.message, body.signature) {
        (Some(a), Some(m), Some(s)) if !a.is_empty() && !m.is_empty() && !s.is_empty() => {
            (a.trim().to_ascii_lowercase(), m, s)
        }
        _ => {
            return Err(AppError::Validation(
                "Address, message and signature are required".into(),
            ))
        }
    };

    if !verify_signature(&address, &message, &signature) {
        warn!(address = %address, "Wallet sign-in with invalid signature");
        return Err(AppError::Unauthorized("Invalid wallet signature".into()));
    }

    if !state.challenges.consume(&address, &message, Utc::now()) {
        return Err(AppError::Unauthorized(
            "Challenge expired or unknown".into(),
        ));
    }

    let user = services.users.sign_in_wallet(&address, WALLET_KEY_TYPE)?;
    info!(user = %user.id, "Wallet sign-in");

    issue(
        &state,
        TokenInput {
            user_id: user.id.clone(),
            kind: PrincipalKind::Wallet,
            identifier: address,
            wallet_type: Some(WALLET_KEY_TYPE.to_string()),
        },
        user,
    )
}

/// POST /auth/dev-login
pub async fn dev_login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<DevLoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    if !state.dev_mode {
        return Err(AppError::not_found("Route"));
    }
    let services = state.services()?;

    let email = body.email.unwrap_or_default();
    let user = services.users.sign_in_social(&email, body.name.as_deref())?;
    let kind = if user.is_admin {
        PrincipalKind::Admin
    } else {
        PrincipalKind::Social
    };
    info!(user = %user.id, ?kind, "Dev login");

    issue(
        &state,
        TokenInput {
            user_id: user.id.clone(),
            kind,
            identifier: user.email.clone().unwrap_or(email),
            wallet_type: None,
        },
        user,
    )
}

/// GET /auth/me
pub async fn me(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<MeResponse>, AppError> {
    let user = state.services()?.users.get(principal.user_id())?;
    Ok(Json(MeResponse {
        user,
        kind: principal.kind(),
    }))
}
