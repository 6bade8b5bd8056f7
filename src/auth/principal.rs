//! Authenticated caller extracted from the session token

use axum::{async_trait, extract::FromRequestParts, http::header, http::request::Parts};
use tracing::debug;

use super::jwt::{extract_token_from_header, Claims, PrincipalKind};
use crate::error::AppError;
use crate::server::AppState;

/// Who is calling. Handlers take this by value; a request without a valid
/// session never reaches them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    Admin { user_id: String, email: String },
    SocialUser { user_id: String, email: String },
    WalletUser {
        user_id: String,
        address: String,
        wallet_type: Option<String>,
    },
}

impl Principal {
    pub fn from_claims(claims: Claims) -> Self {
        match claims.kind {
            PrincipalKind::Admin => Self::Admin {
                user_id: claims.sub,
                email: claims.identifier,
            },
            PrincipalKind::Social => Self::SocialUser {
                user_id: claims.sub,
                email: claims.identifier,
            },
            PrincipalKind::Wallet => Self::WalletUser {
                user_id: claims.sub,
                address: claims.identifier,
                wallet_type: claims.wallet_type,
            },
        }
    }

    pub fn user_id(&self) -> &str {
        match self {
            Self::Admin { user_id, .. }
            | Self::SocialUser { user_id, .. }
            | Self::WalletUser { user_id, .. } => user_id,
        }
    }

    /// Token kind this principal was minted as
    pub fn kind(&self) -> PrincipalKind {
        match self {
            Self::Admin { .. } => PrincipalKind::Admin,
            Self::SocialUser { .. } => PrincipalKind::Social,
            Self::WalletUser { .. } => PrincipalKind::Wallet,
        }
    }
}

fn principal_from_parts(parts: &Parts, state: &AppState) -> Result<Option<Principal>, &'static str> {
    let header = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    let Some(token) = extract_token_from_header(header) else {
        return Ok(None);
    };
    state
        .jwt
        .verify_token(token)
        .map(|claims| Some(Principal::from_claims(claims)))
}

#[async_trait]
impl FromRequestParts<AppState> for Principal {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        // A server without storage cannot serve the caller either way
        state.services()?;

        match principal_from_parts(parts, state) {
            Ok(Some(principal)) => Ok(principal),
            Ok(None) => Err(AppError::unauthorized()),
            Err(reason) => {
                debug!(reason, "Rejected session token");
                Err(AppError::unauthorized())
            }
        }
    }
}

/// Caller identity for routes that also serve anonymous visitors.
/// An absent or invalid token yields `None`.
#[derive(Debug, Clone)]
pub struct MaybePrincipal(pub Option<Principal>);

#[async_trait]
impl FromRequestParts<AppState> for MaybePrincipal {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(Self(principal_from_parts(parts, state).ok().flatten()))
    }
}
