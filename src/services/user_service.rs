//! User service - account lookup, premium and admin status, sign-in upserts

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;
use tracing::info;

use crate::db::users::{self, NewUser, UserRow};
use crate::db::{wallets, Database};
use crate::error::AppError;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PremiumStatus {
    pub is_premium: bool,
    pub subscription_status: Option<String>,
    pub subscription_end: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStatus {
    pub is_admin: bool,
    pub email: Option<String>,
}

/// Premium flag or an active subscription
pub(crate) fn is_premium(conn: &Connection, user: &UserRow, now: DateTime<Utc>) -> Result<bool, AppError> {
    if user.is_premium {
        return Ok(true);
    }
    Ok(users::get_subscription(conn, &user.id)?.is_some_and(|sub| sub.is_active(now)))
}

pub(crate) fn require_user(conn: &Connection, user_id: &str) -> Result<UserRow, AppError> {
    users::get_user(conn, user_id)?.ok_or_else(|| AppError::not_found("User"))
}

pub struct UserService {
    db: Arc<Database>,
}

impl UserService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn get(&self, user_id: &str) -> Result<UserRow, AppError> {
        self.db.with_conn(|conn| require_user(conn, user_id))
    }

    pub fn premium_status(&self, user_id: &str, now: DateTime<Utc>) -> Result<PremiumStatus, AppError> {
        self.db.with_conn(|conn| {
            let user = require_user(conn, user_id)?;
            let subscription = users::get_subscription(conn, user_id)?;
            Ok(PremiumStatus {
                is_premium: is_premium(conn, &user, now)?,
                subscription_status: subscription.as_ref().map(|s| s.status.clone()),
                subscription_end: subscription.map(|s| s.current_period_end),
            })
        })
    }

    pub fn admin_status(&self, user_id: &str) -> Result<AdminStatus, AppError> {
        let user = self.get(user_id)?;
        Ok(AdminStatus {
            is_admin: user.is_admin,
            email: user.email,
        })
    }

    /// Find or create the account behind a social sign-in
    pub fn sign_in_social(&self, email: &str, name: Option<&str>) -> Result<UserRow, AppError> {
        let email = email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(AppError::Validation("A valid email is required".into()));
        }
        self.db.with_tx(|conn| users::upsert_social_user(conn, email, name))
    }

    /// Find or create the account owning a verified wallet key.
    ///
    /// A user found only through their wallet row (connected after a social
    /// sign-in) is returned as-is.
    pub fn sign_in_wallet(&self, address: &str, wallet_type: &str) -> Result<UserRow, AppError> {
        self.db.with_tx(|conn| {
            if let Some(user) = users::get_user_by_wallet_address(conn, address)? {
                return Ok(user);
            }
            if let Some(wallet) = wallets::get_wallet_by_address(conn, address)? {
                return require_user(conn, &wallet.user_id);
            }

            let user = users::create_user(conn, &NewUser::wallet(address))?;
            wallets::create_wallet(
                conn,
                &wallets::NewWallet {
                    user_id: user.id.clone(),
                    wallet_type: wallet_type.to_string(),
                    address: address.to_string(),
                    balance: 0.0,
                    currency: "BSV".to_string(),
                },
            )?;
            info!(user = %user.id, wallet_type, "Created wallet user");
            Ok(user)
        })
    }
}
