//! Wallet CRUD operations

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use super::new_id;
use crate::error::AppError;

/// Wallet type given to wallets the service provisions itself
pub const CUSTODIAL: &str = "custodial";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletRow {
    pub id: String,
    pub user_id: String,
    pub wallet_type: String,
    pub address: String,
    pub balance: f64,
    pub currency: String,
    pub exchange_rate: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl WalletRow {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            wallet_type: row.get("wallet_type")?,
            address: row.get("address")?,
            balance: row.get("balance")?,
            currency: row.get("currency")?,
            exchange_rate: row.get("exchange_rate")?,
            created_at: row.get("created_at")?,
        })
    }

    pub fn is_custodial(&self) -> bool {
        self.wallet_type == CUSTODIAL
    }
}

#[derive(Debug, Clone)]
pub struct NewWallet {
    pub user_id: String,
    pub wallet_type: String,
    pub address: String,
    pub balance: f64,
    pub currency: String,
}

pub fn create_wallet(conn: &Connection, input: &NewWallet) -> Result<WalletRow, AppError> {
    let id = new_id();
    conn.execute(
        "INSERT INTO wallets (id, user_id, wallet_type, address, balance, currency, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            id,
            input.user_id,
            input.wallet_type,
            input.address,
            input.balance,
            input.currency,
            Utc::now(),
        ],
    )?;

    get_wallet_for_user(conn, &input.user_id)?
        .ok_or_else(|| AppError::Internal("Wallet vanished after insert".into()))
}

pub fn get_wallet_for_user(conn: &Connection, user_id: &str) -> Result<Option<WalletRow>, AppError> {
    Ok(conn
        .query_row(
            "SELECT * FROM wallets WHERE user_id = ?1",
            params![user_id],
            WalletRow::from_row,
        )
        .optional()?)
}

pub fn get_wallet_by_address(conn: &Connection, address: &str) -> Result<Option<WalletRow>, AppError> {
    Ok(conn
        .query_row(
            "SELECT * FROM wallets WHERE address = ?1",
            params![address],
            WalletRow::from_row,
        )
        .optional()?)
}

/// Return the user's wallet, provisioning a custodial one when missing
pub fn get_or_provision(
    conn: &Connection,
    user_id: &str,
    starting_balance: f64,
) -> Result<WalletRow, AppError> {
    if let Some(wallet) = get_wallet_for_user(conn, user_id)? {
        return Ok(wallet);
    }

    create_wallet(
        conn,
        &NewWallet {
            user_id: user_id.to_string(),
            wallet_type: CUSTODIAL.to_string(),
            address: format!("custodial-{}", new_id()),
            balance: starting_balance,
            currency: "BSV".to_string(),
        },
    )
}

/// Add `delta` (may be negative) to the user's wallet balance
pub fn adjust_balance(conn: &Connection, user_id: &str, delta: f64) -> Result<(), AppError> {
    let updated = conn.execute(
        "UPDATE wallets SET balance = balance + ?1 WHERE user_id = ?2",
        params![delta, user_id],
    )?;
    if updated == 0 {
        return Err(AppError::not_found("Wallet"));
    }
    Ok(())
}

/// Re-point a wallet at an externally controlled address, keeping its balance
pub fn attach_external(
    conn: &Connection,
    wallet_id: &str,
    wallet_type: &str,
    address: &str,
    currency: &str,
) -> Result<(), AppError> {
    conn.execute(
        "UPDATE wallets SET wallet_type = ?1, address = ?2, currency = ?3 WHERE id = ?4",
        params![wallet_type, address, currency, wallet_id],
    )?;
    Ok(())
}
