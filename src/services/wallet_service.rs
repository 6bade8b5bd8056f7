//! Wallet service - connecting external wallets to accounts
//!
//! An address shaped like an ed25519 public key doubles as a sign-in
//! identity, so connecting one requires a signature over an outstanding
//! challenge from `ChallengeStore`. Other addresses are taken as given.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{info, warn};

use crate::auth::wallet::{is_key_address, verify_signature, ChallengeStore};
use crate::db::wallets::{self, NewWallet, WalletRow};
use crate::db::Database;
use crate::error::AppError;

use super::events::{EventBus, LedgerEvent};
use super::user_service::require_user;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectRequest {
    pub wallet_type: Option<String>,
    pub address: Option<String>,
    pub signature: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone)]
pub enum ConnectOutcome {
    /// The caller already owns this address
    AlreadyConnected,
    Connected(WalletRow),
}

/// Currency a newly connected wallet is denominated in
fn currency_for(wallet_type: &str) -> &'static str {
    match wallet_type.to_ascii_lowercase().as_str() {
        "btc" => "BTC",
        "eth" => "ETH",
        _ => "BSV",
    }
}

pub struct WalletService {
    db: Arc<Database>,
    events: Arc<EventBus>,
}

impl WalletService {
    pub fn new(db: Arc<Database>, events: Arc<EventBus>) -> Self {
        Self { db, events }
    }

    /// The caller's wallets (at most one)
    pub fn list(&self, user_id: &str) -> Result<Vec<WalletRow>, AppError> {
        self.db.with_conn(|conn| {
            require_user(conn, user_id)?;
            Ok(wallets::get_wallet_for_user(conn, user_id)?.into_iter().collect())
        })
    }

    pub fn connect(
        &self,
        user_id: &str,
        request: ConnectRequest,
        challenges: &ChallengeStore,
        now: DateTime<Utc>,
    ) -> Result<ConnectOutcome, AppError> {
        let (wallet_type, mut address) = match (request.wallet_type, request.address) {
            (Some(t), Some(a)) if !t.trim().is_empty() && !a.trim().is_empty() => {
                (t.trim().to_string(), a.trim().to_string())
            }
            _ => {
                return Err(AppError::Validation(
                    "Wallet type and address are required".into(),
                ))
            }
        };

        let key_address = is_key_address(&address);
        if key_address {
            // Sign-in stores keys lowercased
            address = address.to_ascii_lowercase();
        }

        let proof = request
            .signature
            .as_deref()
            .zip(request.message.as_deref())
            .filter(|(signature, message)| !signature.is_empty() && !message.is_empty());
        match proof {
            Some((signature, message)) => {
                if !verify_signature(&address, message, signature) {
                    warn!(user = %user_id, "Wallet connect with invalid signature");
                    return Err(AppError::Validation("Invalid wallet signature".into()));
                }
                if key_address && !challenges.consume(&address, message, now) {
                    return Err(AppError::Unauthorized(
                        "Challenge expired or unknown".into(),
                    ));
                }
            }
            None if key_address => {
                return Err(AppError::Validation(
                    "A signed challenge is required to connect this wallet".into(),
                ))
            }
            None => {}
        }

        let outcome = self.db.with_tx(|conn| {
            require_user(conn, user_id)?;

            if let Some(existing) = wallets::get_wallet_by_address(conn, &address)? {
                if existing.user_id == user_id {
                    return Ok(ConnectOutcome::AlreadyConnected);
                }
                return Err(AppError::Validation(
                    "Wallet address already connected to another account".into(),
                ));
            }

            let currency = currency_for(&wallet_type);
            match wallets::get_wallet_for_user(conn, user_id)? {
                None => {
                    let wallet = wallets::create_wallet(
                        conn,
                        &NewWallet {
                            user_id: user_id.to_string(),
                            wallet_type: wallet_type.clone(),
                            address: address.clone(),
                            balance: 0.0,
                            currency: currency.to_string(),
                        },
                    )?;
                    Ok(ConnectOutcome::Connected(wallet))
                }
                Some(current) if current.is_custodial() => {
                    wallets::attach_external(conn, &current.id, &wallet_type, &address, currency)?;
                    let wallet = wallets::get_wallet_for_user(conn, user_id)?
                        .ok_or_else(|| AppError::Internal("Wallet vanished after update".into()))?;
                    Ok(ConnectOutcome::Connected(wallet))
                }
                Some(_) => Err(AppError::Conflict(
                    "An external wallet is already connected to this account".into(),
                )),
            }
        })?;

        if let ConnectOutcome::Connected(wallet) = &outcome {
            info!(user = %user_id, wallet_type = %wallet.wallet_type, "Wallet connected");
            self.events.emit(LedgerEvent::WalletConnected {
                user_id: user_id.to_string(),
                wallet_type: wallet.wallet_type.clone(),
            });
        }

        Ok(outcome)
    }
}
