//! Trade service - buys and sells of post tokens at the post's current price

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{LedgerSettings, Settlement};
use crate::db::models::AcquiredVia;
use crate::db::{holdings, posts, wallets, Database};
use crate::error::AppError;
use crate::ledger::{self, TradeKind};

use super::events::{EventBus, LedgerEvent};

/// Body of `POST /exchange/trade`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeRequest {
    pub post_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub amount: Option<f64>,
}

/// Settled trade as reported back to the caller
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeTransaction {
    #[serde(rename = "type")]
    pub kind: TradeKind,
    pub amount: i64,
    pub price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_proceeds: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TradeOutcome {
    pub success: bool,
    pub message: String,
    pub transaction: TradeTransaction,
}

/// Validated trade order
struct Order {
    post_id: String,
    kind: TradeKind,
    amount: i64,
}

impl TradeRequest {
    fn validate(self) -> Result<Order, AppError> {
        let invalid = || AppError::Validation("Invalid trade parameters".into());

        let post_id = self.post_id.filter(|id| !id.is_empty()).ok_or_else(invalid)?;
        let kind = self.kind.filter(|k| !k.is_empty()).ok_or_else(invalid)?;
        let amount = self.amount.ok_or_else(invalid)?;
        if amount <= 0.0 || amount.fract() != 0.0 || amount > i64::MAX as f64 {
            return Err(invalid());
        }

        let kind = match kind.as_str() {
            "buy" => TradeKind::Buy,
            "sell" => TradeKind::Sell,
            _ => return Err(AppError::Validation("Invalid trade type".into())),
        };

        Ok(Order {
            post_id,
            kind,
            amount: amount as i64,
        })
    }
}

pub struct TradeService {
    db: Arc<Database>,
    events: Arc<EventBus>,
    settings: LedgerSettings,
}

impl TradeService {
    pub fn new(db: Arc<Database>, events: Arc<EventBus>, settings: LedgerSettings) -> Self {
        Self { db, events, settings }
    }

    /// Execute a buy or sell for `user_id`
    pub fn execute(&self, user_id: &str, request: TradeRequest) -> Result<TradeOutcome, AppError> {
        let order = request.validate()?;

        let outcome = self.db.with_tx(|conn| {
            let post = posts::get_post(conn, &order.post_id)?.ok_or_else(|| AppError::not_found("Post"))?;
            let price = post.token_price;
            let value = ledger::quote(order.amount, price);

            match order.kind {
                TradeKind::Buy => {
                    if order.amount > post.available_tokens {
                        return Err(AppError::Rule("Not enough tokens available".into()));
                    }

                    if self.settings.settlement == Settlement::Wallet {
                        let wallet = wallets::get_wallet_for_user(conn, user_id)?;
                        if wallet.map_or(true, |w| w.balance < value) {
                            return Err(AppError::InsufficientFunds(
                                "Insufficient funds for this trade".into(),
                            ));
                        }
                        wallets::adjust_balance(conn, user_id, -value)?;
                    }

                    match holdings::find_by_via(conn, &post.id, user_id, AcquiredVia::Purchase)? {
                        Some(existing) => {
                            let basis = ledger::weighted_cost_basis(
                                existing.amount,
                                existing.purchase_price,
                                order.amount,
                                price,
                            );
                            holdings::update_holding(conn, &existing.id, existing.amount + order.amount, basis)?;
                        }
                        None => {
                            holdings::create_holding(
                                conn,
                                &post.id,
                                user_id,
                                order.amount,
                                price,
                                AcquiredVia::Purchase,
                            )?;
                        }
                    }
                    posts::adjust_available(conn, &post.id, -order.amount)?;

                    Ok(TradeOutcome {
                        success: true,
                        message: format!("Bought {} tokens for ${:.4}", order.amount, value),
                        transaction: TradeTransaction {
                            kind: TradeKind::Buy,
                            amount: order.amount,
                            price,
                            total_cost: Some(value),
                            total_proceeds: None,
                        },
                    })
                }
                TradeKind::Sell => {
                    let held = holdings::list_for_owner(conn, &post.id, user_id)?;
                    let plan = ledger::plan_sell(&held, order.amount)?;

                    for id in &plan.delete {
                        holdings::delete_holding(conn, id)?;
                    }
                    if let Some((id, remaining)) = &plan.decrement {
                        holdings::set_amount(conn, id, *remaining)?;
                    }
                    posts::adjust_available(conn, &post.id, order.amount)?;

                    if self.settings.settlement == Settlement::Wallet {
                        wallets::get_or_provision(conn, user_id, self.settings.starting_balance)?;
                        wallets::adjust_balance(conn, user_id, value)?;
                    }

                    Ok(TradeOutcome {
                        success: true,
                        message: format!("Sold {} tokens for ${:.4}", order.amount, value),
                        transaction: TradeTransaction {
                            kind: TradeKind::Sell,
                            amount: order.amount,
                            price,
                            total_cost: None,
                            total_proceeds: Some(value),
                        },
                    })
                }
            }
        })?;

        debug!(post = %order.post_id, user = %user_id, amount = order.amount, "Trade committed");
        self.events.emit(LedgerEvent::Traded {
            post_id: order.post_id,
            user_id: user_id.to_string(),
            kind: order.kind,
            amount: order.amount,
            value: outcome
                .transaction
                .total_cost
                .or(outcome.transaction.total_proceeds)
                .unwrap_or_default(),
        });

        Ok(outcome)
    }
}
