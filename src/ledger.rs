//! Token accounting
//!
//! Pure functions over holdings, prices and ballots. Nothing here touches the
//! database; the services load rows, ask the ledger what should change, then
//! write the answer inside one transaction.

use serde::{Deserialize, Serialize};

use crate::db::holdings::{HolderBalance, HoldingRow};
use crate::db::models::{AcquiredVia, VoteChoice};
use crate::error::AppError;
use crate::rates;

/// Ledger rule violations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LedgerError {
    #[error("Insufficient tokens to sell")]
    InsufficientTokens { held: i64, requested: i64 },

    #[error("No token holders found for this post")]
    NoHolders,
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        AppError::Rule(err.to_string())
    }
}

/// Direction of a trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeKind {
    Buy,
    Sell,
}

/// Value of `amount` tokens at `price`: the cost of a buy, the proceeds of a sell
pub fn quote(amount: i64, price: f64) -> f64 {
    amount as f64 * price
}

/// Average cost after adding `add_amount` tokens bought at `add_price`
pub fn weighted_cost_basis(old_amount: i64, old_price: f64, add_amount: i64, add_price: f64) -> f64 {
    let total = old_amount + add_amount;
    if total <= 0 {
        return add_price;
    }
    (old_amount as f64 * old_price + add_amount as f64 * add_price) / total as f64
}

/// Changes needed to remove tokens from a seller's holdings
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SellPlan {
    /// Holdings consumed entirely
    pub delete: Vec<String>,
    /// Holding left partially consumed, with its remaining amount
    pub decrement: Option<(String, i64)>,
}

fn sell_priority(via: AcquiredVia) -> u8 {
    match via {
        AcquiredVia::Purchase | AcquiredVia::Mint => 0,
        AcquiredVia::Like | AcquiredVia::Share => 1,
    }
}

/// Plan a sale of `amount` tokens across `holdings`.
///
/// Purchased and minted tokens go first, then engagement rewards; within a
/// group the oldest holding goes first.
pub fn plan_sell(holdings: &[HoldingRow], amount: i64) -> Result<SellPlan, LedgerError> {
    let held: i64 = holdings.iter().map(|h| h.amount).sum();
    if amount > held {
        return Err(LedgerError::InsufficientTokens {
            held,
            requested: amount,
        });
    }

    let mut ordered: Vec<&HoldingRow> = holdings.iter().collect();
    ordered.sort_by(|a, b| {
        sell_priority(a.acquired_via)
            .cmp(&sell_priority(b.acquired_via))
            .then(a.created_at.cmp(&b.created_at))
    });

    let mut plan = SellPlan::default();
    let mut remaining = amount;
    for holding in ordered {
        if remaining == 0 {
            break;
        }
        if holding.amount <= remaining {
            remaining -= holding.amount;
            plan.delete.push(holding.id.clone());
        } else {
            plan.decrement = Some((holding.id.clone(), holding.amount - remaining));
            remaining = 0;
        }
    }

    Ok(plan)
}

/// One holder's share of a dividend
#[derive(Debug, Clone, PartialEq)]
pub struct DividendShare {
    pub owner_id: String,
    pub tokens: i64,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DividendSplit {
    pub total_tokens: i64,
    pub amount_per_token: f64,
    pub shares: Vec<DividendShare>,
}

/// Split `total_amount` across holders in proportion to their tokens
pub fn split_dividend(total_amount: f64, holders: &[HolderBalance]) -> Result<DividendSplit, LedgerError> {
    let total_tokens: i64 = holders.iter().map(|h| h.amount).sum();
    if holders.is_empty() || total_tokens <= 0 {
        return Err(LedgerError::NoHolders);
    }

    let amount_per_token = total_amount / total_tokens as f64;
    let shares = holders
        .iter()
        .filter(|h| h.amount > 0)
        .map(|h| DividendShare {
            owner_id: h.owner_id.clone(),
            tokens: h.amount,
            amount: amount_per_token * h.amount as f64,
        })
        .collect();

    Ok(DividendSplit {
        total_tokens,
        amount_per_token,
        shares,
    })
}

/// Voting power summed per choice
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VoteTotals {
    pub yes: i64,
    pub no: i64,
    pub abstain: i64,
    pub total: i64,
}

pub fn tally<I>(votes: I) -> VoteTotals
where
    I: IntoIterator<Item = (VoteChoice, i64)>,
{
    votes
        .into_iter()
        .fold(VoteTotals::default(), |mut totals, (choice, power)| {
            match choice {
                VoteChoice::Yes => totals.yes += power,
                VoteChoice::No => totals.no += power,
                VoteChoice::Abstain => totals.abstain += power,
            }
            totals.total += power;
            totals
        })
}

/// Price of an engagement in the wallet's currency.
///
/// Uses the static USD rate for `currency` when there is one, otherwise the
/// wallet's own rate (1 when unset).
pub fn engagement_cost(usd_cost: f64, currency: &str, wallet_rate: Option<f64>) -> f64 {
    match rates::rate("USD", currency) {
        Some(rate) => usd_cost * rate,
        None => {
            let divisor = wallet_rate.filter(|r| *r > 0.0).unwrap_or(1.0);
            usd_cost / divisor
        }
    }
}
