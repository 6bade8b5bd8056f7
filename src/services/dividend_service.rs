//! Dividend service - pro-rata payouts to a post's token holders

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{LedgerSettings, Settlement};
use crate::db::dividends::{self, ClaimRow, DistributionRow, DistributionView};
use crate::db::models::{ClaimStatus, DistributionStatus};
use crate::db::{holdings, posts, wallets, Database};
use crate::error::AppError;
use crate::ledger;

use super::events::{EventBus, LedgerEvent};

/// Body of `POST /posts/:postId/dividends`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributeRequest {
    pub total_amount: Option<f64>,
    pub transaction_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionOutcome {
    pub distribution: DistributionRow,
    pub claims: Vec<ClaimRow>,
    pub total_tokens: i64,
    pub amount_per_token: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClaimOutcome {
    pub claim: ClaimRow,
    pub message: String,
}

/// Result of a claim transaction that still has to commit
enum ClaimAttempt {
    Claimed(ClaimRow),
    /// Expiry was persisted; the caller still gets an error
    Expired,
}

pub struct DividendService {
    db: Arc<Database>,
    events: Arc<EventBus>,
    settings: LedgerSettings,
}

impl DividendService {
    pub fn new(db: Arc<Database>, events: Arc<EventBus>, settings: LedgerSettings) -> Self {
        Self { db, events, settings }
    }

    /// A post's distributions, newest first, with claim statuses as of `now`
    pub fn list(&self, post_id: &str, now: DateTime<Utc>) -> Result<Vec<DistributionView>, AppError> {
        let mut views = self.db.with_conn(|conn| dividends::list_distributions(conn, post_id))?;
        for view in &mut views {
            let distributed_at = view.distribution.distribution_date;
            for claim in &mut view.claims {
                claim.claim.status = claim.claim.effective_status(distributed_at, now);
            }
        }
        Ok(views)
    }

    /// Split `totalAmount` across the post's current holders
    pub fn distribute(
        &self,
        user_id: &str,
        post_id: &str,
        request: DistributeRequest,
        now: DateTime<Utc>,
    ) -> Result<DistributionOutcome, AppError> {
        let total_amount = request
            .total_amount
            .filter(|amount| *amount > 0.0)
            .ok_or_else(|| AppError::Validation("Valid total amount is required".into()))?;

        let outcome = self.db.with_tx(|conn| {
            let post = posts::get_post(conn, post_id)?.ok_or_else(|| AppError::not_found("Post"))?;
            if post.user_id != user_id {
                return Err(AppError::Forbidden(
                    "Only the post creator can distribute dividends".into(),
                ));
            }

            let holders = holdings::holders_of(conn, post_id)?;
            let split = ledger::split_dividend(total_amount, &holders)?;

            let distribution = dividends::create_distribution(
                conn,
                post_id,
                total_amount,
                split.amount_per_token,
                request.transaction_id.as_deref(),
                now,
            )?;

            let claims = split
                .shares
                .iter()
                .map(|share| {
                    dividends::create_claim(conn, &distribution.id, &share.owner_id, share.amount, share.tokens)
                })
                .collect::<Result<Vec<_>, _>>()?;

            dividends::set_distribution_status(conn, &distribution.id, DistributionStatus::Completed)?;

            Ok(DistributionOutcome {
                distribution: DistributionRow {
                    status: DistributionStatus::Completed,
                    ..distribution
                },
                claims,
                total_tokens: split.total_tokens,
                amount_per_token: split.amount_per_token,
            })
        })?;

        info!(
            post = %post_id,
            total_amount,
            holders = outcome.claims.len(),
            "Dividend distribution completed"
        );
        self.events.emit(LedgerEvent::DividendDistributed {
            id: outcome.distribution.id.clone(),
            post_id: post_id.to_string(),
            total_amount,
            holders: outcome.claims.len(),
        });

        Ok(outcome)
    }

    /// The caller's claim on a distribution, if any
    pub fn claim_status(
        &self,
        user_id: &str,
        post_id: &str,
        distribution_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ClaimRow>, AppError> {
        self.db.with_conn(|conn| {
            let Some(distribution) = dividends::get_distribution(conn, post_id, distribution_id)? else {
                return Ok(None);
            };
            Ok(dividends::find_claim(conn, distribution_id, user_id)?.map(|mut claim| {
                claim.status = claim.effective_status(distribution.distribution_date, now);
                claim
            }))
        })
    }

    /// Claim the caller's share of a distribution
    pub fn claim(
        &self,
        user_id: &str,
        post_id: &str,
        distribution_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ClaimOutcome, AppError> {
        let no_claim = || AppError::NotFound("No dividend claim found for this user".into());

        let attempt = self.db.with_tx(|conn| {
            let distribution =
                dividends::get_distribution(conn, post_id, distribution_id)?.ok_or_else(no_claim)?;
            let claim = dividends::find_claim(conn, distribution_id, user_id)?.ok_or_else(no_claim)?;

            match claim.status {
                ClaimStatus::Claimed => return Err(AppError::Rule("Dividends already claimed".into())),
                ClaimStatus::Expired => return Err(AppError::Rule("Dividend claim has expired".into())),
                ClaimStatus::Pending => {}
            }

            if now > dividends::claim_deadline(distribution.distribution_date) {
                dividends::set_claim_status(conn, &claim.id, ClaimStatus::Expired, now)?;
                return Ok(ClaimAttempt::Expired);
            }

            dividends::set_claim_status(conn, &claim.id, ClaimStatus::Claimed, now)?;
            if self.settings.settlement == Settlement::Wallet {
                wallets::get_or_provision(conn, user_id, self.settings.starting_balance)?;
                wallets::adjust_balance(conn, user_id, claim.amount)?;
            }

            Ok(ClaimAttempt::Claimed(ClaimRow {
                status: ClaimStatus::Claimed,
                claimed_at: Some(now),
                ..claim
            }))
        })?;

        let claim = match attempt {
            ClaimAttempt::Claimed(claim) => claim,
            ClaimAttempt::Expired => return Err(AppError::Rule("Dividend claim has expired".into())),
        };

        self.events.emit(LedgerEvent::DividendClaimed {
            distribution_id: distribution_id.to_string(),
            user_id: user_id.to_string(),
            amount: claim.amount,
        });

        Ok(ClaimOutcome {
            message: format!("Successfully claimed {} BSV in dividends!", claim.amount),
            claim,
        })
    }
}
