//! Dividend distribution and claim operations

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use super::models::{ClaimStatus, DistributionStatus};
use super::new_id;
use super::users::{UserSummary, SUMMARY_COLUMNS};
use crate::error::AppError;

/// Days a holder has to claim after a distribution
pub const CLAIM_WINDOW_DAYS: i64 = 30;

/// Last instant a claim on a distribution made at `distributed_at` is honored
pub fn claim_deadline(distributed_at: DateTime<Utc>) -> DateTime<Utc> {
    distributed_at + Duration::days(CLAIM_WINDOW_DAYS)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionRow {
    pub id: String,
    pub post_id: String,
    pub total_amount: f64,
    pub amount_per_token: f64,
    pub transaction_id: Option<String>,
    pub status: DistributionStatus,
    pub distribution_date: DateTime<Utc>,
}

impl DistributionRow {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            post_id: row.get("post_id")?,
            total_amount: row.get("total_amount")?,
            amount_per_token: row.get("amount_per_token")?,
            transaction_id: row.get("transaction_id")?,
            status: row.get("status")?,
            distribution_date: row.get("distribution_date")?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRow {
    pub id: String,
    pub distribution_id: String,
    pub token_holder_id: String,
    pub amount: f64,
    pub tokens_held: i64,
    pub status: ClaimStatus,
    pub claimed_at: Option<DateTime<Utc>>,
}

impl ClaimRow {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            distribution_id: row.get("distribution_id")?,
            token_holder_id: row.get("token_holder_id")?,
            amount: row.get("amount")?,
            tokens_held: row.get("tokens_held")?,
            status: row.get("status")?,
            claimed_at: row.get("claimed_at")?,
        })
    }

    /// Status as of `now`: a pending claim past its deadline reads as expired
    pub fn effective_status(&self, distributed_at: DateTime<Utc>, now: DateTime<Utc>) -> ClaimStatus {
        match self.status {
            ClaimStatus::Pending if now > claim_deadline(distributed_at) => ClaimStatus::Expired,
            status => status,
        }
    }
}

/// Claim with the holder's public summary
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimView {
    #[serde(flatten)]
    pub claim: ClaimRow,
    pub token_holder: UserSummary,
}

/// Distribution together with every claim made against it
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionView {
    #[serde(flatten)]
    pub distribution: DistributionRow,
    pub claims: Vec<ClaimView>,
}

pub fn create_distribution(
    conn: &Connection,
    post_id: &str,
    total_amount: f64,
    amount_per_token: f64,
    transaction_id: Option<&str>,
    now: DateTime<Utc>,
) -> Result<DistributionRow, AppError> {
    let id = new_id();
    conn.execute(
        "INSERT INTO dividend_distributions
             (id, post_id, total_amount, amount_per_token, transaction_id, status, distribution_date)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            id,
            post_id,
            total_amount,
            amount_per_token,
            transaction_id,
            DistributionStatus::Distributing,
            now,
        ],
    )?;

    get_distribution(conn, post_id, &id)?
        .ok_or_else(|| AppError::Internal("Distribution vanished after insert".into()))
}

pub fn set_distribution_status(
    conn: &Connection,
    id: &str,
    status: DistributionStatus,
) -> Result<(), AppError> {
    conn.execute(
        "UPDATE dividend_distributions SET status = ?1 WHERE id = ?2",
        params![status, id],
    )?;
    Ok(())
}

/// Distribution by id, scoped to its post
pub fn get_distribution(
    conn: &Connection,
    post_id: &str,
    id: &str,
) -> Result<Option<DistributionRow>, AppError> {
    Ok(conn
        .query_row(
            "SELECT * FROM dividend_distributions WHERE id = ?1 AND post_id = ?2",
            params![id, post_id],
            DistributionRow::from_row,
        )
        .optional()?)
}

/// A post's distributions, newest first, each with its claims
pub fn list_distributions(conn: &Connection, post_id: &str) -> Result<Vec<DistributionView>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT * FROM dividend_distributions WHERE post_id = ?1 ORDER BY distribution_date DESC",
    )?;
    let distributions = stmt
        .query_map(params![post_id], DistributionRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    distributions
        .into_iter()
        .map(|distribution| {
            let claims = list_claims(conn, &distribution.id)?;
            Ok(DistributionView {
                distribution,
                claims,
            })
        })
        .collect()
}

pub fn create_claim(
    conn: &Connection,
    distribution_id: &str,
    token_holder_id: &str,
    amount: f64,
    tokens_held: i64,
) -> Result<ClaimRow, AppError> {
    let id = new_id();
    conn.execute(
        "INSERT INTO dividend_claims (id, distribution_id, token_holder_id, amount, tokens_held, status)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![id, distribution_id, token_holder_id, amount, tokens_held, ClaimStatus::Pending],
    )?;

    Ok(conn.query_row(
        "SELECT * FROM dividend_claims WHERE id = ?1",
        params![id],
        ClaimRow::from_row,
    )?)
}

/// Claims on a distribution, largest holder first
pub fn list_claims(conn: &Connection, distribution_id: &str) -> Result<Vec<ClaimView>, AppError> {
    let sql = format!(
        "SELECT c.*, {} FROM dividend_claims c
         JOIN users u ON u.id = c.token_holder_id
         WHERE c.distribution_id = ?1
         ORDER BY c.tokens_held DESC",
        SUMMARY_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![distribution_id], |row| {
            Ok(ClaimView {
                claim: ClaimRow::from_row(row)?,
                token_holder: UserSummary::from_aliased(row)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn find_claim(
    conn: &Connection,
    distribution_id: &str,
    token_holder_id: &str,
) -> Result<Option<ClaimRow>, AppError> {
    Ok(conn
        .query_row(
            "SELECT * FROM dividend_claims WHERE distribution_id = ?1 AND token_holder_id = ?2",
            params![distribution_id, token_holder_id],
            ClaimRow::from_row,
        )
        .optional()?)
}

/// Set a claim's status, stamping `claimed_at` when it is claimed
pub fn set_claim_status(
    conn: &Connection,
    id: &str,
    status: ClaimStatus,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    let claimed_at = (status == ClaimStatus::Claimed).then_some(now);
    conn.execute(
        "UPDATE dividend_claims SET status = ?1, claimed_at = COALESCE(?2, claimed_at) WHERE id = ?3",
        params![status, claimed_at, id],
    )?;
    Ok(())
}

/// Persist expiry for every pending claim past its window; returns the count
pub fn expire_stale_claims(conn: &Connection, now: DateTime<Utc>) -> Result<usize, AppError> {
    let cutoff = now - Duration::days(CLAIM_WINDOW_DAYS);
    Ok(conn.execute(
        "UPDATE dividend_claims SET status = ?1
         WHERE status = ?2 AND distribution_id IN
             (SELECT id FROM dividend_distributions WHERE distribution_date < ?3)",
        params![ClaimStatus::Expired, ClaimStatus::Pending, cutoff],
    )?)
}
