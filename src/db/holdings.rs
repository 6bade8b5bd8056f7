//! Token holding CRUD operations

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use super::models::AcquiredVia;
use super::new_id;
use super::users::{UserSummary, SUMMARY_COLUMNS};
use crate::error::AppError;

/// Holding row from database
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldingRow {
    pub id: String,
    pub post_id: String,
    pub owner_id: String,
    pub amount: i64,
    pub purchase_price: f64,
    pub acquired_via: AcquiredVia,
    pub created_at: DateTime<Utc>,
}

impl HoldingRow {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            post_id: row.get("post_id")?,
            owner_id: row.get("owner_id")?,
            amount: row.get("amount")?,
            purchase_price: row.get("purchase_price")?,
            acquired_via: row.get("acquired_via")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// Summed holdings of one owner in one post
#[derive(Debug, Clone, PartialEq)]
pub struct HolderBalance {
    pub owner_id: String,
    pub amount: i64,
}

pub fn create_holding(
    conn: &Connection,
    post_id: &str,
    owner_id: &str,
    amount: i64,
    purchase_price: f64,
    acquired_via: AcquiredVia,
) -> Result<HoldingRow, AppError> {
    let id = new_id();
    conn.execute(
        "INSERT INTO token_holdings (id, post_id, owner_id, amount, purchase_price, acquired_via, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![id, post_id, owner_id, amount, purchase_price, acquired_via, Utc::now()],
    )?;

    Ok(conn.query_row(
        "SELECT * FROM token_holdings WHERE id = ?1",
        params![id],
        HoldingRow::from_row,
    )?)
}

/// All of an owner's holdings in a post, oldest first
pub fn list_for_owner(conn: &Connection, post_id: &str, owner_id: &str) -> Result<Vec<HoldingRow>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT * FROM token_holdings WHERE post_id = ?1 AND owner_id = ?2 ORDER BY created_at ASC, id ASC",
    )?;
    let rows = stmt
        .query_map(params![post_id, owner_id], HoldingRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Owner's summed holdings in a post (their voting power)
pub fn sum_for_owner(conn: &Connection, post_id: &str, owner_id: &str) -> Result<i64, AppError> {
    Ok(conn.query_row(
        "SELECT COALESCE(SUM(amount), 0) FROM token_holdings WHERE post_id = ?1 AND owner_id = ?2",
        params![post_id, owner_id],
        |row| row.get(0),
    )?)
}

/// Holdings grouped by owner
pub fn holders_of(conn: &Connection, post_id: &str) -> Result<Vec<HolderBalance>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT owner_id, SUM(amount) FROM token_holdings WHERE post_id = ?1
         GROUP BY owner_id ORDER BY owner_id",
    )?;
    let rows = stmt
        .query_map(params![post_id], |row| {
            Ok(HolderBalance {
                owner_id: row.get(0)?,
                amount: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn find_by_via(
    conn: &Connection,
    post_id: &str,
    owner_id: &str,
    via: AcquiredVia,
) -> Result<Option<HoldingRow>, AppError> {
    Ok(conn
        .query_row(
            "SELECT * FROM token_holdings WHERE post_id = ?1 AND owner_id = ?2 AND acquired_via = ?3
             ORDER BY created_at ASC LIMIT 1",
            params![post_id, owner_id, via],
            HoldingRow::from_row,
        )
        .optional()?)
}

pub fn update_holding(conn: &Connection, id: &str, amount: i64, purchase_price: f64) -> Result<(), AppError> {
    conn.execute(
        "UPDATE token_holdings SET amount = ?1, purchase_price = ?2 WHERE id = ?3",
        params![amount, purchase_price, id],
    )?;
    Ok(())
}

pub fn set_amount(conn: &Connection, id: &str, amount: i64) -> Result<(), AppError> {
    conn.execute(
        "UPDATE token_holdings SET amount = ?1 WHERE id = ?2",
        params![amount, id],
    )?;
    Ok(())
}

pub fn delete_holding(conn: &Connection, id: &str) -> Result<(), AppError> {
    conn.execute("DELETE FROM token_holdings WHERE id = ?1", params![id])?;
    Ok(())
}

/// Delete every holding acquired through `via`, returning the tokens released
pub fn delete_by_via(
    conn: &Connection,
    post_id: &str,
    owner_id: &str,
    via: AcquiredVia,
) -> Result<i64, AppError> {
    let released: i64 = conn.query_row(
        "SELECT COALESCE(SUM(amount), 0) FROM token_holdings
         WHERE post_id = ?1 AND owner_id = ?2 AND acquired_via = ?3",
        params![post_id, owner_id, via],
        |row| row.get(0),
    )?;
    conn.execute(
        "DELETE FROM token_holdings WHERE post_id = ?1 AND owner_id = ?2 AND acquired_via = ?3",
        params![post_id, owner_id, via],
    )?;
    Ok(released)
}

/// Holding joined with the post it belongs to, for portfolio views
#[derive(Debug, Clone)]
pub struct PortfolioRow {
    pub holding: HoldingRow,
    pub content: String,
    pub token_price: f64,
    pub author: UserSummary,
    pub likes: i64,
    pub shares: i64,
}

/// Every holding of an owner, largest first
pub fn list_portfolio(conn: &Connection, owner_id: &str) -> Result<Vec<PortfolioRow>, AppError> {
    let sql = format!(
        "SELECT h.*, p.content AS post_content, p.token_price AS post_token_price, {},
            (SELECT COUNT(*) FROM engagements e WHERE e.post_id = p.id AND e.kind = 'like') AS like_count,
            (SELECT COUNT(*) FROM engagements e WHERE e.post_id = p.id AND e.kind = 'share') AS share_count
         FROM token_holdings h
         JOIN posts p ON p.id = h.post_id
         JOIN users u ON u.id = p.user_id
         WHERE h.owner_id = ?1
         ORDER BY h.amount DESC, h.created_at ASC",
        SUMMARY_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![owner_id], |row| {
            Ok(PortfolioRow {
                holding: HoldingRow::from_row(row)?,
                content: row.get("post_content")?,
                token_price: row.get("post_token_price")?,
                author: UserSummary::from_aliased(row)?,
                likes: row.get("like_count")?,
                shares: row.get("share_count")?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Sum of every holding in a post
pub fn total_held(conn: &Connection, post_id: &str) -> Result<i64, AppError> {
    Ok(conn.query_row(
        "SELECT COALESCE(SUM(amount), 0) FROM token_holdings WHERE post_id = ?1",
        params![post_id],
        |row| row.get(0),
    )?)
}
