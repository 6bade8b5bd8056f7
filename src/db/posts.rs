//! Post and engagement CRUD operations

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use super::models::EngagementKind;
use super::new_id;
use super::users::{UserSummary, SUMMARY_COLUMNS};
use crate::error::AppError;

/// Fixed token supply minted for every post
pub const DEFAULT_TOKEN_SUPPLY: i64 = 1_000_000;
/// Initial token price in BSV
pub const DEFAULT_TOKEN_PRICE: f64 = 0.0001;
/// Like cost in USD
pub const DEFAULT_LIKE_COST: f64 = 0.01;
/// Share cost in USD
pub const DEFAULT_SHARE_COST: f64 = 0.05;

/// Post row from database
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRow {
    pub id: String,
    pub user_id: String,
    pub content: String,
    pub image: Option<String>,
    pub is_premium: bool,
    pub nft_id: Option<String>,
    pub total_token_supply: i64,
    pub available_tokens: i64,
    pub token_price: f64,
    pub like_cost: f64,
    pub share_cost: f64,
    pub created_at: DateTime<Utc>,
}

impl PostRow {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            content: row.get("content")?,
            image: row.get("image")?,
            is_premium: row.get("is_premium")?,
            nft_id: row.get("nft_id")?,
            total_token_supply: row.get("total_token_supply")?,
            available_tokens: row.get("available_tokens")?,
            token_price: row.get("token_price")?,
            like_cost: row.get("like_cost")?,
            share_cost: row.get("share_cost")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// Post with its author and engagement counts
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    #[serde(flatten)]
    pub post: PostRow,
    pub user: UserSummary,
    pub likes: i64,
    pub shares: i64,
}

impl PostView {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            post: PostRow::from_row(row)?,
            user: UserSummary::from_aliased(row)?,
            likes: row.get("like_count")?,
            shares: row.get("share_count")?,
        })
    }
}

/// Market listing entry: a post plus the viewer's holdings in it
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketPost {
    #[serde(flatten)]
    pub view: PostView,
    pub user_tokens: i64,
}

/// Input for creating a post
#[derive(Debug, Clone)]
pub struct NewPost {
    pub user_id: String,
    pub content: String,
    pub image: Option<String>,
    pub is_premium: bool,
    pub nft_id: Option<String>,
    pub available_tokens: i64,
}

/// Market ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketSort {
    /// Most liked, then most shared
    #[default]
    Volume,
    Price,
    Newest,
}

impl MarketSort {
    /// Unknown values fall back to volume ordering
    pub fn parse(s: Option<&str>) -> Self {
        match s {
            Some("price") => Self::Price,
            Some("newest") => Self::Newest,
            _ => Self::Volume,
        }
    }

    fn order_clause(&self) -> &'static str {
        match self {
            Self::Volume => "like_count DESC, share_count DESC, p.created_at DESC",
            Self::Price => "p.token_price DESC, p.created_at DESC",
            Self::Newest => "p.created_at DESC",
        }
    }
}

fn view_select() -> String {
    format!(
        "SELECT p.*, {},
            (SELECT COUNT(*) FROM engagements e WHERE e.post_id = p.id AND e.kind = 'like') AS like_count,
            (SELECT COUNT(*) FROM engagements e WHERE e.post_id = p.id AND e.kind = 'share') AS share_count",
        SUMMARY_COLUMNS
    )
}

pub fn create_post(conn: &Connection, input: &NewPost) -> Result<PostRow, AppError> {
    let id = new_id();
    conn.execute(
        "INSERT INTO posts (id, user_id, content, image, is_premium, nft_id, total_token_supply,
             available_tokens, token_price, like_cost, share_cost, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            id,
            input.user_id,
            input.content,
            input.image,
            input.is_premium,
            input.nft_id,
            DEFAULT_TOKEN_SUPPLY,
            input.available_tokens,
            DEFAULT_TOKEN_PRICE,
            DEFAULT_LIKE_COST,
            DEFAULT_SHARE_COST,
            Utc::now(),
        ],
    )?;

    get_post(conn, &id)?.ok_or_else(|| AppError::Internal("Post vanished after insert".into()))
}

pub fn get_post(conn: &Connection, id: &str) -> Result<Option<PostRow>, AppError> {
    Ok(conn
        .query_row("SELECT * FROM posts WHERE id = ?1", params![id], PostRow::from_row)
        .optional()?)
}

pub fn get_post_view(conn: &Connection, id: &str) -> Result<Option<PostView>, AppError> {
    let sql = format!("{} FROM posts p JOIN users u ON u.id = p.user_id WHERE p.id = ?1", view_select());
    Ok(conn.query_row(&sql, params![id], PostView::from_row).optional()?)
}

/// Newest posts first
pub fn list_timeline(conn: &Connection, limit: u32) -> Result<Vec<PostView>, AppError> {
    let sql = format!(
        "{} FROM posts p JOIN users u ON u.id = p.user_id ORDER BY p.created_at DESC LIMIT ?1",
        view_select()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![limit], PostView::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Posts for the exchange, with the viewer's summed holdings
pub fn list_market(
    conn: &Connection,
    sort: MarketSort,
    viewer_id: Option<&str>,
    limit: u32,
) -> Result<Vec<MarketPost>, AppError> {
    let sql = format!(
        "{},
            COALESCE((SELECT SUM(h.amount) FROM token_holdings h
                      WHERE h.post_id = p.id AND h.owner_id = ?1), 0) AS user_tokens
         FROM posts p JOIN users u ON u.id = p.user_id
         ORDER BY {} LIMIT ?2",
        view_select(),
        sort.order_clause()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![viewer_id, limit], |row| {
            Ok(MarketPost {
                view: PostView::from_row(row)?,
                user_tokens: row.get("user_tokens")?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Move `delta` tokens into (positive) or out of (negative) the available pool.
///
/// Refuses any change that would leave the pool outside `0..=supply`.
pub fn adjust_available(conn: &Connection, post_id: &str, delta: i64) -> Result<(), AppError> {
    let updated = conn.execute(
        "UPDATE posts SET available_tokens = available_tokens + ?1
         WHERE id = ?2 AND available_tokens + ?1 >= 0 AND available_tokens + ?1 <= total_token_supply",
        params![delta, post_id],
    )?;
    if updated == 0 {
        return Err(AppError::Rule("Token availability out of range".into()));
    }
    Ok(())
}

/// Engagement row (like or share)
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementRow {
    pub id: String,
    pub user_id: String,
    pub post_id: String,
    pub kind: EngagementKind,
    pub created_at: DateTime<Utc>,
}

pub fn find_engagement(
    conn: &Connection,
    user_id: &str,
    post_id: &str,
    kind: EngagementKind,
) -> Result<Option<EngagementRow>, AppError> {
    Ok(conn
        .query_row(
            "SELECT id, user_id, post_id, kind, created_at FROM engagements
             WHERE user_id = ?1 AND post_id = ?2 AND kind = ?3",
            params![user_id, post_id, kind],
            |row| {
                Ok(EngagementRow {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    post_id: row.get(2)?,
                    kind: row.get(3)?,
                    created_at: row.get(4)?,
                })
            },
        )
        .optional()?)
}

pub fn create_engagement(
    conn: &Connection,
    user_id: &str,
    post_id: &str,
    kind: EngagementKind,
) -> Result<(), AppError> {
    conn.execute(
        "INSERT INTO engagements (id, user_id, post_id, kind, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![new_id(), user_id, post_id, kind, Utc::now()],
    )?;
    Ok(())
}

pub fn delete_engagement(conn: &Connection, id: &str) -> Result<(), AppError> {
    conn.execute("DELETE FROM engagements WHERE id = ?1", params![id])?;
    Ok(())
}
