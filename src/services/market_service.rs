//! Market service - exchange listing and holder portfolios

use std::sync::Arc;

use serde::Serialize;

use crate::db::holdings::{self, PortfolioRow};
use crate::db::models::AcquiredVia;
use crate::db::posts::{self, MarketPost, MarketSort};
use crate::db::users::UserSummary;
use crate::db::Database;
use crate::error::AppError;

/// Posts shown on the exchange
pub const MARKET_PAGE_SIZE: u32 = 50;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Engagement {
    pub likes: i64,
    pub shares: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioPost {
    pub id: String,
    pub content: String,
    pub user: UserSummary,
    pub engagement: Engagement,
}

/// One holding valued at the post's current price
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioEntry {
    pub id: String,
    pub post_id: String,
    pub amount: i64,
    pub purchase_price: f64,
    pub current_price: f64,
    pub current_value: f64,
    pub profit: f64,
    pub profit_percentage: f64,
    pub acquired_via: AcquiredVia,
    pub post: PortfolioPost,
}

impl From<PortfolioRow> for PortfolioEntry {
    fn from(row: PortfolioRow) -> Self {
        let holding = row.holding;
        let current_value = holding.amount as f64 * row.token_price;
        let invested = holding.amount as f64 * holding.purchase_price;
        let profit_percentage = if holding.purchase_price > 0.0 {
            (row.token_price - holding.purchase_price) / holding.purchase_price * 100.0
        } else {
            0.0
        };

        Self {
            id: holding.id,
            post_id: holding.post_id.clone(),
            amount: holding.amount,
            purchase_price: holding.purchase_price,
            current_price: row.token_price,
            current_value,
            profit: current_value - invested,
            profit_percentage,
            acquired_via: holding.acquired_via,
            post: PortfolioPost {
                id: holding.post_id,
                content: row.content,
                user: row.author,
                engagement: Engagement {
                    likes: row.likes,
                    shares: row.shares,
                },
            },
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioStats {
    pub total_tokens: i64,
    pub total_value: f64,
    pub total_invested: f64,
    pub total_profit: f64,
    pub positions: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Portfolio {
    pub stats: PortfolioStats,
    pub holdings: Vec<PortfolioEntry>,
}

impl Portfolio {
    fn from_entries(holdings: Vec<PortfolioEntry>) -> Self {
        let stats = holdings.iter().fold(PortfolioStats::default(), |mut stats, h| {
            stats.total_tokens += h.amount;
            stats.total_value += h.current_value;
            stats.total_invested += h.amount as f64 * h.purchase_price;
            stats.total_profit += h.profit;
            stats.positions += 1;
            stats
        });
        Self { stats, holdings }
    }
}

pub struct MarketService {
    db: Arc<Database>,
}

impl MarketService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Exchange listing; `viewer_id` fills in the viewer's holdings
    pub fn list(&self, sort: MarketSort, viewer_id: Option<&str>) -> Result<Vec<MarketPost>, AppError> {
        self.db
            .with_conn(|conn| posts::list_market(conn, sort, viewer_id, MARKET_PAGE_SIZE))
    }

    pub fn portfolio(&self, user_id: &str) -> Result<Portfolio, AppError> {
        let rows = self.db.with_conn(|conn| holdings::list_portfolio(conn, user_id))?;
        Ok(Portfolio::from_entries(rows.into_iter().map(PortfolioEntry::from).collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::posts::{NewPost, DEFAULT_TOKEN_SUPPLY};
    use crate::db::users::{create_user, NewUser};
    use rusqlite::params;

    fn setup() -> (Arc<Database>, String, String) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let ids = db
            .with_conn(|conn| {
                let user = create_user(conn, &NewUser::social("investor@example.com", None))?;
                let post = posts::create_post(
                    conn,
                    &NewPost {
                        user_id: user.id.clone(),
                        content: "portfolio".into(),
                        image: None,
                        is_premium: false,
                        nft_id: None,
                        available_tokens: DEFAULT_TOKEN_SUPPLY,
                    },
                )?;
                Ok((user.id, post.id))
            })
            .unwrap();
        (db, ids.0, ids.1)
    }

    #[test]
    fn test_portfolio_valuation() {
        let (db, user, post) = setup();
        db.with_conn(|conn| {
            holdings::create_holding(conn, &post, &user, 1000, 0.0001, AcquiredVia::Purchase)?;
            holdings::create_holding(conn, &post, &user, 1, 0.0, AcquiredVia::Mint)?;
            // Price doubles
            conn.execute("UPDATE posts SET token_price = 0.0002 WHERE id = ?1", params![post])?;
            Ok(())
        })
        .unwrap();

        let service = MarketService::new(db);
        let portfolio = service.portfolio(&user).unwrap();

        assert_eq!(portfolio.stats.positions, 2);
        assert_eq!(portfolio.stats.total_tokens, 1001);

        let bought = &portfolio.holdings[0];
        assert_eq!(bought.amount, 1000);
        assert!((bought.current_value - 0.2).abs() < 1e-9);
        assert!((bought.profit - 0.1).abs() < 1e-9);
        assert!((bought.profit_percentage - 100.0).abs() < 1e-6);

        // Zero cost basis never divides by zero
        assert_eq!(portfolio.holdings[1].profit_percentage, 0.0);
    }

    #[test]
    fn test_market_reports_viewer_tokens() {
        let (db, user, post) = setup();
        db.with_conn(|conn| {
            holdings::create_holding(conn, &post, &user, 42, 0.0001, AcquiredVia::Purchase)
                .map(|_| ())
        })
        .unwrap();

        let service = MarketService::new(db);
        let listing = service.list(MarketSort::Volume, Some(&user)).unwrap();
        assert_eq!(listing[0].user_tokens, 42);

        let anonymous = service.list(MarketSort::Newest, None).unwrap();
        assert_eq!(anonymous[0].user_tokens, 0);
    }
}
