//! Sample data for local development
//!
//! Creates an admin account with four posts and a funded wallet. Safe to run
//! repeatedly: existing rows are left alone.

use rusqlite::params;
use serde::Serialize;
use tracing::info;

use crate::db::posts::{self, NewPost, DEFAULT_TOKEN_SUPPLY};
use crate::db::users::{self, NewUser};
use crate::db::wallets::{self, NewWallet};
use crate::db::Database;
use crate::error::AppError;

pub const ADMIN_EMAIL: &str = "admin@bitchat.com";
const ADMIN_NAME: &str = "Bitch@ Admin";
const ADMIN_USERNAME: &str = "bitchat_admin";
const ADMIN_WALLET_ADDRESS: &str = "1BitcoinEaterAddressDontSendf59kuE";
const ADMIN_WALLET_BALANCE: f64 = 0.042;

/// (content, premium)
const SAMPLE_POSTS: [(&str, bool); 4] = [
    (
        "🚀 Welcome to Bitch@ - The Real Bitcoin Social Platform! Built on BSV with NFT posts and micro-payments. Time to troll Jack Dorsey's BitChat! 💎",
        true,
    ),
    (
        "Just minted my first NFT post on Bitch@! This post comes with 1M tradable tokens. Who wants to buy some? #BSV #NFT #RealBitcoin",
        true,
    ),
    (
        "Bitcoin SV is the only real Bitcoin. Everything else is just vaporware from people who couldn't scale. BSV scales to billions of users! ⚡",
        false,
    ),
    (
        "Micro-payments for comments and posts make social media sustainable. No more ads, no more censorship. Just real conversations on real money.",
        true,
    ),
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub admin_id: String,
    pub admin_created: bool,
    pub posts_created: usize,
    pub wallet_created: bool,
}

pub fn seed(db: &Database) -> Result<SeedReport, AppError> {
    let report = db.with_tx(|conn| {
        let (admin, admin_created) = match users::get_user_by_email(conn, ADMIN_EMAIL)? {
            Some(user) => (user, false),
            None => {
                let user = users::create_user(
                    conn,
                    &NewUser {
                        email: Some(ADMIN_EMAIL.to_string()),
                        name: Some(ADMIN_NAME.to_string()),
                        username: ADMIN_USERNAME.to_string(),
                        is_admin: true,
                        is_premium: true,
                        ..Default::default()
                    },
                )?;
                (user, true)
            }
        };

        let existing_posts: i64 = conn.query_row(
            "SELECT COUNT(*) FROM posts WHERE user_id = ?1",
            params![admin.id],
            |row| row.get(0),
        )?;

        let mut posts_created = 0;
        if existing_posts == 0 {
            for (content, is_premium) in SAMPLE_POSTS {
                posts::create_post(
                    conn,
                    &NewPost {
                        user_id: admin.id.clone(),
                        content: content.to_string(),
                        image: None,
                        is_premium,
                        nft_id: None,
                        available_tokens: DEFAULT_TOKEN_SUPPLY,
                    },
                )?;
                posts_created += 1;
            }
        }

        let wallet_created = match wallets::get_wallet_for_user(conn, &admin.id)? {
            Some(_) => false,
            None => {
                wallets::create_wallet(
                    conn,
                    &NewWallet {
                        user_id: admin.id.clone(),
                        wallet_type: "bsv".to_string(),
                        address: ADMIN_WALLET_ADDRESS.to_string(),
                        balance: ADMIN_WALLET_BALANCE,
                        currency: "BSV".to_string(),
                    },
                )?;
                true
            }
        };

        Ok(SeedReport {
            admin_id: admin.id,
            admin_created,
            posts_created,
            wallet_created,
        })
    })?;

    info!(
        admin = %report.admin_id,
        admin_created = report.admin_created,
        posts_created = report.posts_created,
        wallet_created = report.wallet_created,
        "Database seeded"
    );
    Ok(report)
}
