//! Database schema definitions

use rusqlite::{Connection, OptionalExtension};
use tracing::info;

use crate::error::AppError;

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<(), AppError> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        info!("Creating new database schema v{}", SCHEMA_VERSION);
        conn.execute_batch(ACCOUNTS_SCHEMA)?;
        conn.execute_batch(POSTS_SCHEMA)?;
        conn.execute_batch(LEDGER_SCHEMA)?;
        conn.execute_batch(GOVERNANCE_SCHEMA)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version < SCHEMA_VERSION {
        info!("Migrating schema from v{} to v{}", current_version, SCHEMA_VERSION);
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else {
        info!("Database schema is up to date (v{})", current_version);
    }

    Ok(())
}

/// Get current schema version (0 if not initialized)
fn get_schema_version(conn: &Connection) -> Result<i32, AppError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
        [],
    )?;

    let version: Option<i32> = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0))
        .optional()?;

    Ok(version.unwrap_or(0))
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<(), AppError> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

const ACCOUNTS_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY NOT NULL,
    email TEXT UNIQUE,
    name TEXT,
    username TEXT NOT NULL,
    image TEXT,
    is_admin INTEGER NOT NULL DEFAULT 0,
    is_premium INTEGER NOT NULL DEFAULT 0,
    wallet_address TEXT UNIQUE,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS subscriptions (
    user_id TEXT PRIMARY KEY NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    status TEXT NOT NULL,
    current_period_end TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS wallets (
    id TEXT PRIMARY KEY NOT NULL,
    user_id TEXT NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
    wallet_type TEXT NOT NULL,
    address TEXT NOT NULL UNIQUE,
    balance REAL NOT NULL DEFAULT 0,
    currency TEXT NOT NULL DEFAULT 'BSV',
    exchange_rate REAL,
    created_at TEXT NOT NULL
);
"#;

const POSTS_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS posts (
    id TEXT PRIMARY KEY NOT NULL,
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    content TEXT NOT NULL,
    image TEXT,
    is_premium INTEGER NOT NULL DEFAULT 0,
    nft_id TEXT,
    total_token_supply INTEGER NOT NULL,
    available_tokens INTEGER NOT NULL,
    token_price REAL NOT NULL,
    like_cost REAL NOT NULL,
    share_cost REAL NOT NULL,
    created_at TEXT NOT NULL,
    CHECK (available_tokens >= 0 AND available_tokens <= total_token_supply)
);

CREATE TABLE IF NOT EXISTS engagements (
    id TEXT PRIMARY KEY NOT NULL,
    user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    post_id TEXT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
    kind TEXT NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE (user_id, post_id, kind)
);

CREATE INDEX IF NOT EXISTS idx_posts_created ON posts(created_at);
CREATE INDEX IF NOT EXISTS idx_engagements_post ON engagements(post_id, kind);
"#;

const LEDGER_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS token_holdings (
    id TEXT PRIMARY KEY NOT NULL,
    post_id TEXT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
    owner_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    amount INTEGER NOT NULL CHECK (amount > 0),
    purchase_price REAL NOT NULL DEFAULT 0,
    acquired_via TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS dividend_distributions (
    id TEXT PRIMARY KEY NOT NULL,
    post_id TEXT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
    total_amount REAL NOT NULL,
    amount_per_token REAL NOT NULL,
    transaction_id TEXT,
    status TEXT NOT NULL,
    distribution_date TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS dividend_claims (
    id TEXT PRIMARY KEY NOT NULL,
    distribution_id TEXT NOT NULL REFERENCES dividend_distributions(id) ON DELETE CASCADE,
    token_holder_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    amount REAL NOT NULL,
    tokens_held INTEGER NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    claimed_at TEXT,
    UNIQUE (distribution_id, token_holder_id)
);

CREATE INDEX IF NOT EXISTS idx_holdings_post_owner ON token_holdings(post_id, owner_id);
CREATE INDEX IF NOT EXISTS idx_holdings_owner ON token_holdings(owner_id);
CREATE INDEX IF NOT EXISTS idx_distributions_post ON dividend_distributions(post_id, distribution_date);
"#;

const GOVERNANCE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS governance_proposals (
    id TEXT PRIMARY KEY NOT NULL,
    post_id TEXT NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
    proposer_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    proposal_type TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'active',
    voting_ends_at TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS governance_votes (
    id TEXT PRIMARY KEY NOT NULL,
    proposal_id TEXT NOT NULL REFERENCES governance_proposals(id) ON DELETE CASCADE,
    voter_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    vote TEXT NOT NULL,
    voting_power INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (proposal_id, voter_id)
);

CREATE INDEX IF NOT EXISTS idx_proposals_post ON governance_proposals(post_id, status);
"#;
