//! SQLite database module for posts and the token ledger
//!
//! ## Tables
//!
//! - `users`, `subscriptions`, `wallets` - accounts and balances
//! - `posts`, `engagements` - timeline and likes/shares
//! - `token_holdings` - per (post, owner) token balances with cost basis
//! - `dividend_distributions`, `dividend_claims` - payouts to holders
//! - `governance_proposals`, `governance_votes` - holder voting
//!
//! Repository functions in the submodules take a `&Connection` and never open
//! transactions themselves; services decide the transaction boundary through
//! [`Database::with_tx`].

pub mod schema;
pub mod models;
pub mod users;
pub mod wallets;
pub mod posts;
pub mod holdings;
pub mod dividends;
pub mod governance;

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{Connection, TransactionBehavior};
use tracing::{debug, info};

use crate::error::AppError;

/// SQLite database for the whole application
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create the database file
    pub fn open(path: &Path) -> Result<Self, AppError> {
        info!("Opening SQLite database at {:?}", path);

        let conn = Connection::open(path)?;

        // WAL for concurrent readers, FKs for cascade deletes
        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=ON;",
        )?;

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;

        Ok(db)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self, AppError> {
        debug!("Opening in-memory SQLite database");

        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;

        Ok(db)
    }

    fn init_schema(&self) -> Result<(), AppError> {
        self.with_conn(schema::init_schema)
    }

    /// Run a read or single-statement write against the connection
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, AppError>
    where
        F: FnOnce(&Connection) -> Result<T, AppError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| AppError::Internal(format!("Lock poisoned: {}", e)))?;
        f(&conn)
    }

    /// Run a check-then-write sequence inside one immediate transaction.
    ///
    /// The transaction commits only when `f` returns `Ok`; any error rolls
    /// every statement back, so a rejected trade or claim leaves no trace.
    pub fn with_tx<F, T>(&self, f: F) -> Result<T, AppError>
    where
        F: FnOnce(&Connection) -> Result<T, AppError>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| AppError::Internal(format!("Lock poisoned: {}", e)))?;

        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&tx)?;
        tx.commit()?;

        Ok(value)
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats, AppError> {
        self.with_conn(|conn| {
            let count = |table: &str| -> Result<u64, AppError> {
                let n: i64 =
                    conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                        row.get(0)
                    })?;
                Ok(n as u64)
            };

            Ok(DbStats {
                users: count("users")?,
                posts: count("posts")?,
                holdings: count("token_holdings")?,
                distributions: count("dividend_distributions")?,
                proposals: count("governance_proposals")?,
            })
        })
    }
}

/// Database statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct DbStats {
    pub users: u64,
    pub posts: u64,
    pub holdings: u64,
    pub distributions: u64,
    pub proposals: u64,
}

/// Fresh row identifier
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory_creates_schema() {
        let db = Database::open_in_memory().unwrap();
        let stats = db.stats().unwrap();
        assert_eq!(stats.users, 0);
        assert_eq!(stats.posts, 0);
    }

    #[test]
    fn test_open_file_database() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("tokenpost.db");

        {
            let db = Database::open(&path).unwrap();
            db.with_conn(|conn| users::create_user(conn, &users::NewUser::social("a@b.c", None)))
                .unwrap();
        }

        // Reopening keeps data and does not recreate tables
        let db = Database::open(&path).unwrap();
        assert_eq!(db.stats().unwrap().users, 1);
    }

    #[test]
    fn test_with_tx_rolls_back_on_error() {
        let db = Database::open_in_memory().unwrap();

        let result: Result<(), AppError> = db.with_tx(|conn| {
            users::create_user(conn, &users::NewUser::social("x@y.z", None))?;
            Err(AppError::Rule("abort".into()))
        });
        assert!(result.is_err());
        assert_eq!(db.stats().unwrap().users, 0);
    }
}
