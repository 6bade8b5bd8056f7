//! Configuration for tokenpost
//!
//! CLI arguments and environment variable handling using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Minimum length of the session signing secret outside dev mode
pub const MIN_SECRET_LEN: usize = 32;

/// tokenpost - tokenized posts backend
#[derive(Parser, Debug, Clone)]
#[command(name = "tokenpost")]
#[command(about = "Timeline, post token exchange, dividends and governance over SQLite")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// SQLite database file. When unset the API answers 503 for every
    /// data-backed route.
    #[arg(long, env = "DATABASE_PATH")]
    pub database_path: Option<PathBuf>,

    /// JWT secret for session signing (required outside dev mode)
    #[arg(long, env = "JWT_SECRET")]
    pub jwt_secret: Option<String>,

    /// Session token expiry in seconds
    #[arg(long, env = "JWT_EXPIRY_SECONDS", default_value = "86400")]
    pub jwt_expiry_seconds: u64,

    /// Enable development mode (insecure default secret, dev-login route)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// How trades and dividend claims move money
    #[arg(long, env = "SETTLEMENT", value_enum, default_value_t = Settlement::Ledger)]
    pub settlement: Settlement,

    /// Balance credited to wallets provisioned on first engagement
    #[arg(long, env = "STARTING_BALANCE", default_value = "0.01")]
    pub starting_balance: f64,

    /// Interval of the expiry sweep for dividend claims and proposals
    #[arg(long, env = "SWEEP_INTERVAL_SECS", default_value = "3600")]
    pub sweep_interval_secs: u64,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the HTTP API (default)
    Serve,
    /// Populate the database with a sample admin, posts and wallet
    Seed,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Whether trades and claims touch wallet balances
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Settlement {
    /// Ledger-only accounting: token balances move, wallets do not
    #[default]
    Ledger,
    /// Buys debit, sells and dividend claims credit the caller's wallet
    Wallet,
}

/// Ledger tunables handed to the services
#[derive(Debug, Clone)]
pub struct LedgerSettings {
    pub settlement: Settlement,
    pub starting_balance: f64,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            settlement: Settlement::Ledger,
            starting_balance: 0.01,
        }
    }
}

impl Args {
    /// Get effective JWT secret (uses default in dev mode)
    pub fn jwt_secret(&self) -> Option<String> {
        match (&self.jwt_secret, self.dev_mode) {
            (Some(secret), _) => Some(secret.clone()),
            (None, true) => Some("dev-mode-secret-not-for-production-use-123456".to_string()),
            (None, false) => None,
        }
    }

    pub fn ledger_settings(&self) -> LedgerSettings {
        LedgerSettings {
            settlement: self.settlement,
            starting_balance: self.starting_balance,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode {
            match &self.jwt_secret {
                None => return Err("JWT_SECRET is required in production mode".to_string()),
                Some(s) if s.len() < MIN_SECRET_LEN => {
                    return Err(format!(
                        "JWT_SECRET must be at least {} characters",
                        MIN_SECRET_LEN
                    ))
                }
                Some(_) => {}
            }
        }

        if self.starting_balance < 0.0 {
            return Err("STARTING_BALANCE must not be negative".to_string());
        }

        if self.sweep_interval_secs == 0 {
            return Err("SWEEP_INTERVAL_SECS must be greater than zero".to_string());
        }

        Ok(())
    }
}
