//! Tokenpost - tokenized posts backend
//!
//! Every post carries a fixed supply of tradable tokens. Users acquire them by
//! liking, sharing or buying, then earn dividends the author distributes and
//! vote on the author's proposals in proportion to their holdings.
//!
//! State lives in one SQLite file; every check-then-write sequence runs in an
//! immediate transaction so concurrent trades, claims and votes serialize.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod ledger;
pub mod rates;
pub mod routes;
pub mod seed;
pub mod server;
pub mod services;

pub use config::Args;
pub use error::AppError;
pub use server::{run, AppState};
