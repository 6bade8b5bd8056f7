//! Service layer for tokenpost
//!
//! Services hold the business rules between HTTP handlers and repositories.
//! Each one:
//! - validates raw request input
//! - runs every check-then-write sequence in one immediate transaction
//! - emits a [`LedgerEvent`] after the transaction commits
//!
//! ## Architecture
//!
//! ```text
//! HTTP Handlers (thin)
//!     ↓
//! Service Layer (business logic)
//!     ↓
//! Ledger (pure accounting)  +  Repository Layer (db/*.rs)
//!     ↓
//! SQLite Database
//! ```

pub mod events;
pub mod trade_service;
pub mod market_service;
pub mod dividend_service;
pub mod governance_service;
pub mod post_service;
pub mod wallet_service;
pub mod user_service;
pub mod expiry_service;

pub use events::{EventBus, EventListener, LedgerEvent};
pub use dividend_service::DividendService;
pub use expiry_service::ExpiryService;
pub use governance_service::GovernanceService;
pub use market_service::MarketService;
pub use post_service::PostService;
pub use trade_service::TradeService;
pub use user_service::UserService;
pub use wallet_service::WalletService;

use std::sync::Arc;

use crate::config::LedgerSettings;
use crate::db::Database;

/// Service container shared by every handler
pub struct Services {
    pub db: Arc<Database>,
    pub trades: Arc<TradeService>,
    pub market: Arc<MarketService>,
    pub dividends: Arc<DividendService>,
    pub governance: Arc<GovernanceService>,
    pub posts: Arc<PostService>,
    pub wallets: Arc<WalletService>,
    pub users: Arc<UserService>,
    pub expiry: Arc<ExpiryService>,
    pub events: Arc<EventBus>,
}

impl Services {
    /// Create all services over one database
    pub fn new(db: Arc<Database>, settings: LedgerSettings) -> Self {
        let events = Arc::new(EventBus::new());

        Self {
            trades: Arc::new(TradeService::new(db.clone(), events.clone(), settings.clone())),
            market: Arc::new(MarketService::new(db.clone())),
            dividends: Arc::new(DividendService::new(db.clone(), events.clone(), settings.clone())),
            governance: Arc::new(GovernanceService::new(db.clone(), events.clone())),
            posts: Arc::new(PostService::new(db.clone(), events.clone(), settings)),
            wallets: Arc::new(WalletService::new(db.clone(), events.clone())),
            users: Arc::new(UserService::new(db.clone())),
            expiry: Arc::new(ExpiryService::new(db.clone(), events.clone())),
            events,
            db,
        }
    }
}
