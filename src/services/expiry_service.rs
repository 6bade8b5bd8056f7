//! Expiry service - persists dividend claim expiry and proposal closure
//!
//! Reads already report effective statuses; the sweep only makes the stored
//! rows catch up so they can be queried by status.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::db::{dividends, governance, Database};
use crate::error::AppError;

use super::events::{EventBus, LedgerEvent};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub claims_expired: usize,
    pub proposals_closed: usize,
}

pub struct ExpiryService {
    db: Arc<Database>,
    events: Arc<EventBus>,
}

impl ExpiryService {
    pub fn new(db: Arc<Database>, events: Arc<EventBus>) -> Self {
        Self { db, events }
    }

    pub fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport, AppError> {
        let report = self.db.with_tx(|conn| {
            Ok(SweepReport {
                claims_expired: dividends::expire_stale_claims(conn, now)?,
                proposals_closed: governance::close_expired(conn, now)?,
            })
        })?;

        self.events.emit(LedgerEvent::ExpirySwept {
            claims_expired: report.claims_expired,
            proposals_closed: report.proposals_closed,
        });

        Ok(report)
    }
}

/// Spawn the periodic expiry sweep
pub fn spawn_expiry_sweep(service: Arc<ExpiryService>, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if let Err(e) = service.sweep(Utc::now()) {
                warn!(error = %e, "Expiry sweep failed");
            }
        }
    })
}
