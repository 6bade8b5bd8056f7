//! Event system for ledger operations
//!
//! Services emit an event after every committed write. The logging listener
//! turns them into an audit trail; tests subscribe directly.

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, trace};

use crate::db::models::{EngagementKind, VoteChoice};
use crate::ledger::TradeKind;

/// Ledger events emitted by services
#[derive(Debug, Clone)]
pub enum LedgerEvent {
    PostCreated {
        id: String,
        user_id: String,
        minted: bool,
    },
    Traded {
        post_id: String,
        user_id: String,
        kind: TradeKind,
        amount: i64,
        value: f64,
    },
    Engaged {
        post_id: String,
        user_id: String,
        kind: EngagementKind,
        tokens: i64,
        cost: f64,
    },
    Disengaged {
        post_id: String,
        user_id: String,
        kind: EngagementKind,
        tokens_returned: i64,
    },
    DividendDistributed {
        id: String,
        post_id: String,
        total_amount: f64,
        holders: usize,
    },
    DividendClaimed {
        distribution_id: String,
        user_id: String,
        amount: f64,
    },
    ProposalCreated {
        id: String,
        post_id: String,
        proposer_id: String,
    },
    VoteCast {
        proposal_id: String,
        voter_id: String,
        vote: VoteChoice,
        voting_power: i64,
        replaced: bool,
    },
    WalletConnected {
        user_id: String,
        wallet_type: String,
    },
    ExpirySwept {
        claims_expired: usize,
        proposals_closed: usize,
    },
}

/// Trait for event listeners
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &LedgerEvent);
}

/// Event bus for broadcasting ledger events
pub struct EventBus {
    sender: broadcast::Sender<LedgerEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event to all subscribers
    pub fn emit(&self, event: LedgerEvent) {
        trace!(event = ?event, "Emitting ledger event");
        // No subscribers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Logging event listener for audit trails
pub struct LoggingEventListener;

impl EventListener for LoggingEventListener {
    fn on_event(&self, event: &LedgerEvent) {
        match event {
            LedgerEvent::Traded {
                post_id,
                user_id,
                kind,
                amount,
                value,
            } => {
                info!(post = %post_id, user = %user_id, kind = ?kind, amount, value, "Trade settled");
            }
            LedgerEvent::DividendDistributed {
                id,
                post_id,
                total_amount,
                holders,
            } => {
                info!(id = %id, post = %post_id, total_amount, holders, "Dividend distributed");
            }
            LedgerEvent::DividendClaimed {
                distribution_id,
                user_id,
                amount,
            } => {
                info!(distribution = %distribution_id, user = %user_id, amount, "Dividend claimed");
            }
            LedgerEvent::VoteCast {
                proposal_id,
                voter_id,
                vote,
                voting_power,
                replaced,
            } => {
                debug!(
                    proposal = %proposal_id,
                    voter = %voter_id,
                    vote = %vote,
                    voting_power,
                    replaced,
                    "Vote cast"
                );
            }
            LedgerEvent::ExpirySwept {
                claims_expired,
                proposals_closed,
            } => {
                if *claims_expired > 0 || *proposals_closed > 0 {
                    info!(claims_expired, proposals_closed, "Expiry sweep");
                }
            }
            _ => {
                debug!(event = ?event, "Ledger event");
            }
        }
    }
}

/// Spawn a background task that logs all events
pub fn spawn_logging_listener(event_bus: Arc<EventBus>) -> tokio::task::JoinHandle<()> {
    let mut receiver = event_bus.subscribe();
    let listener = LoggingEventListener;

    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => listener.on_event(&event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!(skipped = n, "Event listener lagged, skipped events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed, stopping listener");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{timeout, Duration};

    #[tokio::test]
    async fn test_event_bus_emit_receive() {
        let bus = EventBus::new();
        let mut receiver = bus.subscribe();

        bus.emit(LedgerEvent::DividendClaimed {
            distribution_id: "dist-1".into(),
            user_id: "user-1".into(),
            amount: 3.0,
        });

        let event = timeout(Duration::from_millis(100), receiver.recv())
            .await
            .expect("timeout")
            .expect("receive error");

        match event {
            LedgerEvent::DividendClaimed { distribution_id, amount, .. } => {
                assert_eq!(distribution_id, "dist-1");
                assert_eq!(amount, 3.0);
            }
            _ => panic!("Wrong event type"),
        }
    }

    #[test]
    fn test_event_bus_no_subscribers() {
        let bus = EventBus::new();
        bus.emit(LedgerEvent::ExpirySwept {
            claims_expired: 0,
            proposals_closed: 0,
        });

        // Events emitted before subscribing are not replayed
        let mut late = bus.subscribe();
        assert!(matches!(
            late.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }
}
