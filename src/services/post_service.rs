//! Post service - timeline, posting, and token-awarding likes and shares

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::LedgerSettings;
use crate::db::models::{AcquiredVia, EngagementKind};
use crate::db::posts::{self, NewPost, PostView, DEFAULT_TOKEN_SUPPLY};
use crate::db::{holdings, wallets, Database};
use crate::error::AppError;
use crate::ledger;

use super::events::{EventBus, LedgerEvent};
use super::user_service::{is_premium, require_user};

/// Maximum post length in characters
pub const MAX_CONTENT_CHARS: usize = 280;
/// Charged to non-premium authors per post, in wallet currency
pub const POSTING_COST: f64 = 0.001;
/// Posts shown on the timeline
pub const TIMELINE_PAGE_SIZE: u32 = 50;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    pub content: Option<String>,
    pub image: Option<String>,
    #[serde(default, alias = "mintAsNFT")]
    pub mint_as_nft: bool,
}

/// Body of `POST /posts/like` and `POST /posts/share`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngageRequest {
    pub post_id: Option<String>,
    pub action: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngageOutcome {
    pub success: bool,
    pub message: String,
    pub token_cost: f64,
    pub currency: String,
    pub tokens_purchased: i64,
}

/// Verbs used in engagement messages
fn verbs(kind: EngagementKind) -> (&'static str, &'static str, &'static str) {
    match kind {
        EngagementKind::Like => ("like", "unlike", "liked"),
        EngagementKind::Share => ("share", "unshare", "shared"),
    }
}

fn nft_id(now: DateTime<Utc>) -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(|c| char::from(c).to_ascii_lowercase())
        .collect();
    format!("nft_{}_{}", now.timestamp_millis(), suffix)
}

pub struct PostService {
    db: Arc<Database>,
    events: Arc<EventBus>,
    settings: LedgerSettings,
}

impl PostService {
    pub fn new(db: Arc<Database>, events: Arc<EventBus>, settings: LedgerSettings) -> Self {
        Self { db, events, settings }
    }

    pub fn timeline(&self) -> Result<Vec<PostView>, AppError> {
        self.db.with_conn(|conn| posts::list_timeline(conn, TIMELINE_PAGE_SIZE))
    }

    pub fn create(
        &self,
        user_id: &str,
        request: CreatePostRequest,
        now: DateTime<Utc>,
    ) -> Result<PostView, AppError> {
        let content = request
            .content
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| AppError::Validation("Content is required".into()))?
            .to_string();
        if content.chars().count() > MAX_CONTENT_CHARS {
            return Err(AppError::Validation("Content too long".into()));
        }

        let view = self.db.with_tx(|conn| {
            let user = require_user(conn, user_id)?;
            let premium = is_premium(conn, &user, now)?;

            if !premium {
                let wallet = wallets::get_wallet_for_user(conn, user_id)?;
                if wallet.map_or(true, |w| w.balance < POSTING_COST) {
                    return Err(AppError::InsufficientFunds("Insufficient funds for posting".into()));
                }
                wallets::adjust_balance(conn, user_id, -POSTING_COST)?;
            }

            let minted = request.mint_as_nft && premium;
            let post = posts::create_post(
                conn,
                &NewPost {
                    user_id: user.id.clone(),
                    content,
                    image: request.image.filter(|i| !i.is_empty()),
                    is_premium: premium,
                    nft_id: minted.then(|| nft_id(now)),
                    available_tokens: if minted { 0 } else { DEFAULT_TOKEN_SUPPLY },
                },
            )?;

            if minted {
                holdings::create_holding(
                    conn,
                    &post.id,
                    &user.id,
                    post.total_token_supply,
                    0.0,
                    AcquiredVia::Mint,
                )?;
            }

            posts::get_post_view(conn, &post.id)?
                .ok_or_else(|| AppError::Internal("Post vanished after insert".into()))
        })?;

        self.events.emit(LedgerEvent::PostCreated {
            id: view.post.id.clone(),
            user_id: user_id.to_string(),
            minted: view.post.nft_id.is_some(),
        });

        Ok(view)
    }

    /// Like/unlike or share/unshare a post, buying or refunding its tokens
    pub fn engage(
        &self,
        user_id: &str,
        kind: EngagementKind,
        request: EngageRequest,
    ) -> Result<EngageOutcome, AppError> {
        let (post_id, action) = match (request.post_id, request.action) {
            (Some(p), Some(a)) if !p.is_empty() && !a.is_empty() => (p, a),
            _ => return Err(AppError::Validation("Missing required fields".into())),
        };

        let (verb, undo, past) = verbs(kind);
        let engaging = if action == verb {
            true
        } else if action == undo {
            false
        } else {
            return Err(AppError::Validation(format!(
                "Action must be \"{}\" or \"{}\"",
                verb, undo
            )));
        };
        let tokens = kind.tokens_awarded();

        let (outcome, moved) = self.db.with_tx(|conn| {
            let post = posts::get_post(conn, &post_id)?.ok_or_else(|| AppError::not_found("Post"))?;
            let wallet = wallets::get_or_provision(conn, user_id, self.settings.starting_balance)?;

            let usd_cost = match kind {
                EngagementKind::Like => post.like_cost,
                EngagementKind::Share => post.share_cost,
            };
            let cost = ledger::engagement_cost(usd_cost, &wallet.currency, wallet.exchange_rate);
            let currency = wallet.currency.clone();

            let moved = if engaging {
                if wallet.balance < cost {
                    return Err(AppError::InsufficientFunds(format!(
                        "Insufficient funds. You need at least {:.6} {} to {} this post.",
                        cost, currency, verb
                    )));
                }
                if post.available_tokens < tokens {
                    return Err(AppError::Rule("Not enough tokens available for this post.".into()));
                }
                if posts::find_engagement(conn, user_id, &post.id, kind)?.is_some() {
                    return Err(AppError::Conflict(format!("Post already {}", past)));
                }

                posts::create_engagement(conn, user_id, &post.id, kind)?;
                wallets::adjust_balance(conn, user_id, -cost)?;
                holdings::create_holding(
                    conn,
                    &post.id,
                    user_id,
                    tokens,
                    cost / tokens as f64,
                    kind.acquired_via(),
                )?;
                posts::adjust_available(conn, &post.id, -tokens)?;
                tokens
            } else {
                match posts::find_engagement(conn, user_id, &post.id, kind)? {
                    Some(engagement) => {
                        posts::delete_engagement(conn, &engagement.id)?;
                        wallets::adjust_balance(conn, user_id, cost)?;
                        let released = holdings::delete_by_via(conn, &post.id, user_id, kind.acquired_via())?;
                        if released > 0 {
                            posts::adjust_available(conn, &post.id, released)?;
                        }
                        released
                    }
                    None => 0,
                }
            };

            let token_word = if tokens == 1 { "token" } else { "tokens" };
            let message = if engaging {
                format!(
                    "Post {} and {} {} purchased for {:.6} {}!",
                    past, tokens, token_word, cost, currency
                )
            } else {
                format!(
                    "Post un{} and {} {} refunded ({:.6} {})!",
                    past, tokens, token_word, cost, currency
                )
            };

            Ok((
                EngageOutcome {
                    success: true,
                    message,
                    token_cost: cost,
                    currency,
                    tokens_purchased: if engaging { tokens } else { 0 },
                },
                moved,
            ))
        })?;

        if engaging {
            self.events.emit(LedgerEvent::Engaged {
                post_id,
                user_id: user_id.to_string(),
                kind,
                tokens,
                cost: outcome.token_cost,
            });
        } else if moved > 0 {
            self.events.emit(LedgerEvent::Disengaged {
                post_id,
                user_id: user_id.to_string(),
                kind,
                tokens_returned: moved,
            });
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::users::{create_user, NewUser};

    struct Fixture {
        db: Arc<Database>,
        service: PostService,
        author: String,
        fan: String,
    }

    fn fixture() -> Fixture {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let (author, fan) = db
            .with_conn(|conn| {
                let author = create_user(
                    conn,
                    &NewUser {
                        is_premium: true,
                        ..NewUser::social("author@example.com", Some("Author"))
                    },
                )?;
                let fan = create_user(conn, &NewUser::social("fan@example.com", None))?;
                Ok((author.id, fan.id))
            })
            .unwrap();

        let service = PostService::new(db.clone(), Arc::new(EventBus::new()), LedgerSettings::default());
        Fixture {
            db,
            service,
            author,
            fan,
        }
    }

    fn content(text: &str) -> CreatePostRequest {
        CreatePostRequest {
            content: Some(text.to_string()),
            ..Default::default()
        }
    }

    fn engage(post_id: &str, action: &str) -> EngageRequest {
        EngageRequest {
            post_id: Some(post_id.to_string()),
            action: Some(action.to_string()),
        }
    }

    #[test]
    fn test_content_rules() {
        let fx = fixture();
        let now = Utc::now();

        let err = fx.service.create(&fx.author, content("   "), now).unwrap_err();
        assert_eq!(err.to_string(), "Content is required");

        let err = fx.service.create(&fx.author, content(&"x".repeat(281)), now).unwrap_err();
        assert_eq!(err.to_string(), "Content too long");

        // 280 multi-byte characters still fit
        let view = fx.service.create(&fx.author, content(&"é".repeat(280)), now).unwrap();
        assert_eq!(view.post.available_tokens, DEFAULT_TOKEN_SUPPLY);
    }

    #[test]
    fn test_non_premium_pays_to_post() {
        let fx = fixture();
        let now = Utc::now();

        let err = fx.service.create(&fx.fan, content("hi"), now).unwrap_err();
        assert_eq!(err.to_string(), "Insufficient funds for posting");

        fx.db
            .with_conn(|conn| wallets::get_or_provision(conn, &fx.fan, 0.01).map(|_| ()))
            .unwrap();
        fx.service.create(&fx.fan, content("hi"), now).unwrap();

        let wallet = fx
            .db
            .with_conn(|conn| wallets::get_wallet_for_user(conn, &fx.fan))
            .unwrap()
            .unwrap();
        assert!((wallet.balance - 0.009).abs() < 1e-12);
    }

    #[test]
    fn test_mint_gives_creator_full_supply() {
        let fx = fixture();
        let request = CreatePostRequest {
            mint_as_nft: true,
            ..content("minted")
        };
        let view = fx.service.create(&fx.author, request, Utc::now()).unwrap();

        assert!(view.post.nft_id.as_deref().is_some_and(|id| id.starts_with("nft_")));
        assert_eq!(view.post.available_tokens, 0);
        let held = fx
            .db
            .with_conn(|conn| holdings::sum_for_owner(conn, &view.post.id, &fx.author))
            .unwrap();
        assert_eq!(held, DEFAULT_TOKEN_SUPPLY);
    }

    #[test]
    fn test_like_unlike_cycle() {
        let fx = fixture();
        let post = fx.service.create(&fx.author, content("like me"), Utc::now()).unwrap();
        let post_id = post.post.id.clone();

        let outcome = fx.service.engage(&fx.fan, EngagementKind::Like, engage(&post_id, "like")).unwrap();
        assert_eq!(outcome.tokens_purchased, 1);
        assert_eq!(outcome.currency, "BSV");
        // 0.01 USD at 0.02 BSV/USD
        assert!((outcome.token_cost - 0.0002).abs() < 1e-12);
        assert_eq!(outcome.message, "Post liked and 1 token purchased for 0.000200 BSV!");

        let err = fx
            .service
            .engage(&fx.fan, EngagementKind::Like, engage(&post_id, "like"))
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let available = |fx: &Fixture| {
            fx.db
                .with_conn(|conn| posts::get_post(conn, &post_id))
                .unwrap()
                .unwrap()
                .available_tokens
        };
        assert_eq!(available(&fx), DEFAULT_TOKEN_SUPPLY - 1);

        let outcome = fx
            .service
            .engage(&fx.fan, EngagementKind::Like, engage(&post_id, "unlike"))
            .unwrap();
        assert_eq!(outcome.tokens_purchased, 0);
        assert_eq!(available(&fx), DEFAULT_TOKEN_SUPPLY);

        let wallet = fx
            .db
            .with_conn(|conn| wallets::get_wallet_for_user(conn, &fx.fan))
            .unwrap()
            .unwrap();
        assert!((wallet.balance - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_share_awards_ten_tokens() {
        let fx = fixture();
        let post = fx.service.create(&fx.author, content("share me"), Utc::now()).unwrap();

        let outcome = fx
            .service
            .engage(&fx.fan, EngagementKind::Share, engage(&post.post.id, "share"))
            .unwrap();
        assert_eq!(outcome.tokens_purchased, 10);

        let rows = fx
            .db
            .with_conn(|conn| holdings::list_for_owner(conn, &post.post.id, &fx.fan))
            .unwrap();
        assert_eq!(rows[0].acquired_via, AcquiredVia::Share);
        assert!((rows[0].purchase_price - 0.0001).abs() < 1e-12);
    }

    #[test]
    fn test_engage_validation() {
        let fx = fixture();
        let err = fx
            .service
            .engage(&fx.fan, EngagementKind::Like, EngageRequest::default())
            .unwrap_err();
        assert_eq!(err.to_string(), "Missing required fields");

        let err = fx
            .service
            .engage(&fx.fan, EngagementKind::Like, engage("p", "share"))
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let err = fx
            .service
            .engage(&fx.fan, EngagementKind::Like, engage("missing", "like"))
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_like_needs_available_tokens() {
        let fx = fixture();
        let request = CreatePostRequest {
            mint_as_nft: true,
            ..content("sold out")
        };
        let post = fx.service.create(&fx.author, request, Utc::now()).unwrap();

        let err = fx
            .service
            .engage(&fx.fan, EngagementKind::Like, engage(&post.post.id, "like"))
            .unwrap_err();
        assert_eq!(err.to_string(), "Not enough tokens available for this post.");
    }
}
