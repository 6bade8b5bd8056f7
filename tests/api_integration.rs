//! Integration tests driving the HTTP router end to end
//!
//! Each test builds a router over its own database and talks to it with
//! `tower::ServiceExt::oneshot`; no sockets are opened.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use ed25519_dalek::{Signer, SigningKey};
use http_body_util::BodyExt;
use rand::rngs::OsRng;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use tokenpost::auth::{JwtValidator, PrincipalKind, TokenInput};
use tokenpost::config::LedgerSettings;
use tokenpost::db::posts::{self, NewPost, DEFAULT_TOKEN_SUPPLY};
use tokenpost::db::{dividends, Database};
use tokenpost::routes::create_router;
use tokenpost::server::AppState;
use tokenpost::services::Services;

struct Harness {
    router: Router,
    services: Arc<Services>,
    jwt: JwtValidator,
}

impl Harness {
    fn new() -> Self {
        Self::with_db(Database::open_in_memory().unwrap(), true)
    }

    fn with_db(db: Database, dev_mode: bool) -> Self {
        let services = Arc::new(Services::new(Arc::new(db), LedgerSettings::default()));
        let jwt = JwtValidator::new_dev();
        let state = AppState::new(Some(services.clone()), jwt.clone(), dev_mode);
        Self {
            router: create_router(state),
            services,
            jwt,
        }
    }

    /// Social user plus a session token for them
    fn user(&self, email: &str) -> (String, String) {
        let user = self.services.users.sign_in_social(email, None).unwrap();
        let token = self
            .jwt
            .generate_token(TokenInput {
                user_id: user.id.clone(),
                kind: PrincipalKind::Social,
                identifier: email.to_string(),
                wallet_type: None,
            })
            .unwrap();
        (user.id, token)
    }

    fn post_by(&self, user_id: &str) -> String {
        self.services
            .db
            .with_conn(|conn| {
                posts::create_post(
                    conn,
                    &NewPost {
                        user_id: user_id.to_string(),
                        content: "tokenized thoughts".into(),
                        image: None,
                        is_premium: false,
                        nft_id: None,
                        available_tokens: DEFAULT_TOKEN_SUPPLY,
                    },
                )
            })
            .unwrap()
            .id
    }

    async fn send(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        send(&self.router, method, uri, token, body).await
    }
}

async fn send(
    router: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let (content_type, body) = match body {
        Some(body) => (Some("application/json"), Body::from(body.to_string())),
        None => (None, Body::empty()),
    };
    send_raw(router, method, uri, token, content_type, body).await
}

async fn send_raw(
    router: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    content_type: Option<&str>,
    body: Body,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    if let Some(content_type) = content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }
    let request = builder.body(body).unwrap();

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

/// Fetch a challenge for `key` and sign it: (address, message, signature)
async fn signed_challenge(h: &Harness, key: &SigningKey) -> (String, String, String) {
    let address = hex::encode(key.verifying_key().to_bytes());
    let (status, body) = h
        .send("GET", &format!("/auth/wallet/challenge?address={}", address), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let message = body["message"].as_str().unwrap().to_string();
    let signature = hex::encode(key.sign(message.as_bytes()).to_bytes());
    (address, message, signature)
}

async fn trade(h: &Harness, token: &str, post_id: &str, kind: &str, amount: i64) -> (StatusCode, Value) {
    h.send(
        "POST",
        "/exchange/trade",
        Some(token),
        Some(json!({ "postId": post_id, "type": kind, "amount": amount })),
    )
    .await
}

#[tokio::test]
async fn test_missing_database_is_503_before_auth() {
    let state = AppState::new(None, JwtValidator::new_dev(), true);
    let router = create_router(state);

    let (status, body) = send(&router, "GET", "/posts", None, None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "Database not configured");

    // No token either, still 503
    let (status, _) = send(
        &router,
        "POST",
        "/exchange/trade",
        None,
        Some(json!({ "postId": "p", "type": "buy", "amount": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (status, body) = send(&router, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["database"], "not configured");

    // Static rates need no storage
    let (status, body) = send(&router, "GET", "/exchange-rates?from=bsv&to=usd", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["from"], "BSV");
    assert!(body["rate"].as_f64().unwrap() > 0.0);
}

#[tokio::test]
async fn test_protected_routes_require_session() {
    let h = Harness::new();

    let (status, body) = h.send("GET", "/exchange/portfolio", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthorized");

    let (status, _) = h
        .send("GET", "/auth/me", Some("definitely.not.valid"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Anonymous market browsing is allowed
    let (status, body) = h.send("GET", "/exchange", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["posts"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_buy_then_sell_round_trip() {
    let h = Harness::new();
    let (author, _) = h.user("author@example.com");
    let (_, buyer_token) = h.user("buyer@example.com");
    let post_id = h.post_by(&author);

    let (status, body) = trade(&h, &buyer_token, &post_id, "buy", 100).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["transaction"]["type"], "buy");
    assert_eq!(body["transaction"]["amount"], 100);
    assert_eq!(body["message"], "Bought 100 tokens for $0.0100");

    let (_, market) = h.send("GET", "/exchange?sort=newest", Some(&buyer_token), None).await;
    let listed = &market["posts"][0];
    assert_eq!(listed["availableTokens"], DEFAULT_TOKEN_SUPPLY - 100);
    assert_eq!(listed["userTokens"], 100);

    let (_, portfolio) = h.send("GET", "/exchange/portfolio", Some(&buyer_token), None).await;
    assert_eq!(portfolio["portfolio"]["stats"]["totalTokens"], 100);

    // Cannot sell more than held
    let (status, body) = trade(&h, &buyer_token, &post_id, "sell", 101).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Insufficient tokens to sell");

    let (status, body) = trade(&h, &buyer_token, &post_id, "sell", 100).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["transaction"]["type"], "sell");

    let (_, market) = h.send("GET", "/exchange", Some(&buyer_token), None).await;
    assert_eq!(market["posts"][0]["availableTokens"], DEFAULT_TOKEN_SUPPLY);
    assert_eq!(market["posts"][0]["userTokens"], 0);
}

#[tokio::test]
async fn test_rejected_trades_change_nothing() {
    let h = Harness::new();
    let (author, _) = h.user("author@example.com");
    let (_, token) = h.user("buyer@example.com");
    let post_id = h.post_by(&author);

    let (status, body) = trade(&h, &token, &post_id, "buy", DEFAULT_TOKEN_SUPPLY + 1).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Not enough tokens available");

    let (status, _) = trade(&h, &token, &post_id, "hold", 5).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = trade(&h, &token, "no-such-post", "buy", 5).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, market) = h.send("GET", "/exchange", None, None).await;
    assert_eq!(market["posts"][0]["availableTokens"], DEFAULT_TOKEN_SUPPLY);
}

#[tokio::test]
async fn test_dividends_split_and_claim_once() {
    let h = Harness::new();
    let (author, author_token) = h.user("author@example.com");
    let (_, alice_token) = h.user("alice@example.com");
    let (_, bob_token) = h.user("bob@example.com");
    let post_id = h.post_by(&author);

    trade(&h, &alice_token, &post_id, "buy", 300).await;
    trade(&h, &bob_token, &post_id, "buy", 700).await;

    let uri = format!("/posts/{}/dividends", post_id);

    // Only the author may distribute
    let (status, _) = h
        .send("POST", &uri, Some(&alice_token), Some(json!({ "totalAmount": 10 })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = h
        .send("POST", &uri, Some(&author_token), Some(json!({ "totalAmount": 0 })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Valid total amount is required");

    let (status, body) = h
        .send("POST", &uri, Some(&author_token), Some(json!({ "totalAmount": 10 })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["totalTokens"], 1000);
    assert!((body["amountPerToken"].as_f64().unwrap() - 0.01).abs() < 1e-12);
    assert_eq!(body["distribution"]["status"], "completed");
    let distribution_id = body["distribution"]["id"].as_str().unwrap().to_string();

    let mut amounts: Vec<f64> = body["claims"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["amount"].as_f64().unwrap())
        .collect();
    amounts.sort_by(|a, b| a.partial_cmp(b).unwrap());
    assert!((amounts[0] - 3.0).abs() < 1e-9);
    assert!((amounts[1] - 7.0).abs() < 1e-9);

    let claim_uri = format!("/posts/{}/dividends/{}/claim", post_id, distribution_id);

    let (status, body) = h.send("GET", &claim_uri, Some(&alice_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["claim"]["status"], "pending");

    let (status, body) = h.send("POST", &claim_uri, Some(&alice_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["claim"]["status"], "claimed");
    assert!(body["message"].as_str().unwrap().starts_with("Successfully claimed 3"));

    let (status, body) = h.send("POST", &claim_uri, Some(&alice_token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Dividends already claimed");

    // The author holds nothing, so has no claim
    let (status, _) = h.send("POST", &claim_uri, Some(&author_token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, body) = h.send("GET", &claim_uri, Some(&author_token), None).await;
    assert!(body["claim"].is_null());

    let (_, body) = h.send("GET", &uri, None, None).await;
    assert_eq!(body["distributions"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_stale_claim_expires_on_attempt() {
    let h = Harness::new();
    let (author, _) = h.user("author@example.com");
    let (holder, holder_token) = h.user("holder@example.com");
    let post_id = h.post_by(&author);

    let distribution_id = h
        .services
        .db
        .with_conn(|conn| {
            let distributed_at = Utc::now() - Duration::days(31);
            let dist = dividends::create_distribution(conn, &post_id, 5.0, 0.05, None, distributed_at)?;
            dividends::create_claim(conn, &dist.id, &holder, 5.0, 100)?;
            Ok(dist.id)
        })
        .unwrap();

    let claim_uri = format!("/posts/{}/dividends/{}/claim", post_id, distribution_id);

    // Reads already report the effective status
    let (_, body) = h.send("GET", &claim_uri, Some(&holder_token), None).await;
    assert_eq!(body["claim"]["status"], "expired");

    let (status, body) = h.send("POST", &claim_uri, Some(&holder_token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Dividend claim has expired");

    // The expiry was persisted
    let stored = h
        .services
        .db
        .with_conn(|conn| dividends::find_claim(conn, &distribution_id, &holder))
        .unwrap()
        .unwrap();
    assert_eq!(stored.status.as_str(), "expired");
}

#[tokio::test]
async fn test_governance_vote_overwrites() {
    let h = Harness::new();
    let (author, _) = h.user("author@example.com");
    let (_, holder_token) = h.user("holder@example.com");
    let (_, small_token) = h.user("small@example.com");
    let post_id = h.post_by(&author);

    trade(&h, &holder_token, &post_id, "buy", 150).await;
    trade(&h, &small_token, &post_id, "buy", 10).await;

    let uri = format!("/posts/{}/governance", post_id);
    let proposal = json!({ "title": "Raise price", "description": "Double it", "type": "pricing" });

    let (status, body) = h.send("POST", &uri, Some(&small_token), Some(proposal.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "You need at least 100 tokens to create a proposal");

    let (status, body) = h.send("POST", &uri, Some(&holder_token), Some(proposal)).await;
    assert_eq!(status, StatusCode::CREATED);
    let proposal_id = body["id"].as_str().unwrap().to_string();

    let vote_uri = format!("{}/{}/vote", uri, proposal_id);

    let (status, _) = h
        .send("POST", &vote_uri, Some(&holder_token), Some(json!({ "vote": "maybe" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = h
        .send("POST", &vote_uri, Some(&holder_token), Some(json!({ "vote": "yes" })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["votingPower"], 150);

    let (status, _) = h
        .send("POST", &vote_uri, Some(&holder_token), Some(json!({ "vote": "no" })))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = h
        .send("POST", &vote_uri, Some(&small_token), Some(json!({ "vote": "yes" })))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = h.send("GET", &vote_uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["voterCount"], 2);
    assert_eq!(body["totals"]["no"], 150);
    assert_eq!(body["totals"]["yes"], 10);
    assert_eq!(body["totals"]["total"], 160);
    assert_eq!(body["votes"][0]["votingPower"], 150);

    let (_, body) = h.send("GET", &uri, Some(&holder_token), None).await;
    assert_eq!(body["userVotingPower"], 150);
    assert_eq!(body["proposals"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_wallet_sign_in_flow() {
    let h = Harness::new();
    let key = SigningKey::generate(&mut OsRng);
    let address = hex::encode(key.verifying_key().to_bytes());

    let (status, body) = h
        .send("GET", &format!("/auth/wallet/challenge?address={}", address), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let message = body["message"].as_str().unwrap().to_string();

    // Signature over a different message is refused
    let wrong = hex::encode(key.sign(b"something else").to_bytes());
    let (status, _) = h
        .send(
            "POST",
            "/auth/wallet",
            None,
            Some(json!({ "address": address, "message": message, "signature": wrong })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let signature = hex::encode(key.sign(message.as_bytes()).to_bytes());
    let login = json!({ "address": address, "message": message, "signature": signature });
    let (status, body) = h.send("POST", "/auth/wallet", None, Some(login.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["expiresIn"], 86_400);
    let token = body["token"].as_str().unwrap().to_string();

    // Challenges are single-use
    let (status, _) = h.send("POST", "/auth/wallet", None, Some(login)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = h.send("GET", "/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["kind"], "wallet");
    assert_eq!(body["user"]["walletAddress"], address);

    let (_, body) = h.send("GET", "/wallet/connect", Some(&token), None).await;
    assert_eq!(body["wallets"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_connect_cannot_bind_someone_elses_key() {
    let h = Harness::new();
    let (mallory, mallory_token) = h.user("mallory@example.com");
    let victim = SigningKey::generate(&mut OsRng);
    let victim_address = hex::encode(victim.verifying_key().to_bytes());

    for wallet_type in ["ed25519", "bsv"] {
        let (status, body) = h
            .send(
                "POST",
                "/wallet/connect",
                Some(&mallory_token),
                Some(json!({ "walletType": wallet_type, "address": victim_address })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "A signed challenge is required to connect this wallet");
    }

    // Mallory can fetch a challenge but cannot sign it
    let (_, message, _) = signed_challenge(&h, &victim).await;
    let forged = hex::encode(SigningKey::generate(&mut OsRng).sign(message.as_bytes()).to_bytes());
    let (status, _) = h
        .send(
            "POST",
            "/wallet/connect",
            Some(&mallory_token),
            Some(json!({
                "walletType": "ed25519",
                "address": victim_address,
                "message": message,
                "signature": forged,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = h.send("GET", "/wallet/connect", Some(&mallory_token), None).await;
    assert!(body["wallets"].as_array().unwrap().is_empty());

    // The key's owner signs in to an account of their own
    let (address, message, signature) = signed_challenge(&h, &victim).await;
    let (status, body) = h
        .send(
            "POST",
            "/auth/wallet",
            None,
            Some(json!({ "address": address, "message": message, "signature": signature })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(body["user"]["id"], mallory.as_str());
    assert_eq!(body["user"]["walletAddress"], address);
}

#[tokio::test]
async fn test_connected_key_signs_into_owning_account() {
    let h = Harness::new();
    let (alice, alice_token) = h.user("alice@example.com");
    let key = SigningKey::generate(&mut OsRng);

    let (address, message, signature) = signed_challenge(&h, &key).await;
    let connect = json!({
        "walletType": "ed25519",
        "address": address,
        "message": message,
        "signature": signature,
    });
    let (status, body) = h
        .send("POST", "/wallet/connect", Some(&alice_token), Some(connect.clone()))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["wallet"]["address"], address);

    // Replaying the same proof fails, the challenge is gone
    let (status, _) = h
        .send("POST", "/wallet/connect", Some(&alice_token), Some(connect))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (address, message, signature) = signed_challenge(&h, &key).await;
    let (status, body) = h
        .send(
            "POST",
            "/auth/wallet",
            None,
            Some(json!({ "address": address, "message": message, "signature": signature })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["id"], alice.as_str());
}

#[tokio::test]
async fn test_unreadable_bodies_are_json_400() {
    let h = Harness::new();
    let (author, token) = h.user("author@example.com");
    let post_id = h.post_by(&author);

    let (status, body) = h
        .send(
            "POST",
            "/exchange/trade",
            Some(&token),
            Some(json!({ "postId": post_id, "type": "buy", "amount": "100" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("Invalid request body"));

    let payload = json!({ "postId": post_id, "type": "buy", "amount": 100 }).to_string();
    let (status, body) = send_raw(
        &h.router,
        "POST",
        "/exchange/trade",
        Some(&token),
        None,
        Body::from(payload),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, body) = send_raw(
        &h.router,
        "POST",
        "/exchange/trade",
        Some(&token),
        Some("application/json"),
        Body::from("{\"postId\":"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let vote_uri = format!("/posts/{}/governance/some-proposal/vote", post_id);
    let (status, body) = h
        .send("POST", &vote_uri, Some(&token), Some(json!({ "vote": 1 })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    // Nothing was bought along the way
    let post = h
        .services
        .db
        .with_conn(|conn| posts::get_post(conn, &post_id))
        .unwrap()
        .unwrap();
    assert_eq!(post.available_tokens, DEFAULT_TOKEN_SUPPLY);
}

#[tokio::test]
async fn test_dev_login_and_posting() {
    let h = Harness::new();

    let (status, body) = h
        .send("POST", "/auth/dev-login", None, Some(json!({ "email": "writer@example.com" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap().to_string();

    let (status, body) = h
        .send("POST", "/posts", Some(&token), Some(json!({ "content": "x".repeat(281) })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Content too long");

    // Non-premium authors without a funded wallet cannot post
    let (status, body) = h
        .send("POST", "/posts", Some(&token), Some(json!({ "content": "hello" })))
        .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["error"], "Insufficient funds for posting");

    let (status, body) = h.send("GET", "/user/premium-status", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isPremium"], false);

    let (_, body) = h.send("GET", "/admin/status", Some(&token), None).await;
    assert_eq!(body["isAdmin"], false);
}

#[tokio::test]
async fn test_dev_login_hidden_in_production() {
    let h = Harness::with_db(Database::open_in_memory().unwrap(), false);
    let (status, _) = h
        .send("POST", "/auth/dev-login", None, Some(json!({ "email": "a@example.com" })))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_like_buys_and_unlike_refunds() {
    let h = Harness::new();
    let (author, _) = h.user("author@example.com");
    let (_, fan_token) = h.user("fan@example.com");
    let post_id = h.post_by(&author);

    let like = json!({ "postId": post_id, "action": "like" });
    let (status, body) = h.send("POST", "/posts/like", Some(&fan_token), Some(like.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tokensPurchased"], 1);

    let (status, _) = h.send("POST", "/posts/like", Some(&fan_token), Some(like)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, market) = h.send("GET", "/exchange", Some(&fan_token), None).await;
    assert_eq!(market["posts"][0]["likes"], 1);
    assert_eq!(market["posts"][0]["userTokens"], 1);

    let unlike = json!({ "postId": post_id, "action": "unlike" });
    let (status, _) = h.send("POST", "/posts/like", Some(&fan_token), Some(unlike)).await;
    assert_eq!(status, StatusCode::OK);

    let (_, market) = h.send("GET", "/exchange", Some(&fan_token), None).await;
    assert_eq!(market["posts"][0]["likes"], 0);
    assert_eq!(market["posts"][0]["availableTokens"], DEFAULT_TOKEN_SUPPLY);
}

#[tokio::test]
async fn test_file_database_survives_restart() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tokenpost.db");

    let post_id = {
        let h = Harness::with_db(Database::open(&path).unwrap(), true);
        let (author, _) = h.user("author@example.com");
        let (_, token) = h.user("buyer@example.com");
        let post_id = h.post_by(&author);
        let (status, _) = trade(&h, &token, &post_id, "buy", 42).await;
        assert_eq!(status, StatusCode::OK);
        post_id
    };

    let h = Harness::with_db(Database::open(&path).unwrap(), true);
    let (_, body) = h.send("GET", "/posts", None, None).await;
    let posts = body["posts"].as_array().unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0]["id"], post_id.as_str());
    assert_eq!(posts[0]["availableTokens"], DEFAULT_TOKEN_SUPPLY - 42);
}
