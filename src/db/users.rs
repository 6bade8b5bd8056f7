//! User and subscription CRUD operations

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use super::new_id;
use crate::error::AppError;

/// User row from database
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRow {
    pub id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub username: String,
    pub image: Option<String>,
    pub is_admin: bool,
    pub is_premium: bool,
    pub wallet_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl UserRow {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            email: row.get("email")?,
            name: row.get("name")?,
            username: row.get("username")?,
            image: row.get("image")?,
            is_admin: row.get("is_admin")?,
            is_premium: row.get("is_premium")?,
            wallet_address: row.get("wallet_address")?,
            created_at: row.get("created_at")?,
        })
    }

    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            username: self.username.clone(),
            image: self.image.clone(),
            is_premium: self.is_premium,
        }
    }
}

/// Public author/holder card embedded in other responses
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    pub name: Option<String>,
    pub username: String,
    pub image: Option<String>,
    pub is_premium: bool,
}

/// Columns selected for an embedded [`UserSummary`], prefixed with `u.`
pub const SUMMARY_COLUMNS: &str =
    "u.id AS u_id, u.name AS u_name, u.username AS u_username, u.image AS u_image, u.is_premium AS u_is_premium";

impl UserSummary {
    /// Read the aliased summary columns of [`SUMMARY_COLUMNS`]
    pub fn from_aliased(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("u_id")?,
            name: row.get("u_name")?,
            username: row.get("u_username")?,
            image: row.get("u_image")?,
            is_premium: row.get("u_is_premium")?,
        })
    }
}

/// Input for creating a user
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub email: Option<String>,
    pub name: Option<String>,
    pub username: String,
    pub image: Option<String>,
    pub is_admin: bool,
    pub is_premium: bool,
    pub wallet_address: Option<String>,
}

impl NewUser {
    /// A user signing in through the social provider
    pub fn social(email: &str, name: Option<&str>) -> Self {
        Self {
            email: Some(email.to_string()),
            name: name.map(str::to_string),
            username: username_from(email, name),
            ..Default::default()
        }
    }

    /// A user signing in with a wallet key
    pub fn wallet(address: &str) -> Self {
        let short: String = address.chars().take(8).collect();
        Self {
            username: format!("wallet_{}", short.to_lowercase()),
            wallet_address: Some(address.to_string()),
            ..Default::default()
        }
    }
}

/// Local part of the email, else the name with whitespace removed
pub fn username_from(email: &str, name: Option<&str>) -> String {
    match email.split('@').next().filter(|s| !s.is_empty()) {
        Some(local) => local.to_string(),
        None => name
            .map(|n| n.to_lowercase().split_whitespace().collect::<String>())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "user".to_string()),
    }
}

pub fn create_user(conn: &Connection, input: &NewUser) -> Result<UserRow, AppError> {
    let id = new_id();
    let now = Utc::now();

    conn.execute(
        "INSERT INTO users (id, email, name, username, image, is_admin, is_premium, wallet_address, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            id,
            input.email,
            input.name,
            input.username,
            input.image,
            input.is_admin,
            input.is_premium,
            input.wallet_address,
            now,
        ],
    )?;

    get_user(conn, &id)?.ok_or_else(|| AppError::Internal("User vanished after insert".into()))
}

pub fn get_user(conn: &Connection, id: &str) -> Result<Option<UserRow>, AppError> {
    Ok(conn
        .query_row("SELECT * FROM users WHERE id = ?1", params![id], UserRow::from_row)
        .optional()?)
}

pub fn get_user_by_email(conn: &Connection, email: &str) -> Result<Option<UserRow>, AppError> {
    Ok(conn
        .query_row("SELECT * FROM users WHERE email = ?1", params![email], UserRow::from_row)
        .optional()?)
}

pub fn get_user_by_wallet_address(
    conn: &Connection,
    address: &str,
) -> Result<Option<UserRow>, AppError> {
    Ok(conn
        .query_row(
            "SELECT * FROM users WHERE wallet_address = ?1",
            params![address],
            UserRow::from_row,
        )
        .optional()?)
}

/// Find a user by email or create it
pub fn upsert_social_user(
    conn: &Connection,
    email: &str,
    name: Option<&str>,
) -> Result<UserRow, AppError> {
    match get_user_by_email(conn, email)? {
        Some(user) => Ok(user),
        None => create_user(conn, &NewUser::social(email, name)),
    }
}

/// Subscription row backing premium status
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionRow {
    pub user_id: String,
    pub status: String,
    pub current_period_end: DateTime<Utc>,
}

impl SubscriptionRow {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.status == "active" && self.current_period_end > now
    }
}

pub fn get_subscription(conn: &Connection, user_id: &str) -> Result<Option<SubscriptionRow>, AppError> {
    Ok(conn
        .query_row(
            "SELECT user_id, status, current_period_end FROM subscriptions WHERE user_id = ?1",
            params![user_id],
            |row| {
                Ok(SubscriptionRow {
                    user_id: row.get(0)?,
                    status: row.get(1)?,
                    current_period_end: row.get(2)?,
                })
            },
        )
        .optional()?)
}

pub fn upsert_subscription(
    conn: &Connection,
    user_id: &str,
    status: &str,
    current_period_end: DateTime<Utc>,
) -> Result<(), AppError> {
    conn.execute(
        "INSERT INTO subscriptions (user_id, status, current_period_end) VALUES (?1, ?2, ?3)
         ON CONFLICT(user_id) DO UPDATE SET status = excluded.status,
             current_period_end = excluded.current_period_end",
        params![user_id, status, current_period_end],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use chrono::Duration;

    #[test]
    fn test_username_derivation() {
        assert_eq!(username_from("alice@example.com", None), "alice");
        assert_eq!(username_from("@example.com", Some("Bob Smith")), "bobsmith");
        assert_eq!(username_from("", None), "user");
    }

    #[test]
    fn test_upsert_social_user_is_stable() {
        let db = Database::open_in_memory().unwrap();
        let (a, b) = db
            .with_conn(|conn| {
                let a = upsert_social_user(conn, "carol@example.com", Some("Carol"))?;
                let b = upsert_social_user(conn, "carol@example.com", None)?;
                Ok((a, b))
            })
            .unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(a.username, "carol");
    }

    #[test]
    fn test_wallet_user_lookup() {
        let db = Database::open_in_memory().unwrap();
        let found = db
            .with_conn(|conn| {
                create_user(conn, &NewUser::wallet("ABCDEF0123456789"))?;
                get_user_by_wallet_address(conn, "ABCDEF0123456789")
            })
            .unwrap()
            .unwrap();
        assert_eq!(found.username, "wallet_abcdef01");
    }

    #[test]
    fn test_subscription_activity() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        let sub = db
            .with_conn(|conn| {
                let user = create_user(conn, &NewUser::social("d@e.f", None))?;
                upsert_subscription(conn, &user.id, "active", now + Duration::days(3))?;
                get_subscription(conn, &user.id)
            })
            .unwrap()
            .unwrap();
        assert!(sub.is_active(now));
        assert!(!sub.is_active(now + Duration::days(4)));
    }
}
