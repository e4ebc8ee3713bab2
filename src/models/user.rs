use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,    // unique
    pub username: String, // unique
    pub password_hash: String,
    pub name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    // Explicit id on the order path so the external customer id becomes the
    // primary key; None lets storage assign one.
    pub id: Option<i64>,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub name: String,
    pub is_active: bool,
}

impl NewUser {
    /// Placeholder account for an order whose customer id is not in storage yet.
    pub fn external_order(user_id: i64) -> Self {
        Self {
            id: Some(user_id),
            email: format!("external-order-{user_id}@example.com"),
            username: format!("external_order_{user_id}"),
            password_hash: String::new(),
            name: format!("External User {user_id}"),
            is_active: true,
        }
    }

    /// Placeholder account for a review author. Review users never reuse the
    /// external id; the timestamp in the username keeps retries unique.
    pub fn external_reviewer(user_id: i64) -> Self {
        Self {
            id: None,
            email: review_user_email(user_id),
            username: format!("external_{}_{}", user_id, Utc::now().timestamp_millis()),
            password_hash: String::new(),
            name: format!("External User {user_id}"),
            is_active: false,
        }
    }
}

/// Review authors are looked up by this synthetic address, not by id.
pub fn review_user_email(user_id: i64) -> String {
    format!("external+{user_id}@example.com")
}
