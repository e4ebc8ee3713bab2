use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProductReview {
    pub id: i64,
    pub product_id: i64,
    // Internal user id rendered as text, or the raw external identifier when
    // resolution did not produce an account. (product_id, user_id) carries no
    // unique index; lookups are find-first.
    pub user_id: String,
    pub rating: f64,
    pub comment: Option<String>,
    pub synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewReview {
    pub product_id: i64,
    pub user_id: String,
    pub rating: f64,
    pub comment: Option<String>,
    pub synced_at: DateTime<Utc>,
}

/// Mutable review fields refreshed on every sync.
#[derive(Debug, Clone)]
pub struct ReviewPatch {
    pub rating: f64,
    pub comment: Option<String>,
    pub synced_at: DateTime<Utc>,
}
