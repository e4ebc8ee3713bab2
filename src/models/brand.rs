use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Brand {
    pub id: i64,
    pub name: String, // natural key, resolved by exact match on the trimmed name
    pub slug: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewBrand {
    pub name: String,
    pub slug: String,
}
