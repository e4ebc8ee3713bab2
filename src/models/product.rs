use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Product {
    pub id: i64,      // external product id, no autoincrement
    pub sku: String,  // unique, written on create only
    pub slug: String, // unique, written on create only
    pub name: String,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub rating: Option<f64>,
    pub category_id: Option<i64>,
    pub brand_id: Option<i64>,
    pub synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Field set the sync writes for a product. On an existing row only the
/// mutable fields apply; sku and slug stay whatever the create produced.
#[derive(Debug, Clone)]
pub struct ProductUpsert {
    pub id: i64,
    pub sku: String,
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub rating: Option<f64>,
    pub category_id: Option<i64>,
    pub brand_id: Option<i64>,
    pub synced_at: DateTime<Utc>,
}
