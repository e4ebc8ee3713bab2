use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    // (order_id, product_id) carries no unique index; lookups are find-first.
    pub product_id: i64,
    pub sku: String,  // product snapshot taken at creation
    pub name: String, // product snapshot taken at creation
    pub quantity: i64,
    pub unit_price: f64, // current product price at reconciliation time
    pub total_price: f64,
    pub synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub order_id: i64,
    pub product_id: i64,
    pub sku: String,
    pub name: String,
    pub quantity: i64,
    pub unit_price: f64,
    pub total_price: f64,
    pub synced_at: DateTime<Utc>,
}

/// Mutable item fields refreshed on every sync; the sku/name snapshot stays.
#[derive(Debug, Clone)]
pub struct OrderItemPatch {
    pub quantity: i64,
    pub unit_price: f64,
    pub total_price: f64,
    pub synced_at: DateTime<Utc>,
}
