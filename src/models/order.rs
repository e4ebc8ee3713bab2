use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of order states the dashboard understands. Feed values outside
/// this set are dropped rather than stored.
#[derive(sqlx::Type, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "varchar")]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Case-sensitive parse against the closed set.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Pending" => Some(Self::Pending),
            "Processing" => Some(Self::Processing),
            "Shipped" => Some(Self::Shipped),
            "Delivered" => Some(Self::Delivered),
            "Cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Processing => "Processing",
            Self::Shipped => "Shipped",
            Self::Delivered => "Delivered",
            Self::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Order {
    pub id: i64,              // external order id, no autoincrement
    pub order_number: String, // ORD-<id>, written on create only
    pub user_id: Option<i64>,
    pub status: Option<OrderStatus>,
    // The feed carries a single total, mirrored into both columns.
    pub subtotal: f64,
    pub grand_total: f64,
    pub synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Field set the sync writes for an order. A None user_id or status leaves
/// the stored value untouched on update instead of clearing it.
#[derive(Debug, Clone)]
pub struct OrderUpsert {
    pub id: i64,
    pub order_number: String,
    pub user_id: Option<i64>,
    pub status: Option<OrderStatus>,
    pub subtotal: f64,
    pub grand_total: f64,
    pub synced_at: DateTime<Utc>,
}
