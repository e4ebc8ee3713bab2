//! Storage interface consumed by the sync core.
//!
//! The dashboard owns the relational schema; the sync job needs only a narrow
//! slice of it: find-by-key, find-first, create, and upsert per synchronized
//! entity, plus the engine's advisory-lock primitive. Keeping that slice
//! behind a trait lets the reconcilers run against Postgres in production and
//! against the in-memory implementation in tests.

pub mod memory;
pub mod postgres;

pub use memory::InMemoryStorage;
pub use postgres::PgStoreStorage;

use async_trait::async_trait;

use crate::models::{
    Brand, Category, NewBrand, NewCategory, NewOrderItem, NewReview, NewUser, Order, OrderItem,
    OrderItemPatch, OrderUpsert, Product, ProductReview, ProductUpsert, ReviewPatch, User,
};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Unique-constraint violation; racing entity resolutions end up here
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("database error: {0}")]
    Database(String),
}

#[async_trait]
pub trait StoreStorage: Send + Sync {
    async fn find_category_by_name(&self, name: &str) -> Result<Option<Category>, StorageError>;
    async fn create_category(&self, category: NewCategory) -> Result<Category, StorageError>;

    async fn find_brand_by_name(&self, name: &str) -> Result<Option<Brand>, StorageError>;
    async fn create_brand(&self, brand: NewBrand) -> Result<Brand, StorageError>;

    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, StorageError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StorageError>;
    async fn create_user(&self, user: NewUser) -> Result<User, StorageError>;

    async fn find_product_by_id(&self, id: i64) -> Result<Option<Product>, StorageError>;
    /// Create-or-update keyed by the external product id; sku and slug are
    /// written on create only.
    async fn upsert_product(&self, product: ProductUpsert) -> Result<Product, StorageError>;

    /// First review for (product, user). The pair has no unique index, so a
    /// concurrent writer can still insert between this lookup and a create.
    async fn find_review_by_product_and_user(
        &self,
        product_id: i64,
        user_id: &str,
    ) -> Result<Option<ProductReview>, StorageError>;
    async fn create_review(&self, review: NewReview) -> Result<ProductReview, StorageError>;
    async fn update_review(&self, id: i64, patch: ReviewPatch) -> Result<(), StorageError>;

    /// Create-or-update keyed by the external order id; order_number is
    /// written on create only, and a NULL user_id or status in the payload
    /// keeps whatever the row already holds.
    async fn upsert_order(&self, order: OrderUpsert) -> Result<Order, StorageError>;

    /// First item for (order, product); same find-first caveat as reviews.
    async fn find_order_item(
        &self,
        order_id: i64,
        product_id: i64,
    ) -> Result<Option<OrderItem>, StorageError>;
    async fn create_order_item(&self, item: NewOrderItem) -> Result<OrderItem, StorageError>;
    async fn update_order_item(&self, id: i64, patch: OrderItemPatch)
        -> Result<(), StorageError>;

    /// Non-blocking engine-level lock; true when this session now holds it.
    async fn try_advisory_lock(&self, key: i64) -> Result<bool, StorageError>;
    /// Release a lock taken by this session; releasing an unheld key is a no-op.
    async fn advisory_unlock(&self, key: i64) -> Result<(), StorageError>;
}
