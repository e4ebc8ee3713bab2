//! In-memory storage backing the test suites.
//!
//! Semantics mirror the Postgres implementation: the same uniqueness rules,
//! the same find-first ordering (ascending id), the same keep-prior handling
//! of absent order fields. A call log records every storage touch so tests
//! can assert what a code path did or did not reach.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;

use super::{StorageError, StoreStorage};
use crate::models::{
    Brand, Category, NewBrand, NewCategory, NewOrderItem, NewReview, NewUser, Order, OrderItem,
    OrderItemPatch, OrderUpsert, Product, ProductReview, ProductUpsert, ReviewPatch, User,
};

#[derive(Default)]
struct State {
    categories: Vec<Category>,
    brands: Vec<Brand>,
    users: Vec<User>,
    products: Vec<Product>,
    reviews: Vec<ProductReview>,
    orders: Vec<Order>,
    order_items: Vec<OrderItem>,
    held_locks: HashSet<i64>,
    next_category_id: i64,
    next_brand_id: i64,
    next_user_id: i64,
    next_review_id: i64,
    next_item_id: i64,
    calls: Vec<&'static str>,
    fail_next_user_create: bool,
}

pub struct InMemoryStorage {
    state: Mutex<State>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                next_category_id: 1,
                next_brand_id: 1,
                next_user_id: 1,
                next_review_id: 1,
                next_item_id: 1,
                ..State::default()
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("in-memory storage state poisoned")
    }

    /// Names of every trait method invoked so far, in call order.
    pub fn recorded_calls(&self) -> Vec<&'static str> {
        self.state().calls.clone()
    }

    /// Make the next create_user return a conflict while still writing the
    /// row, emulating a concurrent writer winning the insert race.
    pub fn fail_next_user_create(&self) {
        self.state().fail_next_user_create = true;
    }

    pub fn categories(&self) -> Vec<Category> {
        self.state().categories.clone()
    }

    pub fn brands(&self) -> Vec<Brand> {
        self.state().brands.clone()
    }

    pub fn users(&self) -> Vec<User> {
        self.state().users.clone()
    }

    pub fn products(&self) -> Vec<Product> {
        self.state().products.clone()
    }

    pub fn reviews(&self) -> Vec<ProductReview> {
        self.state().reviews.clone()
    }

    pub fn orders(&self) -> Vec<Order> {
        self.state().orders.clone()
    }

    pub fn order_items(&self) -> Vec<OrderItem> {
        self.state().order_items.clone()
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StoreStorage for InMemoryStorage {
    async fn find_category_by_name(&self, name: &str) -> Result<Option<Category>, StorageError> {
        let mut state = self.state();
        state.calls.push("find_category_by_name");
        Ok(state.categories.iter().find(|c| c.name == name).cloned())
    }

    async fn create_category(&self, category: NewCategory) -> Result<Category, StorageError> {
        let mut state = self.state();
        state.calls.push("create_category");
        if state.categories.iter().any(|c| c.name == category.name) {
            return Err(StorageError::Conflict(format!(
                "category name {} already exists",
                category.name
            )));
        }
        let now = Utc::now();
        let row = Category {
            id: state.next_category_id,
            name: category.name,
            slug: category.slug,
            created_at: now,
            updated_at: now,
        };
        state.next_category_id += 1;
        state.categories.push(row.clone());
        Ok(row)
    }

    async fn find_brand_by_name(&self, name: &str) -> Result<Option<Brand>, StorageError> {
        let mut state = self.state();
        state.calls.push("find_brand_by_name");
        Ok(state.brands.iter().find(|b| b.name == name).cloned())
    }

    async fn create_brand(&self, brand: NewBrand) -> Result<Brand, StorageError> {
        let mut state = self.state();
        state.calls.push("create_brand");
        if state.brands.iter().any(|b| b.name == brand.name) {
            return Err(StorageError::Conflict(format!(
                "brand name {} already exists",
                brand.name
            )));
        }
        let now = Utc::now();
        let row = Brand {
            id: state.next_brand_id,
            name: brand.name,
            slug: brand.slug,
            created_at: now,
            updated_at: now,
        };
        state.next_brand_id += 1;
        state.brands.push(row.clone());
        Ok(row)
    }

    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, StorageError> {
        let mut state = self.state();
        state.calls.push("find_user_by_id");
        Ok(state.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StorageError> {
        let mut state = self.state();
        state.calls.push("find_user_by_email");
        Ok(state.users.iter().find(|u| u.email == email).cloned())
    }

    async fn create_user(&self, user: NewUser) -> Result<User, StorageError> {
        let mut state = self.state();
        state.calls.push("create_user");
        if let Some(id) = user.id {
            if state.users.iter().any(|u| u.id == id) {
                return Err(StorageError::Conflict(format!("user id {} already exists", id)));
            }
        }
        if state.users.iter().any(|u| u.email == user.email) {
            return Err(StorageError::Conflict(format!(
                "user email {} already exists",
                user.email
            )));
        }
        if state.users.iter().any(|u| u.username == user.username) {
            return Err(StorageError::Conflict(format!(
                "username {} already exists",
                user.username
            )));
        }

        let id = match user.id {
            Some(id) => id,
            None => state.next_user_id,
        };
        // keep the sequence ahead of explicitly supplied ids
        state.next_user_id = state.next_user_id.max(id + 1);

        let now = Utc::now();
        let row = User {
            id,
            email: user.email,
            username: user.username,
            password_hash: user.password_hash,
            name: user.name,
            is_active: user.is_active,
            created_at: now,
            updated_at: now,
        };
        state.users.push(row.clone());

        if state.fail_next_user_create {
            state.fail_next_user_create = false;
            return Err(StorageError::Conflict(
                "user creation lost a concurrent race".to_string(),
            ));
        }
        Ok(row)
    }

    async fn find_product_by_id(&self, id: i64) -> Result<Option<Product>, StorageError> {
        let mut state = self.state();
        state.calls.push("find_product_by_id");
        Ok(state.products.iter().find(|p| p.id == id).cloned())
    }

    async fn upsert_product(&self, product: ProductUpsert) -> Result<Product, StorageError> {
        let mut state = self.state();
        state.calls.push("upsert_product");
        let now = Utc::now();

        if let Some(existing) = state.products.iter_mut().find(|p| p.id == product.id) {
            existing.name = product.name;
            existing.description = product.description;
            existing.price = product.price;
            existing.rating = product.rating;
            existing.category_id = product.category_id;
            existing.brand_id = product.brand_id;
            existing.synced_at = Some(product.synced_at);
            existing.updated_at = now;
            // sku and slug keep their create-time values
            return Ok(existing.clone());
        }

        if state
            .products
            .iter()
            .any(|p| p.sku == product.sku || p.slug == product.slug)
        {
            return Err(StorageError::Conflict(format!(
                "product sku {} or slug {} already exists",
                product.sku, product.slug
            )));
        }

        let row = Product {
            id: product.id,
            sku: product.sku,
            slug: product.slug,
            name: product.name,
            description: product.description,
            price: product.price,
            rating: product.rating,
            category_id: product.category_id,
            brand_id: product.brand_id,
            synced_at: Some(product.synced_at),
            created_at: now,
            updated_at: now,
        };
        state.products.push(row.clone());
        Ok(row)
    }

    async fn find_review_by_product_and_user(
        &self,
        product_id: i64,
        user_id: &str,
    ) -> Result<Option<ProductReview>, StorageError> {
        let mut state = self.state();
        state.calls.push("find_review_by_product_and_user");
        Ok(state
            .reviews
            .iter()
            .find(|r| r.product_id == product_id && r.user_id == user_id)
            .cloned())
    }

    async fn create_review(&self, review: NewReview) -> Result<ProductReview, StorageError> {
        let mut state = self.state();
        state.calls.push("create_review");
        let now = Utc::now();
        let row = ProductReview {
            id: state.next_review_id,
            product_id: review.product_id,
            user_id: review.user_id,
            rating: review.rating,
            comment: review.comment,
            synced_at: Some(review.synced_at),
            created_at: now,
            updated_at: now,
        };
        state.next_review_id += 1;
        state.reviews.push(row.clone());
        Ok(row)
    }

    async fn update_review(&self, id: i64, patch: ReviewPatch) -> Result<(), StorageError> {
        let mut state = self.state();
        state.calls.push("update_review");
        if let Some(review) = state.reviews.iter_mut().find(|r| r.id == id) {
            review.rating = patch.rating;
            review.comment = patch.comment;
            review.synced_at = Some(patch.synced_at);
            review.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn upsert_order(&self, order: OrderUpsert) -> Result<Order, StorageError> {
        let mut state = self.state();
        state.calls.push("upsert_order");
        let now = Utc::now();

        if let Some(existing) = state.orders.iter_mut().find(|o| o.id == order.id) {
            // absent user/status keep the stored value
            if order.user_id.is_some() {
                existing.user_id = order.user_id;
            }
            if order.status.is_some() {
                existing.status = order.status;
            }
            existing.subtotal = order.subtotal;
            existing.grand_total = order.grand_total;
            existing.synced_at = Some(order.synced_at);
            existing.updated_at = now;
            return Ok(existing.clone());
        }

        let row = Order {
            id: order.id,
            order_number: order.order_number,
            user_id: order.user_id,
            status: order.status,
            subtotal: order.subtotal,
            grand_total: order.grand_total,
            synced_at: Some(order.synced_at),
            created_at: now,
            updated_at: now,
        };
        state.orders.push(row.clone());
        Ok(row)
    }

    async fn find_order_item(
        &self,
        order_id: i64,
        product_id: i64,
    ) -> Result<Option<OrderItem>, StorageError> {
        let mut state = self.state();
        state.calls.push("find_order_item");
        Ok(state
            .order_items
            .iter()
            .find(|i| i.order_id == order_id && i.product_id == product_id)
            .cloned())
    }

    async fn create_order_item(&self, item: NewOrderItem) -> Result<OrderItem, StorageError> {
        let mut state = self.state();
        state.calls.push("create_order_item");
        let now = Utc::now();
        let row = OrderItem {
            id: state.next_item_id,
            order_id: item.order_id,
            product_id: item.product_id,
            sku: item.sku,
            name: item.name,
            quantity: item.quantity,
            unit_price: item.unit_price,
            total_price: item.total_price,
            synced_at: Some(item.synced_at),
            created_at: now,
            updated_at: now,
        };
        state.next_item_id += 1;
        state.order_items.push(row.clone());
        Ok(row)
    }

    async fn update_order_item(
        &self,
        id: i64,
        patch: OrderItemPatch,
    ) -> Result<(), StorageError> {
        let mut state = self.state();
        state.calls.push("update_order_item");
        if let Some(item) = state.order_items.iter_mut().find(|i| i.id == id) {
            item.quantity = patch.quantity;
            item.unit_price = patch.unit_price;
            item.total_price = patch.total_price;
            item.synced_at = Some(patch.synced_at);
            item.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn try_advisory_lock(&self, key: i64) -> Result<bool, StorageError> {
        let mut state = self.state();
        state.calls.push("try_advisory_lock");
        // every caller counts as its own session, so re-acquiring is a miss
        Ok(state.held_locks.insert(key))
    }

    async fn advisory_unlock(&self, key: i64) -> Result<(), StorageError> {
        let mut state = self.state();
        state.calls.push("advisory_unlock");
        state.held_locks.remove(&key);
        Ok(())
    }
}
