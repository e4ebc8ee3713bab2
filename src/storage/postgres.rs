//! Postgres-backed storage, the production implementation.
//!
//! All writes are single-statement upserts or inserts so the advisory lock
//! stays the only cross-statement coordination the job needs.

use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::{PgPool, Postgres};
use tokio::sync::Mutex;
use tracing::Instrument;

use super::{StorageError, StoreStorage};
use crate::models::{
    Brand, Category, NewBrand, NewCategory, NewOrderItem, NewReview, NewUser, Order, OrderItem,
    OrderItemPatch, OrderUpsert, Product, ProductReview, ProductUpsert, ReviewPatch, User,
};

const PG_UNIQUE_VIOLATION: &str = "23505";

pub struct PgStoreStorage {
    pool: PgPool,
    // Advisory locks are session scoped: the connection that acquired the
    // lock must also release it, so it stays pinned here while held.
    lock_conn: Mutex<Option<PoolConnection<Postgres>>>,
}

impl PgStoreStorage {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            lock_conn: Mutex::new(None),
        }
    }
}

fn map_sqlx_err(err: sqlx::Error) -> StorageError {
    match &err {
        sqlx::Error::Database(db) if db.code().as_deref() == Some(PG_UNIQUE_VIOLATION) => {
            StorageError::Conflict(db.message().to_string())
        }
        _ => StorageError::Database(err.to_string()),
    }
}

#[async_trait]
impl StoreStorage for PgStoreStorage {
    async fn find_category_by_name(&self, name: &str) -> Result<Option<Category>, StorageError> {
        let query_span = tracing::info_span!("Fetch category by name.");
        sqlx::query_as::<_, Category>(
            r#"SELECT * FROM store_category WHERE name = $1 LIMIT 1"#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .instrument(query_span)
        .await
        .map_err(|err| {
            tracing::error!("Failed to execute fetch query: {:?}", err);
            map_sqlx_err(err)
        })
    }

    async fn create_category(&self, category: NewCategory) -> Result<Category, StorageError> {
        let query_span = tracing::info_span!("Saving new category into the database.");
        sqlx::query_as::<_, Category>(
            r#"
            INSERT INTO store_category (name, slug, created_at, updated_at)
            VALUES ($1, $2, now(), now())
            RETURNING *
            "#,
        )
        .bind(&category.name)
        .bind(&category.slug)
        .fetch_one(&self.pool)
        .instrument(query_span)
        .await
        .map_err(|err| {
            tracing::error!("Failed to execute insert query: {:?}", err);
            map_sqlx_err(err)
        })
    }

    async fn find_brand_by_name(&self, name: &str) -> Result<Option<Brand>, StorageError> {
        let query_span = tracing::info_span!("Fetch brand by name.");
        sqlx::query_as::<_, Brand>(r#"SELECT * FROM store_brand WHERE name = $1 LIMIT 1"#)
            .bind(name)
            .fetch_optional(&self.pool)
            .instrument(query_span)
            .await
            .map_err(|err| {
                tracing::error!("Failed to execute fetch query: {:?}", err);
                map_sqlx_err(err)
            })
    }

    async fn create_brand(&self, brand: NewBrand) -> Result<Brand, StorageError> {
        let query_span = tracing::info_span!("Saving new brand into the database.");
        sqlx::query_as::<_, Brand>(
            r#"
            INSERT INTO store_brand (name, slug, created_at, updated_at)
            VALUES ($1, $2, now(), now())
            RETURNING *
            "#,
        )
        .bind(&brand.name)
        .bind(&brand.slug)
        .fetch_one(&self.pool)
        .instrument(query_span)
        .await
        .map_err(|err| {
            tracing::error!("Failed to execute insert query: {:?}", err);
            map_sqlx_err(err)
        })
    }

    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, StorageError> {
        let query_span = tracing::info_span!("Fetch user by id.");
        sqlx::query_as::<_, User>(r#"SELECT * FROM store_user WHERE id = $1 LIMIT 1"#)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(query_span)
            .await
            .map_err(|err| {
                tracing::error!("Failed to execute fetch query: {:?}", err);
                map_sqlx_err(err)
            })
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StorageError> {
        let query_span = tracing::info_span!("Fetch user by email.");
        sqlx::query_as::<_, User>(r#"SELECT * FROM store_user WHERE email = $1 LIMIT 1"#)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(query_span)
            .await
            .map_err(|err| {
                tracing::error!("Failed to execute fetch query: {:?}", err);
                map_sqlx_err(err)
            })
    }

    async fn create_user(&self, user: NewUser) -> Result<User, StorageError> {
        let query_span = tracing::info_span!("Saving new user into the database.");
        // The order path carries the external id into the primary key, the
        // review path lets the sequence assign one.
        let query = match user.id {
            Some(_) => {
                r#"
                INSERT INTO store_user
                    (id, email, username, password_hash, name, is_active, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, now(), now())
                RETURNING *
                "#
            }
            None => {
                r#"
                INSERT INTO store_user
                    (email, username, password_hash, name, is_active, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, now(), now())
                RETURNING *
                "#
            }
        };

        let mut insert = sqlx::query_as::<_, User>(query);
        if let Some(id) = user.id {
            insert = insert.bind(id);
        }

        insert
            .bind(&user.email)
            .bind(&user.username)
            .bind(&user.password_hash)
            .bind(&user.name)
            .bind(user.is_active)
            .fetch_one(&self.pool)
            .instrument(query_span)
            .await
            .map_err(|err| {
                tracing::error!("Failed to execute insert query: {:?}", err);
                map_sqlx_err(err)
            })
    }

    async fn find_product_by_id(&self, id: i64) -> Result<Option<Product>, StorageError> {
        let query_span = tracing::info_span!("Fetch product by id.");
        sqlx::query_as::<_, Product>(r#"SELECT * FROM store_product WHERE id = $1 LIMIT 1"#)
            .bind(id)
            .fetch_optional(&self.pool)
            .instrument(query_span)
            .await
            .map_err(|err| {
                tracing::error!("Failed to execute fetch query: {:?}", err);
                map_sqlx_err(err)
            })
    }

    async fn upsert_product(&self, product: ProductUpsert) -> Result<Product, StorageError> {
        let query_span = tracing::info_span!("Upserting product.", product_id = product.id);
        sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO store_product
                (id, sku, slug, name, description, price, rating,
                 category_id, brand_id, synced_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, now(), now())
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name,
                description = EXCLUDED.description,
                price = EXCLUDED.price,
                rating = EXCLUDED.rating,
                category_id = EXCLUDED.category_id,
                brand_id = EXCLUDED.brand_id,
                synced_at = EXCLUDED.synced_at,
                updated_at = now()
            RETURNING *
            "#,
        )
        .bind(product.id)
        .bind(&product.sku)
        .bind(&product.slug)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(product.rating)
        .bind(product.category_id)
        .bind(product.brand_id)
        .bind(product.synced_at)
        .fetch_one(&self.pool)
        .instrument(query_span)
        .await
        .map_err(|err| {
            tracing::error!("Failed to execute upsert query: {:?}", err);
            map_sqlx_err(err)
        })
    }

    async fn find_review_by_product_and_user(
        &self,
        product_id: i64,
        user_id: &str,
    ) -> Result<Option<ProductReview>, StorageError> {
        let query_span = tracing::info_span!("Fetch review by product and user.");
        sqlx::query_as::<_, ProductReview>(
            r#"
            SELECT * FROM store_product_review
            WHERE product_id = $1 AND user_id = $2
            ORDER BY id
            LIMIT 1
            "#,
        )
        .bind(product_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .instrument(query_span)
        .await
        .map_err(|err| {
            tracing::error!("Failed to execute fetch query: {:?}", err);
            map_sqlx_err(err)
        })
    }

    async fn create_review(&self, review: NewReview) -> Result<ProductReview, StorageError> {
        let query_span = tracing::info_span!("Saving new review into the database.");
        sqlx::query_as::<_, ProductReview>(
            r#"
            INSERT INTO store_product_review
                (product_id, user_id, rating, comment, synced_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, now(), now())
            RETURNING *
            "#,
        )
        .bind(review.product_id)
        .bind(&review.user_id)
        .bind(review.rating)
        .bind(&review.comment)
        .bind(review.synced_at)
        .fetch_one(&self.pool)
        .instrument(query_span)
        .await
        .map_err(|err| {
            tracing::error!("Failed to execute insert query: {:?}", err);
            map_sqlx_err(err)
        })
    }

    async fn update_review(&self, id: i64, patch: ReviewPatch) -> Result<(), StorageError> {
        let query_span = tracing::info_span!("Updating review.", review_id = id);
        sqlx::query(
            r#"
            UPDATE store_product_review
            SET rating = $2, comment = $3, synced_at = $4, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(patch.rating)
        .bind(&patch.comment)
        .bind(patch.synced_at)
        .execute(&self.pool)
        .instrument(query_span)
        .await
        .map(|_| ())
        .map_err(|err| {
            tracing::error!("Failed to execute update query: {:?}", err);
            map_sqlx_err(err)
        })
    }

    async fn upsert_order(&self, order: OrderUpsert) -> Result<Order, StorageError> {
        let query_span = tracing::info_span!("Upserting order.", order_id = order.id);
        // COALESCE keeps the stored user_id/status when the payload carries
        // none, mirroring create-vs-update asymmetry in a single statement.
        sqlx::query_as::<_, Order>(
            r#"
            INSERT INTO store_order
                (id, order_number, user_id, status, subtotal, grand_total,
                 synced_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, now(), now())
            ON CONFLICT (id) DO UPDATE
            SET user_id = COALESCE(EXCLUDED.user_id, store_order.user_id),
                status = COALESCE(EXCLUDED.status, store_order.status),
                subtotal = EXCLUDED.subtotal,
                grand_total = EXCLUDED.grand_total,
                synced_at = EXCLUDED.synced_at,
                updated_at = now()
            RETURNING *
            "#,
        )
        .bind(order.id)
        .bind(&order.order_number)
        .bind(order.user_id)
        .bind(order.status)
        .bind(order.subtotal)
        .bind(order.grand_total)
        .bind(order.synced_at)
        .fetch_one(&self.pool)
        .instrument(query_span)
        .await
        .map_err(|err| {
            tracing::error!("Failed to execute upsert query: {:?}", err);
            map_sqlx_err(err)
        })
    }

    async fn find_order_item(
        &self,
        order_id: i64,
        product_id: i64,
    ) -> Result<Option<OrderItem>, StorageError> {
        let query_span = tracing::info_span!("Fetch order item by order and product.");
        sqlx::query_as::<_, OrderItem>(
            r#"
            SELECT * FROM store_order_item
            WHERE order_id = $1 AND product_id = $2
            ORDER BY id
            LIMIT 1
            "#,
        )
        .bind(order_id)
        .bind(product_id)
        .fetch_optional(&self.pool)
        .instrument(query_span)
        .await
        .map_err(|err| {
            tracing::error!("Failed to execute fetch query: {:?}", err);
            map_sqlx_err(err)
        })
    }

    async fn create_order_item(&self, item: NewOrderItem) -> Result<OrderItem, StorageError> {
        let query_span = tracing::info_span!("Saving new order item into the database.");
        sqlx::query_as::<_, OrderItem>(
            r#"
            INSERT INTO store_order_item
                (order_id, product_id, sku, name, quantity, unit_price,
                 total_price, synced_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, now(), now())
            RETURNING *
            "#,
        )
        .bind(item.order_id)
        .bind(item.product_id)
        .bind(&item.sku)
        .bind(&item.name)
        .bind(item.quantity)
        .bind(item.unit_price)
        .bind(item.total_price)
        .bind(item.synced_at)
        .fetch_one(&self.pool)
        .instrument(query_span)
        .await
        .map_err(|err| {
            tracing::error!("Failed to execute insert query: {:?}", err);
            map_sqlx_err(err)
        })
    }

    async fn update_order_item(
        &self,
        id: i64,
        patch: OrderItemPatch,
    ) -> Result<(), StorageError> {
        let query_span = tracing::info_span!("Updating order item.", item_id = id);
        sqlx::query(
            r#"
            UPDATE store_order_item
            SET quantity = $2, unit_price = $3, total_price = $4,
                synced_at = $5, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(patch.quantity)
        .bind(patch.unit_price)
        .bind(patch.total_price)
        .bind(patch.synced_at)
        .execute(&self.pool)
        .instrument(query_span)
        .await
        .map(|_| ())
        .map_err(|err| {
            tracing::error!("Failed to execute update query: {:?}", err);
            map_sqlx_err(err)
        })
    }

    async fn try_advisory_lock(&self, key: i64) -> Result<bool, StorageError> {
        let query_span = tracing::info_span!("Acquiring advisory lock.", key);
        let mut conn = self.pool.acquire().await.map_err(map_sqlx_err)?;

        let locked: bool = sqlx::query_scalar("SELECT pg_try_advisory_lock($1)")
            .bind(key)
            .fetch_one(conn.as_mut())
            .instrument(query_span)
            .await
            .map_err(|err| {
                tracing::error!("Failed to execute advisory lock query: {:?}", err);
                map_sqlx_err(err)
            })?;

        if locked {
            *self.lock_conn.lock().await = Some(conn);
        }
        Ok(locked)
    }

    async fn advisory_unlock(&self, key: i64) -> Result<(), StorageError> {
        let query_span = tracing::info_span!("Releasing advisory lock.", key);
        let conn = self.lock_conn.lock().await.take();
        let mut conn = match conn {
            Some(conn) => conn,
            None => {
                tracing::warn!(key, "Advisory unlock requested but no lock connection is held");
                return Ok(());
            }
        };

        let released: bool = sqlx::query_scalar("SELECT pg_advisory_unlock($1)")
            .bind(key)
            .fetch_one(conn.as_mut())
            .instrument(query_span)
            .await
            .map_err(|err| {
                tracing::error!("Failed to execute advisory unlock query: {:?}", err);
                map_sqlx_err(err)
            })?;

        if !released {
            tracing::warn!(key, "pg_advisory_unlock reported no lock held by this session");
        }
        Ok(())
    }
}
