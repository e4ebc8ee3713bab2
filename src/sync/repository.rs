//! Reconciliation of external store records against local storage.
//!
//! Everything here is upsert-shaped: rows are created on first sight keyed by
//! their external identifier and updated afterwards. The sync never deletes;
//! rows that drop out of the feed simply stop advancing their synced_at.

use chrono::Utc;

use super::SyncError;
use crate::connectors::{ApiOrder, ApiProduct, ReviewUserId};
use crate::helpers::{normalize_name, slugify};
use crate::models::{
    review_user_email, NewBrand, NewCategory, NewOrderItem, NewReview, NewUser, OrderItemPatch,
    OrderStatus, OrderUpsert, ProductUpsert, ReviewPatch, User,
};
use crate::storage::StoreStorage;

/// Resolve a category name to its internal id, creating the row on first
/// sight. Blank or absent names resolve to None without touching storage.
pub async fn ensure_category_id(
    storage: &dyn StoreStorage,
    name: Option<&str>,
) -> Result<Option<i64>, SyncError> {
    let normalized = match normalize_name(name) {
        Some(value) => value,
        None => return Ok(None),
    };

    if let Some(existing) = storage.find_category_by_name(&normalized).await? {
        return Ok(Some(existing.id));
    }

    let slug = slugify(&normalized, "cat");
    let created = storage
        .create_category(NewCategory {
            name: normalized,
            slug,
        })
        .await?;
    Ok(Some(created.id))
}

/// Same contract as ensure_category_id, for brands.
pub async fn ensure_brand_id(
    storage: &dyn StoreStorage,
    name: Option<&str>,
) -> Result<Option<i64>, SyncError> {
    let normalized = match normalize_name(name) {
        Some(value) => value,
        None => return Ok(None),
    };

    if let Some(existing) = storage.find_brand_by_name(&normalized).await? {
        return Ok(Some(existing.id));
    }

    let slug = slugify(&normalized, "brand");
    let created = storage
        .create_brand(NewBrand {
            name: normalized,
            slug,
        })
        .await?;
    Ok(Some(created.id))
}

/// Resolve an order's customer id, synthesizing a placeholder account on
/// first sight. The placeholder adopts the external id as its primary key so
/// later orders from the same customer land on the same row.
pub async fn ensure_user_id(
    storage: &dyn StoreStorage,
    user_id: Option<i64>,
) -> Result<Option<i64>, SyncError> {
    let user_id = match user_id {
        Some(value) => value,
        None => return Ok(None),
    };

    if let Some(existing) = storage.find_user_by_id(user_id).await? {
        return Ok(Some(existing.id));
    }

    let created = storage.create_user(NewUser::external_order(user_id)).await?;
    Ok(Some(created.id))
}

/// Review authors resolve through the review-scoped email, not the id. A
/// create that loses a race against a concurrent insert falls back to
/// re-reading by email; when even that misses, the raw external id is kept.
async fn resolve_review_user(
    storage: &dyn StoreStorage,
    user_id: &ReviewUserId,
) -> Result<String, SyncError> {
    let numeric_id = match user_id {
        ReviewUserId::Id(value) => *value,
        ReviewUserId::External(raw) => return Ok(raw.clone()),
    };

    let email = review_user_email(numeric_id);
    let mut resolved: Option<User> = storage.find_user_by_email(&email).await?;
    if resolved.is_none() {
        resolved = match storage.create_user(NewUser::external_reviewer(numeric_id)).await {
            Ok(user) => Some(user),
            Err(err) => {
                tracing::debug!(
                    email = %email,
                    error = %err,
                    "Review user creation raced; re-reading by email"
                );
                storage.find_user_by_email(&email).await?
            }
        };
    }

    Ok(resolved
        .map(|user| user.id.to_string())
        .unwrap_or_else(|| numeric_id.to_string()))
}

/// Upsert one external product and its nested reviews.
pub async fn upsert_product(
    storage: &dyn StoreStorage,
    product: &ApiProduct,
) -> Result<(), SyncError> {
    let synced_at = Utc::now();
    let category_id = ensure_category_id(storage, product.category.as_deref()).await?;
    let brand_id = ensure_brand_id(storage, product.brand.as_deref()).await?;

    storage
        .upsert_product(ProductUpsert {
            id: product.product_id,
            sku: format!("sku-{}", product.product_id),
            slug: format!("{}-{}", slugify(&product.name, "product"), product.product_id),
            name: product.name.clone(),
            description: product.description.clone(),
            price: product.price,
            rating: product.rating,
            category_id,
            brand_id,
            synced_at,
        })
        .await?;

    for review in &product.reviews {
        let review_user_id = resolve_review_user(storage, &review.user_id).await?;
        let existing = storage
            .find_review_by_product_and_user(product.product_id, &review_user_id)
            .await?;
        match existing {
            Some(found) => {
                storage
                    .update_review(
                        found.id,
                        ReviewPatch {
                            rating: review.rating,
                            comment: review.comment.clone(),
                            synced_at,
                        },
                    )
                    .await?;
            }
            None => {
                storage
                    .create_review(NewReview {
                        product_id: product.product_id,
                        user_id: review_user_id,
                        rating: review.rating,
                        comment: review.comment.clone(),
                        synced_at,
                    })
                    .await?;
            }
        }
    }

    Ok(())
}

/// Upsert one external order and its line items.
///
/// subtotal and grand_total both mirror the payload's total_price; the feed
/// carries no tax or shipping breakdown to reconstruct richer totals from.
pub async fn upsert_order(storage: &dyn StoreStorage, order: &ApiOrder) -> Result<(), SyncError> {
    let synced_at = Utc::now();

    let status = match order.status.as_deref() {
        Some(raw) => {
            let parsed = OrderStatus::parse(raw);
            if parsed.is_none() {
                tracing::debug!(
                    order_id = order.order_id,
                    status = raw,
                    "Unrecognized order status; leaving it unset"
                );
            }
            parsed
        }
        None => None,
    };
    let user_id = ensure_user_id(storage, order.user_id).await?;
    let total = order.total_price.unwrap_or(0.0);

    let order_record = storage
        .upsert_order(OrderUpsert {
            id: order.order_id,
            order_number: format!("ORD-{}", order.order_id),
            user_id,
            status,
            subtotal: total,
            grand_total: total,
            synced_at,
        })
        .await?;

    for item in &order.items {
        let product = match storage.find_product_by_id(item.product_id).await? {
            Some(product) => product,
            // Products reconcile before orders, so anything still missing is
            // an item the catalog does not carry. Skip it, keep the order.
            None => {
                tracing::debug!(
                    order_id = order.order_id,
                    product_id = item.product_id,
                    "Order item references an unknown product; skipping"
                );
                continue;
            }
        };

        let unit_price = product.price.unwrap_or(0.0);
        let total_price = unit_price * item.quantity as f64;

        let existing = storage
            .find_order_item(order_record.id, item.product_id)
            .await?;
        match existing {
            Some(found) => {
                storage
                    .update_order_item(
                        found.id,
                        OrderItemPatch {
                            quantity: item.quantity,
                            unit_price,
                            total_price,
                            synced_at,
                        },
                    )
                    .await?;
            }
            None => {
                storage
                    .create_order_item(NewOrderItem {
                        order_id: order_record.id,
                        product_id: product.id,
                        sku: product.sku,
                        name: product.name,
                        quantity: item.quantity,
                        unit_price,
                        total_price,
                        synced_at,
                    })
                    .await?;
            }
        }
    }

    Ok(())
}
