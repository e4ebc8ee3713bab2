//! Top-level sync pass: lock, fetch, transform, reconcile, unlock.

use std::time::Instant;

use serde::Serialize;

use super::concurrency::run_with_concurrency;
use super::lock::{acquire_advisory_lock, release_advisory_lock, STORE_SYNC_LOCK_KEY};
use super::repository;
use super::transform::{transform_order, transform_product};
use super::SyncError;
use crate::configuration::SyncSettings;
use crate::connectors::{ApiOrder, ApiProduct, StoreApiConnector};
use crate::storage::StoreStorage;

/// Outcome of a sync pass, in the shape schedulers and operators consume.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub products: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orders: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u64>,
}

impl SyncReport {
    fn lock_held() -> Self {
        Self {
            ok: false,
            skipped: Some(true),
            reason: Some("lock-held".to_string()),
            products: None,
            orders: None,
            elapsed_ms: None,
        }
    }

    fn completed(products: usize, orders: usize, elapsed_ms: u64) -> Self {
        Self {
            ok: true,
            skipped: None,
            reason: None,
            products: Some(products),
            orders: Some(orders),
            elapsed_ms: Some(elapsed_ms),
        }
    }
}

/// One full synchronization pass.
///
/// Overlapping invocations are expected; losing the lock race yields an
/// Ok(skipped) report, not an error. Hard failures propagate only after the
/// lock release has been attempted, so a crashed pass does not wedge the
/// deployment until the session dies.
pub async fn run_sync_store(
    api: &dyn StoreApiConnector,
    storage: &dyn StoreStorage,
    settings: &SyncSettings,
) -> Result<SyncReport, SyncError> {
    let started = Instant::now();
    tracing::info!(concurrency = settings.concurrency, "Starting store sync");

    if !acquire_advisory_lock(storage, STORE_SYNC_LOCK_KEY).await? {
        tracing::warn!("Store sync skipped; advisory lock is held by another run");
        return Ok(SyncReport::lock_held());
    }

    let outcome = fetch_and_reconcile(api, storage, settings).await;
    release_advisory_lock(storage, STORE_SYNC_LOCK_KEY).await;

    let elapsed_ms = started.elapsed().as_millis() as u64;
    match outcome {
        Ok((products, orders)) => {
            tracing::info!(products, orders, elapsed_ms, "Store sync finished");
            Ok(SyncReport::completed(products, orders, elapsed_ms))
        }
        Err(err) => {
            tracing::error!(error = %err, elapsed_ms, "Store sync failed");
            Err(err)
        }
    }
}

async fn fetch_and_reconcile(
    api: &dyn StoreApiConnector,
    storage: &dyn StoreStorage,
    settings: &SyncSettings,
) -> Result<(usize, usize), SyncError> {
    let (raw_products, raw_orders) =
        futures::future::try_join(api.fetch_products(), api.fetch_orders()).await?;
    tracing::info!(
        products = raw_products.len(),
        orders = raw_orders.len(),
        "Fetched store feed"
    );

    let mut rng = rand::thread_rng();
    let products: Vec<ApiProduct> = raw_products
        .into_iter()
        .map(|product| transform_product(&mut rng, product))
        .collect();
    let orders: Vec<ApiOrder> = raw_orders
        .into_iter()
        .map(|order| transform_order(&mut rng, order))
        .collect();

    run_with_concurrency(&products, settings.concurrency, |product| {
        repository::upsert_product(storage, product)
    })
    .await?;
    tracing::info!(count = products.len(), "Products reconciled");

    // Order items resolve against the catalog, so the product phase must
    // fully finish before the first order is touched.
    run_with_concurrency(&orders, settings.concurrency, |order| {
        repository::upsert_order(storage, order)
    })
    .await?;
    tracing::info!(count = orders.len(), "Orders reconciled");

    Ok((products.len(), orders.len()))
}
