//! Synthetic drift applied to fetched payloads before reconciliation.
//!
//! The upstream feed is static demo data; nudging prices, ratings and
//! quantities a little on every pass makes consecutive syncs visibly change
//! the dashboard. The reconcilers do not depend on these adjustments and the
//! transforms are deliberately not idempotent.

use rand::Rng;

use crate::connectors::{ApiOrder, ApiProduct};

/// `value` shifted by a uniform random factor in ±`pct`, floored at zero and
/// rounded to two decimals.
pub fn vary_number<R: Rng>(rng: &mut R, value: f64, pct: f64) -> f64 {
    let delta = value * pct * (rng.gen::<f64>() * 2.0 - 1.0);
    round2((value + delta).max(0.0))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Price drifts ±5%, rating ±10% clamped into [0, 5]. Identity, reviews and
/// relations pass through untouched.
pub fn transform_product<R: Rng>(rng: &mut R, mut product: ApiProduct) -> ApiProduct {
    product.price = product.price.map(|price| vary_number(rng, price, 0.05));
    product.rating = product
        .rating
        .map(|rating| vary_number(rng, rating, 0.10).clamp(0.0, 5.0));
    product
}

/// Quantities jitter ±10% (rounded, floored at 1), the order total ±5%.
pub fn transform_order<R: Rng>(rng: &mut R, mut order: ApiOrder) -> ApiOrder {
    for item in &mut order.items {
        let jitter = (item.quantity as f64 * 0.10 * (rng.gen::<f64>() * 2.0 - 1.0)).round() as i64;
        item.quantity = (item.quantity + jitter).max(1);
    }
    order.total_price = order.total_price.map(|total| vary_number(rng, total, 0.05));
    order
}
