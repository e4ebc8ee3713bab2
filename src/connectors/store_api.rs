//! Store API Connector
//!
//! Read-only client for the external store feed. The feed exposes two
//! endpoints, `GET {base}/products` and `GET {base}/orders`, both returning
//! JSON arrays. Nothing is ever written back to the store.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::Instrument;

use crate::configuration::StoreApiSettings;
use crate::connectors::errors::ConnectorError;

/// A product as the feed ships it. Reviews arrive nested; there is no
/// separate review endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiProduct {
    pub product_id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default, alias = "brand_name")]
    pub brand: Option<String>,
    #[serde(default, alias = "category_name")]
    pub category: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub reviews: Vec<ApiProductReview>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiProductReview {
    pub user_id: ReviewUserId,
    pub rating: f64,
    #[serde(default)]
    pub comment: Option<String>,
}

/// Review authors come as either a numeric id or an opaque string such as a
/// guest token. Only numeric ids are resolved to internal accounts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReviewUserId {
    Id(i64),
    External(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiOrder {
    pub order_id: i64,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub items: Vec<ApiOrderItem>,
    #[serde(default)]
    pub total_price: Option<f64>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiOrderItem {
    pub product_id: i64,
    pub quantity: i64,
}

/// Read access to the external store feed
#[async_trait]
pub trait StoreApiConnector: Send + Sync {
    /// GET {base}/products
    async fn fetch_products(&self) -> Result<Vec<ApiProduct>, ConnectorError>;
    /// GET {base}/orders
    async fn fetch_orders(&self) -> Result<Vec<ApiOrder>, ConnectorError>;
}

/// HTTP implementation of the store API connector
pub struct StoreApiClient {
    base_url: String,
    http_client: reqwest::Client,
}

impl StoreApiClient {
    pub fn new(settings: &StoreApiSettings) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs.max(1)))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            // a trailing slash in config would otherwise double up in URLs
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            http_client,
        }
    }

    fn products_url(&self) -> String {
        format!("{}/products", self.base_url)
    }

    fn orders_url(&self) -> String {
        format!("{}/orders", self.base_url)
    }

    async fn get_json<T>(&self, url: String) -> Result<T, ConnectorError>
    where
        T: serde::de::DeserializeOwned,
    {
        let fetch_span = tracing::info_span!("Fetching from store API.", url = %url);

        let response = self
            .http_client
            .get(&url)
            .send()
            .instrument(fetch_span)
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!(
                url = %url,
                status = status.as_u16(),
                "Store API answered with an error status"
            );
            return Err(ConnectorError::HttpStatus {
                url,
                status: status.as_u16(),
            });
        }

        response.json::<T>().await.map_err(|err| {
            tracing::error!(url = %url, "Failed to decode store API payload: {:?}", err);
            ConnectorError::InvalidResponse(err.to_string())
        })
    }
}

#[async_trait]
impl StoreApiConnector for StoreApiClient {
    async fn fetch_products(&self) -> Result<Vec<ApiProduct>, ConnectorError> {
        self.get_json(self.products_url()).await
    }

    async fn fetch_orders(&self) -> Result<Vec<ApiOrder>, ConnectorError> {
        self.get_json(self.orders_url()).await
    }
}

pub mod mock {
    //! Fixture-backed connector for tests: no network, deterministic payloads,
    //! call counters so callers can assert fetch activity.

    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    pub struct MockStoreApiConnector {
        products: Vec<ApiProduct>,
        orders: Vec<ApiOrder>,
        product_calls: AtomicUsize,
        order_calls: AtomicUsize,
        fail_products: AtomicBool,
        fail_orders: AtomicBool,
    }

    impl Default for MockStoreApiConnector {
        fn default() -> Self {
            Self::with_payloads(Self::sample_products(), Self::sample_orders())
        }
    }

    impl MockStoreApiConnector {
        pub fn with_payloads(products: Vec<ApiProduct>, orders: Vec<ApiOrder>) -> Self {
            Self {
                products,
                orders,
                product_calls: AtomicUsize::new(0),
                order_calls: AtomicUsize::new(0),
                fail_products: AtomicBool::new(false),
                fail_orders: AtomicBool::new(false),
            }
        }

        /// Every subsequent product fetch answers 503.
        pub fn fail_products(&self) {
            self.fail_products.store(true, Ordering::SeqCst);
        }

        /// Every subsequent order fetch answers 503.
        pub fn fail_orders(&self) {
            self.fail_orders.store(true, Ordering::SeqCst);
        }

        pub fn product_calls(&self) -> usize {
            self.product_calls.load(Ordering::SeqCst)
        }

        pub fn order_calls(&self) -> usize {
            self.order_calls.load(Ordering::SeqCst)
        }

        /// Two products; the first carries a numeric-id review and a guest
        /// review, the second has no rating and no reviews.
        pub fn sample_products() -> Vec<ApiProduct> {
            vec![
                ApiProduct {
                    product_id: 101,
                    name: "Aurora Desk Lamp".to_string(),
                    description: Some("Warm white desk lamp".to_string()),
                    price: Some(49.9),
                    brand: Some("Lumina".to_string()),
                    category: Some("Lighting".to_string()),
                    rating: Some(4.6),
                    reviews: vec![
                        ApiProductReview {
                            user_id: ReviewUserId::Id(501),
                            rating: 5.0,
                            comment: Some("Bright and quiet".to_string()),
                        },
                        ApiProductReview {
                            user_id: ReviewUserId::External("guest-7".to_string()),
                            rating: 3.0,
                            comment: None,
                        },
                    ],
                },
                ApiProduct {
                    product_id: 102,
                    name: "Cedar Bookshelf".to_string(),
                    description: None,
                    price: Some(129.0),
                    brand: Some("Lumina".to_string()),
                    category: Some("Furniture".to_string()),
                    rating: None,
                    reviews: vec![],
                },
            ]
        }

        /// Two orders; the first is fully resolvable, the second has an
        /// unknown status and an item for a product the feed never ships.
        pub fn sample_orders() -> Vec<ApiOrder> {
            vec![
                ApiOrder {
                    order_id: 9001,
                    user_id: Some(501),
                    items: vec![
                        ApiOrderItem {
                            product_id: 101,
                            quantity: 2,
                        },
                        ApiOrderItem {
                            product_id: 102,
                            quantity: 1,
                        },
                    ],
                    total_price: Some(228.8),
                    status: Some("Pending".to_string()),
                },
                ApiOrder {
                    order_id: 9002,
                    user_id: None,
                    items: vec![ApiOrderItem {
                        product_id: 999,
                        quantity: 4,
                    }],
                    total_price: Some(64.0),
                    status: Some("BOGUS".to_string()),
                },
            ]
        }
    }

    #[async_trait]
    impl StoreApiConnector for MockStoreApiConnector {
        async fn fetch_products(&self) -> Result<Vec<ApiProduct>, ConnectorError> {
            self.product_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_products.load(Ordering::SeqCst) {
                return Err(ConnectorError::HttpStatus {
                    url: "https://store.invalid/products".to_string(),
                    status: 503,
                });
            }
            Ok(self.products.clone())
        }

        async fn fetch_orders(&self) -> Result<Vec<ApiOrder>, ConnectorError> {
            self.order_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_orders.load(Ordering::SeqCst) {
                return Err(ConnectorError::HttpStatus {
                    url: "https://store.invalid/orders".to_string(),
                    status: 503,
                });
            }
            Ok(self.orders.clone())
        }
    }
}
