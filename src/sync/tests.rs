use super::lock::STORE_SYNC_LOCK_KEY;
use super::repository::{
    ensure_brand_id, ensure_category_id, ensure_user_id, upsert_order, upsert_product,
};
use super::{run_sync_store, SyncError};
use crate::configuration::SyncSettings;
use crate::connectors::store_api::mock::MockStoreApiConnector;
use crate::connectors::{ApiOrder, ApiOrderItem, ApiProduct, ApiProductReview, ReviewUserId};
use crate::models::{NewUser, OrderStatus};
use crate::storage::{InMemoryStorage, StorageError, StoreStorage};

fn api_product(id: i64, name: &str) -> ApiProduct {
    ApiProduct {
        product_id: id,
        name: name.to_string(),
        description: Some(format!("{} description", name)),
        price: Some(25.0),
        brand: None,
        category: None,
        rating: Some(4.0),
        reviews: vec![],
    }
}

fn api_order(id: i64) -> ApiOrder {
    ApiOrder {
        order_id: id,
        user_id: None,
        items: vec![],
        total_price: None,
        status: None,
    }
}

fn sync_settings() -> SyncSettings {
    SyncSettings { concurrency: 5 }
}

mod entity_resolution {
    use super::*;

    #[tokio::test]
    async fn test_category_created_once_and_reused() {
        let storage = InMemoryStorage::new();

        let first = ensure_category_id(&storage, Some("  Lighting "))
            .await
            .unwrap();
        let second = ensure_category_id(&storage, Some("Lighting")).await.unwrap();

        assert!(first.is_some());
        assert_eq!(first, second);

        let categories = storage.categories();
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].name, "Lighting");
        assert_eq!(categories[0].slug, "lighting");
        let creates = storage
            .recorded_calls()
            .iter()
            .filter(|call| **call == "create_category")
            .count();
        assert_eq!(creates, 1);
    }

    #[tokio::test]
    async fn test_blank_names_skip_storage_entirely() {
        let storage = InMemoryStorage::new();

        assert_eq!(ensure_category_id(&storage, None).await.unwrap(), None);
        assert_eq!(ensure_category_id(&storage, Some("")).await.unwrap(), None);
        assert_eq!(ensure_category_id(&storage, Some("   ")).await.unwrap(), None);
        assert_eq!(ensure_brand_id(&storage, Some("  ")).await.unwrap(), None);

        assert!(storage.recorded_calls().is_empty());
    }

    #[tokio::test]
    async fn test_brand_slug_uses_brand_fallback_prefix() {
        let storage = InMemoryStorage::new();

        ensure_brand_id(&storage, Some("???")).await.unwrap();

        let brands = storage.brands();
        assert_eq!(brands.len(), 1);
        assert!(brands[0].slug.starts_with("brand-"), "slug: {}", brands[0].slug);
    }

    #[tokio::test]
    async fn test_order_user_placeholder_adopts_external_id() {
        let storage = InMemoryStorage::new();

        let resolved = ensure_user_id(&storage, Some(42)).await.unwrap();
        assert_eq!(resolved, Some(42));

        let users = storage.users();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].id, 42);
        assert_eq!(users[0].email, "external-order-42@example.com");
        assert_eq!(users[0].username, "external_order_42");
        assert_eq!(users[0].name, "External User 42");
        assert!(users[0].is_active);

        // second resolution reuses the row
        let again = ensure_user_id(&storage, Some(42)).await.unwrap();
        assert_eq!(again, Some(42));
        assert_eq!(storage.users().len(), 1);
    }

    #[tokio::test]
    async fn test_absent_user_resolves_to_none() {
        let storage = InMemoryStorage::new();
        assert_eq!(ensure_user_id(&storage, None).await.unwrap(), None);
        assert!(storage.recorded_calls().is_empty());
    }
}

mod product_reconciliation {
    use super::*;

    #[tokio::test]
    async fn test_product_created_with_synthesized_identity() {
        let storage = InMemoryStorage::new();
        let mut product = api_product(101, "Aurora Desk Lamp");
        product.category = Some("Lighting".to_string());
        product.brand = Some("Lumina".to_string());

        upsert_product(&storage, &product).await.unwrap();

        let products = storage.products();
        assert_eq!(products.len(), 1);
        let row = &products[0];
        assert_eq!(row.id, 101);
        assert_eq!(row.sku, "sku-101");
        assert_eq!(row.slug, "aurora-desk-lamp-101");
        assert_eq!(row.price, Some(25.0));
        assert!(row.category_id.is_some());
        assert!(row.brand_id.is_some());
        assert!(row.synced_at.is_some());
    }

    #[tokio::test]
    async fn test_second_upsert_updates_in_place_and_keeps_identity() {
        let storage = InMemoryStorage::new();
        let product = api_product(101, "Aurora Desk Lamp");
        upsert_product(&storage, &product).await.unwrap();

        let mut renamed = api_product(101, "Aurora Desk Lamp v2");
        renamed.price = Some(59.0);
        upsert_product(&storage, &renamed).await.unwrap();

        let products = storage.products();
        assert_eq!(products.len(), 1);
        let row = &products[0];
        assert_eq!(row.name, "Aurora Desk Lamp v2");
        assert_eq!(row.price, Some(59.0));
        // sku/slug are create-time values and never move
        assert_eq!(row.sku, "sku-101");
        assert_eq!(row.slug, "aurora-desk-lamp-101");
    }

    #[tokio::test]
    async fn test_numeric_review_author_becomes_inactive_account() {
        let storage = InMemoryStorage::new();
        let mut product = api_product(101, "Aurora Desk Lamp");
        product.reviews = vec![ApiProductReview {
            user_id: ReviewUserId::Id(777),
            rating: 4.5,
            comment: Some("Nice".to_string()),
        }];

        upsert_product(&storage, &product).await.unwrap();

        let users = storage.users();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].email, "external+777@example.com");
        assert!(!users[0].is_active);
        // review user ids never reuse the external id
        assert_ne!(users[0].id, 777);

        let reviews = storage.reviews();
        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].user_id, users[0].id.to_string());
        assert_eq!(reviews[0].rating, 4.5);
    }

    #[tokio::test]
    async fn test_string_review_author_is_stored_raw() {
        let storage = InMemoryStorage::new();
        let mut product = api_product(102, "Cedar Bookshelf");
        product.reviews = vec![ApiProductReview {
            user_id: ReviewUserId::External("guest-7".to_string()),
            rating: 3.0,
            comment: None,
        }];

        upsert_product(&storage, &product).await.unwrap();

        assert!(storage.users().is_empty());
        let reviews = storage.reviews();
        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].user_id, "guest-7");
    }

    #[tokio::test]
    async fn test_review_updates_instead_of_duplicating() {
        let storage = InMemoryStorage::new();
        let mut product = api_product(101, "Aurora Desk Lamp");
        product.reviews = vec![ApiProductReview {
            user_id: ReviewUserId::Id(777),
            rating: 4.0,
            comment: Some("Good".to_string()),
        }];
        upsert_product(&storage, &product).await.unwrap();

        product.reviews[0].rating = 2.0;
        product.reviews[0].comment = Some("Broke after a week".to_string());
        upsert_product(&storage, &product).await.unwrap();

        let reviews = storage.reviews();
        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].rating, 2.0);
        assert_eq!(reviews[0].comment.as_deref(), Some("Broke after a week"));
        // resolution found the account, no second user row
        assert_eq!(storage.users().len(), 1);
    }

    #[tokio::test]
    async fn test_lost_user_create_race_falls_back_to_reread() {
        let storage = InMemoryStorage::new();
        storage.fail_next_user_create();

        let mut product = api_product(101, "Aurora Desk Lamp");
        product.reviews = vec![ApiProductReview {
            user_id: ReviewUserId::Id(888),
            rating: 5.0,
            comment: None,
        }];

        // the conflict is swallowed by the re-read fallback
        upsert_product(&storage, &product).await.unwrap();

        let users = storage.users();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].email, "external+888@example.com");

        let reviews = storage.reviews();
        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].user_id, users[0].id.to_string());
    }
}

mod order_reconciliation {
    use super::*;

    #[tokio::test]
    async fn test_order_created_with_defaults_for_absent_fields() {
        let storage = InMemoryStorage::new();

        upsert_order(&storage, &api_order(9005)).await.unwrap();

        let orders = storage.orders();
        assert_eq!(orders.len(), 1);
        let row = &orders[0];
        assert_eq!(row.id, 9005);
        assert_eq!(row.order_number, "ORD-9005");
        assert_eq!(row.user_id, None);
        assert_eq!(row.status, None);
        assert_eq!(row.subtotal, 0.0);
        assert_eq!(row.grand_total, 0.0);
    }

    #[tokio::test]
    async fn test_total_price_mirrors_into_both_totals() {
        let storage = InMemoryStorage::new();
        let mut order = api_order(9005);
        order.total_price = Some(128.5);

        upsert_order(&storage, &order).await.unwrap();

        let row = &storage.orders()[0];
        assert_eq!(row.subtotal, 128.5);
        assert_eq!(row.grand_total, 128.5);
    }

    #[tokio::test]
    async fn test_unknown_status_left_unset_then_kept_on_update() {
        let storage = InMemoryStorage::new();
        let mut order = api_order(9005);
        order.status = Some("BOGUS".to_string());
        upsert_order(&storage, &order).await.unwrap();
        assert_eq!(storage.orders()[0].status, None);

        // a later pass delivers a valid status
        order.status = Some("Shipped".to_string());
        upsert_order(&storage, &order).await.unwrap();
        assert_eq!(storage.orders()[0].status, Some(OrderStatus::Shipped));

        // and an invalid one afterwards must not clear it
        order.status = Some("garbage".to_string());
        upsert_order(&storage, &order).await.unwrap();
        assert_eq!(storage.orders()[0].status, Some(OrderStatus::Shipped));

        assert_eq!(storage.orders().len(), 1);
    }

    #[tokio::test]
    async fn test_absent_user_does_not_clear_stored_user() {
        let storage = InMemoryStorage::new();
        let mut order = api_order(9005);
        order.user_id = Some(42);
        upsert_order(&storage, &order).await.unwrap();
        assert_eq!(storage.orders()[0].user_id, Some(42));

        order.user_id = None;
        upsert_order(&storage, &order).await.unwrap();
        assert_eq!(storage.orders()[0].user_id, Some(42));
    }

    #[tokio::test]
    async fn test_items_for_unknown_products_are_skipped() {
        let storage = InMemoryStorage::new();
        let mut order = api_order(9002);
        order.total_price = Some(64.0);
        order.items = vec![ApiOrderItem {
            product_id: 999,
            quantity: 4,
        }];

        upsert_order(&storage, &order).await.unwrap();

        // the order row lands, its unknown-product item does not
        assert_eq!(storage.orders().len(), 1);
        assert_eq!(storage.orders()[0].grand_total, 64.0);
        assert!(storage.order_items().is_empty());
    }

    #[tokio::test]
    async fn test_item_prices_snapshot_the_current_product_price() {
        let storage = InMemoryStorage::new();
        let mut product = api_product(7, "Walnut Desk");
        product.price = Some(10.0);
        upsert_product(&storage, &product).await.unwrap();

        let mut order = api_order(9001);
        order.items = vec![ApiOrderItem {
            product_id: 7,
            quantity: 3,
        }];
        upsert_order(&storage, &order).await.unwrap();

        let items = storage.order_items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].sku, "sku-7");
        assert_eq!(items[0].name, "Walnut Desk");
        assert_eq!(items[0].quantity, 3);
        assert_eq!(items[0].unit_price, 10.0);
        assert_eq!(items[0].total_price, 30.0);

        // price moves, the same item row is refreshed on the next pass
        product.price = Some(12.0);
        upsert_product(&storage, &product).await.unwrap();
        order.items[0].quantity = 2;
        upsert_order(&storage, &order).await.unwrap();

        let items = storage.order_items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 2);
        assert_eq!(items[0].unit_price, 12.0);
        assert_eq!(items[0].total_price, 24.0);
        // the create-time snapshot stays
        assert_eq!(items[0].name, "Walnut Desk");
    }

    #[tokio::test]
    async fn test_unpriced_product_items_cost_zero() {
        let storage = InMemoryStorage::new();
        let mut product = api_product(8, "Mystery Box");
        product.price = None;
        upsert_product(&storage, &product).await.unwrap();

        let mut order = api_order(9003);
        order.items = vec![ApiOrderItem {
            product_id: 8,
            quantity: 5,
        }];
        upsert_order(&storage, &order).await.unwrap();

        let items = storage.order_items();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].unit_price, 0.0);
        assert_eq!(items[0].total_price, 0.0);
    }
}

mod orchestration {
    use super::*;

    #[tokio::test]
    async fn test_full_pass_reconciles_fixtures_and_releases_lock() {
        let api = MockStoreApiConnector::default();
        let storage = InMemoryStorage::new();

        let report = run_sync_store(&api, &storage, &sync_settings())
            .await
            .unwrap();

        assert!(report.ok);
        assert_eq!(report.skipped, None);
        assert_eq!(report.products, Some(2));
        assert_eq!(report.orders, Some(2));
        assert!(report.elapsed_ms.is_some());

        // catalog
        assert_eq!(storage.products().len(), 2);
        assert_eq!(storage.categories().len(), 2);
        assert_eq!(storage.brands().len(), 1);
        // review authors: one account plus one raw guest id
        assert_eq!(storage.reviews().len(), 2);
        // orders: the resolvable one gets both items, the other none
        assert_eq!(storage.orders().len(), 2);
        let items = storage.order_items();
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|item| item.order_id == 9001));

        // the lock is free again
        assert!(storage.try_advisory_lock(STORE_SYNC_LOCK_KEY).await.unwrap());
    }

    #[tokio::test]
    async fn test_two_sequential_passes_create_no_duplicates() {
        let api = MockStoreApiConnector::default();
        let storage = InMemoryStorage::new();

        run_sync_store(&api, &storage, &sync_settings()).await.unwrap();
        run_sync_store(&api, &storage, &sync_settings()).await.unwrap();

        assert_eq!(storage.products().len(), 2);
        assert_eq!(storage.categories().len(), 2);
        assert_eq!(storage.brands().len(), 1);
        assert_eq!(storage.reviews().len(), 2);
        assert_eq!(storage.orders().len(), 2);
        assert_eq!(storage.order_items().len(), 2);
        assert_eq!(api.product_calls(), 2);
        assert_eq!(api.order_calls(), 2);
    }

    #[tokio::test]
    async fn test_held_lock_skips_without_fetching_or_writing() {
        let api = MockStoreApiConnector::default();
        let storage = InMemoryStorage::new();
        assert!(storage.try_advisory_lock(STORE_SYNC_LOCK_KEY).await.unwrap());
        let calls_before = storage.recorded_calls().len();

        let report = run_sync_store(&api, &storage, &sync_settings())
            .await
            .unwrap();

        assert!(!report.ok);
        assert_eq!(report.skipped, Some(true));
        assert_eq!(report.reason.as_deref(), Some("lock-held"));
        assert_eq!(report.products, None);
        assert_eq!(report.orders, None);

        assert_eq!(api.product_calls(), 0);
        assert_eq!(api.order_calls(), 0);
        // only the failed lock attempt touched storage
        let calls = storage.recorded_calls();
        assert_eq!(calls.len(), calls_before + 1);
        assert_eq!(*calls.last().unwrap(), "try_advisory_lock");

        // the other holder still owns the lock
        assert!(!storage.try_advisory_lock(STORE_SYNC_LOCK_KEY).await.unwrap());
    }

    #[tokio::test]
    async fn test_fetch_failure_propagates_and_releases_lock() {
        let api = MockStoreApiConnector::default();
        api.fail_products();
        let storage = InMemoryStorage::new();

        let err = run_sync_store(&api, &storage, &sync_settings())
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Fetch(_)));
        assert!(storage.products().is_empty());
        assert!(storage.orders().is_empty());
        // lock was released on the failure path
        assert!(storage.try_advisory_lock(STORE_SYNC_LOCK_KEY).await.unwrap());
    }

    #[tokio::test]
    async fn test_reconciliation_failure_propagates_after_partial_commit() {
        // one order whose placeholder email is already taken by another account
        let api = MockStoreApiConnector::with_payloads(
            MockStoreApiConnector::sample_products(),
            vec![ApiOrder {
                order_id: 9001,
                user_id: Some(501),
                items: vec![],
                total_price: Some(100.0),
                status: Some("Pending".to_string()),
            }],
        );
        let storage = InMemoryStorage::new();
        let mut squatter = NewUser::external_order(999);
        squatter.email = "external-order-501@example.com".to_string();
        storage.create_user(squatter).await.unwrap();

        let err = run_sync_store(&api, &storage, &sync_settings())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Storage(StorageError::Conflict(_))));

        // the product phase committed before the failure, no rollback
        assert_eq!(storage.products().len(), 2);
        assert!(storage.orders().is_empty());
        // lock was still released
        assert!(storage.try_advisory_lock(STORE_SYNC_LOCK_KEY).await.unwrap());
    }
}
