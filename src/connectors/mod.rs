//! External Service Connectors
//!
//! Adapters for everything the sync job talks to over the network. All
//! external integrations go through connectors to keep the sync core
//! independent and testable.
//!
//! ## Architecture Pattern
//!
//! 1. Define trait in `{service}.rs` → allows mocking in tests
//! 2. Implement HTTP client in same file
//! 3. Inject trait object into the orchestrator → it never depends on HTTP details
//!
//! ## Testing
//!
//! ```ignore
//! use store_sync::connectors::store_api::mock::MockStoreApiConnector;
//!
//! #[tokio::test]
//! async fn test_sync_without_http() {
//!     let connector = MockStoreApiConnector::default();
//!     // Exercise the orchestrator without external API calls
//! }
//! ```

pub mod errors;
pub mod store_api;

pub use errors::ConnectorError;
pub use store_api::{
    ApiOrder, ApiOrderItem, ApiProduct, ApiProductReview, ReviewUserId, StoreApiClient,
    StoreApiConnector,
};
