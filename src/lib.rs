pub mod configuration;
pub mod connectors;
pub mod helpers;
pub mod models;
pub mod storage;
pub mod sync;
pub mod telemetry;
