//! The synchronization core: fetch the external feed, transform it, and
//! reconcile it into storage under an advisory lock.

pub mod concurrency;
mod error;
pub mod lock;
pub mod orchestrator;
pub mod repository;
pub mod transform;

pub use error::SyncError;
pub use orchestrator::{run_sync_store, SyncReport};

#[cfg(test)]
mod tests;
