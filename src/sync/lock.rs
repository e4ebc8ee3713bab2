//! Advisory-lock guard around sync runs.

use super::SyncError;
use crate::storage::StoreStorage;

/// Deployment-wide lock key for the store sync job. Every invocation surface
/// must use this key or overlapping runs stop excluding each other.
pub const STORE_SYNC_LOCK_KEY: i64 = 20250126;

/// Take the lock without blocking; false means another run holds it.
pub async fn acquire_advisory_lock(
    storage: &dyn StoreStorage,
    key: i64,
) -> Result<bool, SyncError> {
    Ok(storage.try_advisory_lock(key).await?)
}

/// Release a previously acquired lock. Failures are logged, never propagated:
/// the run's own outcome must not be masked by the release attempt.
pub async fn release_advisory_lock(storage: &dyn StoreStorage, key: i64) {
    if let Err(err) = storage.advisory_unlock(key).await {
        tracing::error!(key, error = %err, "Failed to release store sync advisory lock");
    }
}
