use crate::connectors::ConnectorError;
use crate::storage::StorageError;

/// Hard failure of a sync run. By the time this propagates the advisory lock
/// release has already been attempted.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] ConnectorError),
    #[error("storage failed: {0}")]
    Storage(#[from] StorageError),
}
