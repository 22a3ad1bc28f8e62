pub mod cylinders;
pub mod fallback;
pub mod health;
pub mod metrics;
pub mod profiles;
pub mod reports;
pub mod stream;

use crate::core::error::{ApiError, StoreError};
use crate::stores::profile_store::{Commit, CylinderStore};
use std::sync::Arc;

/// Run a store write on the blocking pool; commits append to the WAL
/// synchronously and must not stall the async workers
pub(crate) async fn blocking_write<F>(store: &Arc<CylinderStore>, write: F) -> Result<Commit, ApiError>
where
    F: FnOnce(&CylinderStore) -> Result<Commit, StoreError> + Send + 'static,
{
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || write(&store))
        .await
        .map_err(|e| ApiError::InternalError(format!("Store write task failed: {}", e)))?
        .map_err(ApiError::from)
}
