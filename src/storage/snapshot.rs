//! Moves a whole [`Store`] between the snapshot file and the primary store.

use tokio_util::sync::CancellationToken;
use tracing::info;

use super::StorageBackend;
use super::cancel::ensure_active;
use crate::errors::Result;

pub struct SnapshotCoordinator;

impl SnapshotCoordinator {
    /// Loads every record from `source` into `target`. Returns the number of
    /// records copied.
    pub async fn restore<S, T>(cancel: &CancellationToken, source: &S, target: &T) -> Result<usize>
    where
        S: StorageBackend + ?Sized,
        T: StorageBackend + ?Sized,
    {
        ensure_active(cancel)?;
        let store = source.list_all(cancel).await?;
        let count = store.len();
        ensure_active(cancel)?;
        target.restore_all(store).await?;
        info!(
            "Restored {} records from {} into {}",
            count,
            source.backend_name(),
            target.backend_name()
        );
        Ok(count)
    }

    /// 将主存储全部内容写入快照（覆盖原有快照）
    pub async fn save<S, T>(cancel: &CancellationToken, source: &S, target: &T) -> Result<usize>
    where
        S: StorageBackend + ?Sized,
        T: StorageBackend + ?Sized,
    {
        let store = source.list_all(cancel).await?;
        let count = store.len();
        target.restore_all(store).await?;
        info!(
            "Saved {} records from {} to {}",
            count,
            source.backend_name(),
            target.backend_name()
        );
        Ok(count)
    }
}
