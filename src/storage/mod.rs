//! Link storage engine.
//!
//! Three interchangeable backends implement [`StorageBackend`]:
//! - [`MemoryBackend`]: lock-guarded map, the default primary store
//! - [`FileSnapshotBackend`]: JSON-lines snapshot, used for persistence across restarts
//! - [`RelationalBackend`]: SeaORM (SQLite / MySQL / PostgreSQL), primary store when configured
//!
//! Callers depend only on the traits; the concrete backend is picked once by
//! [`StorageFactory`].

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::StorageConfig;
use crate::errors::Result;

pub mod batch;
pub mod cancel;
pub mod delete;
pub mod file;
pub mod keygen;
pub mod memory;
pub mod models;
pub mod relational;
pub mod snapshot;

pub use batch::validate_batch;
pub use delete::BulkDeleter;
pub use file::FileSnapshotBackend;
pub use keygen::{DEFAULT_ALPHABET, KeyGenerator};
pub use memory::MemoryBackend;
pub use models::{
    BatchItem, BatchResult, Record, SHORT_KEY_LEN, ShortKey, Store, StoredLink, User,
};
pub use relational::RelationalBackend;
pub use snapshot::SnapshotCoordinator;

/// 分配短码时的最大尝试次数，耗尽视为后端不可用
pub const MAX_KEY_ATTEMPTS: usize = 1024;

#[async_trait]
pub trait StorageBackend: Send + Sync {
    fn backend_name(&self) -> &'static str;

    /// Allocates a fresh key for `url`, retrying on collisions until the key
    /// is unique, a non-collision error occurs, or `cancel` fires.
    async fn new_short(
        &self,
        cancel: &CancellationToken,
        url: &str,
        owner_id: Option<&str>,
    ) -> Result<ShortKey>;

    /// 返回原始 URL；短码长度不符时直接返回 NotFound，已删除返回 Deleted
    async fn get_by_key(&self, cancel: &CancellationToken, key: &str) -> Result<String>;

    /// Reverse lookup. `Ok(None)` when no record has this URL, `Deleted` when
    /// every match is soft-deleted.
    async fn get_by_url(&self, cancel: &CancellationToken, url: &str) -> Result<Option<ShortKey>>;

    async fn list_all(&self, cancel: &CancellationToken) -> Result<Store>;

    /// 仅返回该用户未删除的链接
    async fn list_by_owner(
        &self,
        cancel: &CancellationToken,
        owner_id: &str,
    ) -> Result<Vec<StoredLink>>;

    /// Shortens every item, reusing live keys for URLs that were already
    /// shortened. See [`batch`].
    async fn create_batch(
        &self,
        cancel: &CancellationToken,
        items: &[BatchItem],
        owner_id: Option<&str>,
        url_prefix: &str,
    ) -> Result<Vec<BatchResult>> {
        batch::create_each(self, cancel, items, owner_id, url_prefix).await
    }

    /// Single-key soft delete: `true` only when the key existed, belonged to
    /// `owner_id` and was live before this call.
    async fn delete_one(&self, owner_id: &str, key: &str) -> Result<bool>;

    /// 并发软删除，返回实际删除的数量
    async fn soft_delete(
        &self,
        cancel: &CancellationToken,
        owner_id: &str,
        keys: &[String],
    ) -> Result<u64>;

    async fn restore_all(&self, store: Store) -> Result<()>;

    async fn ping(&self, cancel: &CancellationToken) -> Result<()>;
}

#[async_trait]
pub trait UserRegistry: Send + Sync {
    async fn new_user(&self, cancel: &CancellationToken) -> Result<User>;

    async fn get_user(&self, cancel: &CancellationToken, id: &str) -> Result<User>;
}

/// 主存储：链接存储 + 用户注册
pub trait PrimaryBackend: StorageBackend + UserRegistry {}

impl<T: StorageBackend + UserRegistry> PrimaryBackend for T {}

/// Primary store chosen at startup.
pub struct PrimaryStorage {
    pub backend: Arc<dyn PrimaryBackend>,
    /// 新初始化且为空，可以从快照恢复
    pub fresh: bool,
}

pub struct StorageFactory;

impl StorageFactory {
    /// `database_url` 为空时使用内存存储，否则使用关系型数据库
    pub async fn create(config: &StorageConfig, generator: KeyGenerator) -> Result<PrimaryStorage> {
        if config.database_url.trim().is_empty() {
            info!("DATABASE_URL not set, using in-memory storage");
            return Ok(PrimaryStorage {
                backend: Arc::new(MemoryBackend::with_generator(generator)),
                fresh: true,
            });
        }

        let backend =
            RelationalBackend::new(&config.database_url, config.pool_size, generator).await?;
        let fresh = backend.is_empty().await?;
        info!(
            "Using {} storage (fresh: {})",
            backend.backend_name().to_uppercase(),
            fresh
        );
        Ok(PrimaryStorage {
            backend: Arc::new(backend),
            fresh,
        })
    }

    /// `file_storage_path` 为空时不启用快照
    pub fn create_snapshot(
        config: &StorageConfig,
        generator: KeyGenerator,
    ) -> Option<FileSnapshotBackend> {
        let path = config.file_storage_path.trim();
        if path.is_empty() {
            return None;
        }
        Some(FileSnapshotBackend::with_generator(path, generator))
    }
}
