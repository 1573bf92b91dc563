//! SeaORM backend for SQLite, MySQL/MariaDB and PostgreSQL.
//!
//! Uniqueness of short keys is enforced by the `links.short_key` unique
//! index; allocation retries on conflict instead of checking first.

mod connection;
mod converters;
mod errors;
mod mutations;
mod query;

use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{DatabaseConnection, EntityTrait, PaginatorTrait};
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::cancel::run_cancellable;
use super::delete::BulkDeleter;
use super::keygen::KeyGenerator;
use super::models::{BatchItem, BatchResult, ShortKey, Store, StoredLink, User};
use super::{StorageBackend, UserRegistry};
use crate::errors::{Result, ShortenerError};
use migration::entities::LinkEntity;

pub use connection::{connect_sqlite, run_migrations};
pub use errors::is_unique_violation;

/// 从数据库 URL 推断数据库类型
pub fn infer_backend_from_url(database_url: &str) -> Result<&'static str> {
    if database_url.starts_with("sqlite:")
        || database_url.ends_with(".db")
        || database_url.ends_with(".sqlite")
    {
        Ok("sqlite")
    } else if database_url.starts_with("mysql://") || database_url.starts_with("mariadb://") {
        Ok("mysql")
    } else if database_url.starts_with("postgres://") || database_url.starts_with("postgresql://")
    {
        Ok("postgres")
    } else {
        Err(ShortenerError::database_config(format!(
            "无法从 URL 推断数据库类型: {}. 支持的 URL 格式: sqlite://, mysql://, mariadb://, postgres://",
            database_url
        )))
    }
}

#[derive(Clone)]
pub struct RelationalBackend {
    db: DatabaseConnection,
    backend_name: &'static str,
    generator: KeyGenerator,
}

impl RelationalBackend {
    /// Connects, runs migrations and returns a ready backend.
    pub async fn new(database_url: &str, pool_size: u32, generator: KeyGenerator) -> Result<Self> {
        if database_url.is_empty() {
            return Err(ShortenerError::database_config("DATABASE_URL 未设置"));
        }
        let backend_name = infer_backend_from_url(database_url)?;

        let db = connection::open(database_url, backend_name, pool_size).await?;

        info!("{} storage initialized", backend_name.to_uppercase());
        Ok(RelationalBackend {
            db,
            backend_name,
            generator,
        })
    }

    /// 链接表是否为空（用于判断是否需要从快照恢复）
    pub async fn is_empty(&self) -> Result<bool> {
        let count = LinkEntity::find()
            .count(&self.db)
            .await
            .map_err(|e| errors::map_db_err("统计链接数量失败", e))?;
        Ok(count == 0)
    }
}

#[async_trait]
impl StorageBackend for RelationalBackend {
    fn backend_name(&self) -> &'static str {
        self.backend_name
    }

    async fn new_short(
        &self,
        cancel: &CancellationToken,
        url: &str,
        owner_id: Option<&str>,
    ) -> Result<ShortKey> {
        self.insert_new(cancel, url, owner_id).await
    }

    async fn get_by_key(&self, cancel: &CancellationToken, key: &str) -> Result<String> {
        let Some(sk) = ShortKey::parse(key) else {
            return Err(ShortenerError::not_found(key));
        };
        run_cancellable(cancel, self.find_by_key(sk)).await
    }

    async fn get_by_url(&self, cancel: &CancellationToken, url: &str) -> Result<Option<ShortKey>> {
        run_cancellable(cancel, self.find_by_url(url)).await
    }

    async fn list_all(&self, cancel: &CancellationToken) -> Result<Store> {
        run_cancellable(cancel, self.load_all()).await
    }

    async fn list_by_owner(
        &self,
        cancel: &CancellationToken,
        owner_id: &str,
    ) -> Result<Vec<StoredLink>> {
        if owner_id.is_empty() {
            return Err(ShortenerError::validation("用户 ID 不能为空"));
        }
        run_cancellable(cancel, self.load_by_owner(owner_id)).await
    }

    async fn create_batch(
        &self,
        cancel: &CancellationToken,
        items: &[BatchItem],
        owner_id: Option<&str>,
        url_prefix: &str,
    ) -> Result<Vec<BatchResult>> {
        self.insert_batch(cancel, items, owner_id, url_prefix).await
    }

    async fn delete_one(&self, owner_id: &str, key: &str) -> Result<bool> {
        self.mark_deleted(owner_id, key).await
    }

    async fn soft_delete(
        &self,
        cancel: &CancellationToken,
        owner_id: &str,
        keys: &[String],
    ) -> Result<u64> {
        BulkDeleter::new()
            .run(cancel, Arc::new(self.clone()), owner_id, keys)
            .await
    }

    async fn restore_all(&self, store: Store) -> Result<()> {
        self.insert_all(store).await
    }

    async fn ping(&self, cancel: &CancellationToken) -> Result<()> {
        run_cancellable(cancel, async {
            self.db.ping().await.map_err(|e| {
                ShortenerError::backend_unavailable(format!(
                    "{} 不可用: {}",
                    self.backend_name.to_uppercase(),
                    e
                ))
            })
        })
        .await
    }
}

#[async_trait]
impl UserRegistry for RelationalBackend {
    async fn new_user(&self, cancel: &CancellationToken) -> Result<User> {
        let user = User::new();
        run_cancellable(cancel, self.insert_user(&user)).await?;
        Ok(user)
    }

    async fn get_user(&self, cancel: &CancellationToken, id: &str) -> Result<User> {
        run_cancellable(cancel, self.find_user(id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_backend_from_url() {
        assert_eq!(infer_backend_from_url("sqlite://links.db?mode=rwc").unwrap(), "sqlite");
        assert_eq!(infer_backend_from_url("data/links.sqlite").unwrap(), "sqlite");
        assert_eq!(infer_backend_from_url("mariadb://u:p@host/db").unwrap(), "mysql");
        assert_eq!(
            infer_backend_from_url("postgresql://u:p@host/db").unwrap(),
            "postgres"
        );
        assert!(matches!(
            infer_backend_from_url("redis://localhost"),
            Err(ShortenerError::DatabaseConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_url_is_config_error() {
        let err = RelationalBackend::new("", 1, KeyGenerator::new())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, ShortenerError::DatabaseConfig(_)));
    }
}
