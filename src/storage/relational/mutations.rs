//! Write paths.

use std::collections::BTreeSet;

use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, TransactionTrait,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::RelationalBackend;
use super::converters::{entry_to_active_model, user_to_active_model};
use super::errors::{is_unique_violation, map_db_err};
use crate::errors::{Result, ShortenerError};
use crate::storage::MAX_KEY_ATTEMPTS;
use crate::storage::batch::{short_url, validate_batch};
use crate::storage::cancel::{ensure_active, run_cancellable};
use crate::storage::models::{BatchItem, BatchResult, Record, ShortKey, Store, User};
use migration::entities::{LinkEntity, link};

fn keys_exhausted() -> ShortenerError {
    ShortenerError::backend_unavailable(format!(
        "尝试 {} 次后仍无法分配唯一短码",
        MAX_KEY_ATTEMPTS
    ))
}

impl RelationalBackend {
    /// 生成短码并插入，唯一约束冲突时换一个短码重试
    pub(super) async fn insert_new(
        &self,
        cancel: &CancellationToken,
        url: &str,
        owner_id: Option<&str>,
    ) -> Result<ShortKey> {
        for _ in 0..MAX_KEY_ATTEMPTS {
            ensure_active(cancel)?;
            let key = self.generator.generate();
            let model = entry_to_active_model(&key, &Record::new(url, owner_id));
            let outcome =
                run_cancellable(cancel, async { Ok(model.insert(&self.db).await) }).await?;
            match outcome {
                Ok(_) => return Ok(key),
                Err(e) if is_unique_violation(&e) => debug!("Short key collision: {}", key),
                Err(e) => return Err(map_db_err("插入链接失败", e)),
            }
        }
        Err(keys_exhausted())
    }

    /// 在一个事务中处理整批数据，任一条失败则全部回滚
    pub(super) async fn insert_batch(
        &self,
        cancel: &CancellationToken,
        items: &[BatchItem],
        owner_id: Option<&str>,
        url_prefix: &str,
    ) -> Result<Vec<BatchResult>> {
        validate_batch(items)?;

        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| map_db_err("开始事务失败", e))?;

        let mut results = Vec::with_capacity(items.len());
        for item in items {
            ensure_active(cancel)?;
            let existing = run_cancellable(cancel, find_live_key(&txn, &item.original_url)).await?;
            let key = match existing {
                Some(key) => key,
                None => {
                    let allocate = self.allocate_in(&txn, &item.original_url, owner_id);
                    run_cancellable(cancel, allocate).await?
                }
            };
            results.push(BatchResult {
                correlation_id: item.correlation_id.clone(),
                short_url: short_url(url_prefix, &key),
            });
        }

        txn.commit()
            .await
            .map_err(|e| map_db_err("提交事务失败", e))?;
        debug!("Batch of {} items committed", results.len());
        Ok(results)
    }

    async fn allocate_in(
        &self,
        txn: &DatabaseTransaction,
        url: &str,
        owner_id: Option<&str>,
    ) -> Result<ShortKey> {
        for _ in 0..MAX_KEY_ATTEMPTS {
            let key = self.generator.generate();
            let taken = LinkEntity::find()
                .filter(link::Column::ShortKey.eq(key.as_str()))
                .count(txn)
                .await
                .map_err(|e| map_db_err("检查短码失败", e))?;
            if taken > 0 {
                debug!("Short key collision: {}", key);
                continue;
            }
            // 检查之后仍可能被并发写入抢占
            let model = entry_to_active_model(&key, &Record::new(url, owner_id));
            if insert_in_savepoint(txn, model)
                .await
                .map_err(|e| map_db_err("插入链接失败", e))?
            {
                return Ok(key);
            }
            debug!("Short key taken concurrently: {}", key);
        }
        Err(keys_exhausted())
    }

    pub(super) async fn mark_deleted(&self, owner_id: &str, key: &str) -> Result<bool> {
        if ShortKey::parse(key).is_none() {
            return Ok(false);
        }
        let result = LinkEntity::update_many()
            .col_expr(link::Column::IsDeleted, Expr::value(true))
            .filter(link::Column::ShortKey.eq(key))
            .filter(link::Column::OwnerId.eq(owner_id))
            .filter(link::Column::IsDeleted.eq(false))
            .exec(&self.db)
            .await
            .map_err(|e| map_db_err("删除链接失败", e))?;
        Ok(result.rows_affected == 1)
    }

    /// 在一个事务中逐条插入，已存在的短码跳过；其他错误回滚全部链接
    pub(super) async fn insert_all(&self, store: Store) -> Result<()> {
        let mut inserted = 0usize;
        let mut skipped = 0usize;
        let mut owners = BTreeSet::new();

        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| map_db_err("开始事务失败", e))?;

        for (key, record) in &store {
            if let Some(owner) = &record.owner_id {
                owners.insert(owner.clone());
            }
            let model = entry_to_active_model(key, record);
            if insert_in_savepoint(&txn, model)
                .await
                .map_err(|e| map_db_err("恢复链接失败", e))?
            {
                inserted += 1;
            } else {
                debug!("Skipping existing key {} during restore", key);
                skipped += 1;
            }
        }

        txn.commit()
            .await
            .map_err(|e| map_db_err("提交事务失败", e))?;

        for owner in owners {
            let user = User {
                id: owner,
                created_at: chrono::Utc::now(),
            };
            if let Err(e) = self.insert_user(&user).await {
                warn!("Failed to register restored owner {}: {}", user.id, e);
            }
        }

        info!(
            "Restored {} links into {} ({} already present)",
            inserted, self.backend_name, skipped
        );
        Ok(())
    }

    pub(super) async fn insert_user(&self, user: &User) -> Result<()> {
        match user_to_active_model(user).insert(&self.db).await {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Ok(()),
            Err(e) => Err(map_db_err("创建用户失败", e)),
        }
    }
}

/// 在保存点内插入一行。唯一约束冲突时只回滚该保存点并返回 `false`，
/// 外层事务保持可用（PostgreSQL 中失败语句会中止整个事务）。
async fn insert_in_savepoint(
    txn: &DatabaseTransaction,
    model: link::ActiveModel,
) -> std::result::Result<bool, DbErr> {
    let savepoint = txn.begin().await?;
    match model.insert(&savepoint).await {
        Ok(_) => {
            savepoint.commit().await?;
            Ok(true)
        }
        Err(e) if is_unique_violation(&e) => {
            savepoint.rollback().await?;
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

async fn find_live_key<C: ConnectionTrait>(conn: &C, url: &str) -> Result<Option<ShortKey>> {
    let model = LinkEntity::find()
        .filter(link::Column::OriginalUrl.eq(url))
        .filter(link::Column::IsDeleted.eq(false))
        .one(conn)
        .await
        .map_err(|e| map_db_err("按 URL 查询失败", e))?;
    Ok(model.and_then(|m| ShortKey::parse(&m.short_key)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::KeyGenerator;
    use tempfile::TempDir;

    async fn temp_backend() -> (RelationalBackend, TempDir) {
        let dir = TempDir::new().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("m.db").display());
        let backend = RelationalBackend::new(&url, 2, KeyGenerator::new())
            .await
            .unwrap();
        (backend, dir)
    }

    #[tokio::test]
    async fn test_conflicting_insert_keeps_transaction_usable() {
        let (backend, _dir) = temp_backend().await;
        let taken = ShortKey::parse("takenkey").unwrap();
        entry_to_active_model(&taken, &Record::new("https://first.example/", None))
            .insert(&backend.db)
            .await
            .unwrap();

        let txn = backend.db.begin().await.unwrap();
        let clash = entry_to_active_model(&taken, &Record::new("https://second.example/", None));
        assert!(!insert_in_savepoint(&txn, clash).await.unwrap());

        let free = ShortKey::parse("freekeyy").unwrap();
        let ok = entry_to_active_model(&free, &Record::new("https://second.example/", None));
        assert!(insert_in_savepoint(&txn, ok).await.unwrap());
        txn.commit().await.unwrap();

        let store = backend.load_all().await.unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store[&taken].original_url, "https://first.example/");
        assert_eq!(store[&free].original_url, "https://second.example/");
    }

    #[tokio::test]
    async fn test_allocate_in_skips_taken_keys() {
        // 两字符字母表：8 位短码空间只有 256 个
        let dir = TempDir::new().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("m.db").display());
        let backend = RelationalBackend::new(&url, 2, KeyGenerator::with_alphabet("ab").unwrap())
            .await
            .unwrap();

        let txn = backend.db.begin().await.unwrap();
        let mut keys = std::collections::HashSet::new();
        for i in 0..50 {
            let key = backend
                .allocate_in(&txn, &format!("https://{i}.example/"), None)
                .await
                .unwrap();
            assert!(keys.insert(key));
        }
        txn.commit().await.unwrap();
        assert_eq!(backend.load_all().await.unwrap().len(), 50);
    }
}
