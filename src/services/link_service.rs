//! Link service
//!
//! Caller-facing operations on top of the primary store. Keys are turned into
//! full short URLs here; the storage layer only deals in keys.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::errors::{Result, ShortenerError};
use crate::storage::batch::short_url;
use crate::storage::{
    BatchItem, BatchResult, PrimaryBackend, ShortKey, StorageBackend, User, UserRegistry,
};

/// 用户链接列表中的一项
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserLink {
    pub short_url: String,
    pub original_url: String,
}

pub struct LinkService {
    storage: Arc<dyn PrimaryBackend>,
    url_prefix: String,
}

impl LinkService {
    /// `url_prefix` is prepended verbatim to keys, e.g. `http://localhost:8080/`.
    pub fn new(storage: Arc<dyn PrimaryBackend>, url_prefix: impl Into<String>) -> Self {
        Self {
            storage,
            url_prefix: url_prefix.into(),
        }
    }

    pub fn short_url(&self, key: &ShortKey) -> String {
        short_url(&self.url_prefix, key)
    }

    /// Shortens `url`.
    ///
    /// A URL that already has a live key yields `AlreadyExists` carrying the
    /// existing short URL. A URL whose only records are deleted gets a new key.
    pub async fn shorten(
        &self,
        cancel: &CancellationToken,
        url: &str,
        owner_id: Option<&str>,
    ) -> Result<String> {
        if url.trim().is_empty() {
            return Err(ShortenerError::validation("URL 不能为空"));
        }

        match self.storage.get_by_url(cancel, url).await {
            Ok(Some(existing)) => {
                debug!("URL already shortened as {}", existing);
                return Err(ShortenerError::already_exists(self.short_url(&existing)));
            }
            Ok(None) => {}
            Err(e) if e.is_deleted() => debug!("URL was deleted before, shortening again"),
            Err(e) => return Err(e),
        }

        let key = self.storage.new_short(cancel, url, owner_id).await?;
        info!("Short link created: {}", key);
        Ok(self.short_url(&key))
    }

    pub async fn resolve(&self, cancel: &CancellationToken, key: &str) -> Result<String> {
        self.storage.get_by_key(cancel, key).await
    }

    pub async fn shorten_batch(
        &self,
        cancel: &CancellationToken,
        items: &[BatchItem],
        owner_id: Option<&str>,
    ) -> Result<Vec<BatchResult>> {
        let results = self
            .storage
            .create_batch(cancel, items, owner_id, &self.url_prefix)
            .await?;
        info!("Batch shortened {} URLs", results.len());
        Ok(results)
    }

    pub async fn user_links(
        &self,
        cancel: &CancellationToken,
        owner_id: &str,
    ) -> Result<Vec<UserLink>> {
        let links = self.storage.list_by_owner(cancel, owner_id).await?;
        Ok(links
            .into_iter()
            .map(|link| UserLink {
                short_url: self.short_url(&link.key),
                original_url: link.record.original_url,
            })
            .collect())
    }

    /// 软删除用户的链接，返回实际删除数量
    pub async fn delete_links(
        &self,
        cancel: &CancellationToken,
        owner_id: &str,
        keys: &[String],
    ) -> Result<u64> {
        let deleted = self.storage.soft_delete(cancel, owner_id, keys).await?;
        info!(
            "User {} deleted {} of {} requested links",
            owner_id,
            deleted,
            keys.len()
        );
        Ok(deleted)
    }

    pub async fn check_db(&self, cancel: &CancellationToken) -> Result<()> {
        self.storage.ping(cancel).await
    }

    pub async fn new_user(&self, cancel: &CancellationToken) -> Result<User> {
        self.storage.new_user(cancel).await
    }

    pub async fn get_user(&self, cancel: &CancellationToken, id: &str) -> Result<User> {
        self.storage.get_user(cancel, id).await
    }
}
