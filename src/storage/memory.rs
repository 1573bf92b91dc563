//! In-memory backend.
//!
//! One `RwLock` guards the whole store. Reads take the shared lock, every
//! mutation takes the exclusive lock; `new_short` keeps it for the whole
//! generate/check/insert loop so concurrent allocations serialize.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::cancel::ensure_active;
use super::delete::BulkDeleter;
use super::keygen::KeyGenerator;
use super::models::{Record, ShortKey, Store, StoredLink, User};
use super::{MAX_KEY_ATTEMPTS, StorageBackend, UserRegistry};
use crate::errors::{Result, ShortenerError};

struct MemoryInner {
    data: RwLock<Store>,
    users: RwLock<HashMap<String, DateTime<Utc>>>,
    generator: KeyGenerator,
}

/// Cheap to clone: clones share the same store.
#[derive(Clone)]
pub struct MemoryBackend {
    inner: Arc<MemoryInner>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::with_generator(KeyGenerator::new())
    }

    pub fn with_generator(generator: KeyGenerator) -> Self {
        Self::from_store(Store::new(), generator)
    }

    pub fn from_store(store: Store, generator: KeyGenerator) -> Self {
        MemoryBackend {
            inner: Arc::new(MemoryInner {
                data: RwLock::new(store),
                users: RwLock::new(HashMap::new()),
                generator,
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.data.read().is_empty()
    }

    /// 当前数据的副本
    pub fn snapshot(&self) -> Store {
        self.inner.data.read().clone()
    }

    fn insert_new(
        &self,
        cancel: &CancellationToken,
        url: &str,
        owner_id: Option<&str>,
    ) -> Result<ShortKey> {
        let mut data = self.inner.data.write();
        for _ in 0..MAX_KEY_ATTEMPTS {
            ensure_active(cancel)?;
            let key = self.inner.generator.generate();
            if data.contains_key(&key) {
                debug!("Short key collision: {}", key);
                continue;
            }
            data.insert(key, Record::new(url, owner_id));
            return Ok(key);
        }
        Err(ShortenerError::backend_unavailable(format!(
            "尝试 {} 次后仍无法分配唯一短码",
            MAX_KEY_ATTEMPTS
        )))
    }

    fn lookup_key(&self, key: &str) -> Result<String> {
        let sk = ShortKey::parse(key).ok_or_else(|| ShortenerError::not_found(key))?;
        let data = self.inner.data.read();
        match data.get(&sk) {
            None => Err(ShortenerError::not_found(key)),
            Some(record) if record.is_deleted => Err(ShortenerError::deleted(key)),
            Some(record) => Ok(record.original_url.clone()),
        }
    }

    fn lookup_url(&self, url: &str) -> Result<Option<ShortKey>> {
        let data = self.inner.data.read();
        let mut deleted_match = false;
        for (key, record) in data.iter() {
            if record.original_url != url {
                continue;
            }
            if !record.is_deleted {
                return Ok(Some(*key));
            }
            deleted_match = true;
        }
        if deleted_match {
            Err(ShortenerError::deleted(url))
        } else {
            Ok(None)
        }
    }

    fn owned_links(&self, owner_id: &str) -> Vec<StoredLink> {
        let data = self.inner.data.read();
        let mut links: Vec<StoredLink> = data
            .iter()
            .filter(|(_, record)| record.is_owned_by(owner_id) && !record.is_deleted)
            .map(|(key, record)| StoredLink {
                key: *key,
                record: record.clone(),
            })
            .collect();
        links.sort_by(|a, b| a.key.cmp(&b.key));
        links
    }

    fn mark_deleted(&self, owner_id: &str, key: &str) -> bool {
        let Some(sk) = ShortKey::parse(key) else {
            return false;
        };
        let mut data = self.inner.data.write();
        match data.get_mut(&sk) {
            Some(record) if record.is_owned_by(owner_id) && !record.is_deleted => {
                record.is_deleted = true;
                true
            }
            _ => false,
        }
    }

    fn replace_all(&self, store: Store) {
        let now = Utc::now();
        {
            let mut users = self.inner.users.write();
            for owner in store.values().filter_map(|r| r.owner_id.as_ref()) {
                users.entry(owner.clone()).or_insert(now);
            }
        }
        *self.inner.data.write() = store;
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn new_short(
        &self,
        cancel: &CancellationToken,
        url: &str,
        owner_id: Option<&str>,
    ) -> Result<ShortKey> {
        self.insert_new(cancel, url, owner_id)
    }

    async fn get_by_key(&self, _cancel: &CancellationToken, key: &str) -> Result<String> {
        self.lookup_key(key)
    }

    async fn get_by_url(&self, _cancel: &CancellationToken, url: &str) -> Result<Option<ShortKey>> {
        self.lookup_url(url)
    }

    async fn list_all(&self, _cancel: &CancellationToken) -> Result<Store> {
        Ok(self.snapshot())
    }

    async fn list_by_owner(
        &self,
        _cancel: &CancellationToken,
        owner_id: &str,
    ) -> Result<Vec<StoredLink>> {
        if owner_id.is_empty() {
            return Err(ShortenerError::validation("用户 ID 不能为空"));
        }
        Ok(self.owned_links(owner_id))
    }

    async fn delete_one(&self, owner_id: &str, key: &str) -> Result<bool> {
        Ok(self.mark_deleted(owner_id, key))
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
        debug!("Replacing in-memory store with {} records", store.len());
        self.replace_all(store);
        Ok(())
    }

    async fn ping(&self, _cancel: &CancellationToken) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl UserRegistry for MemoryBackend {
    async fn new_user(&self, _cancel: &CancellationToken) -> Result<User> {
        let user = User::new();
        self.inner
            .users
            .write()
            .insert(user.id.clone(), user.created_at);
        Ok(user)
    }

    async fn get_user(&self, _cancel: &CancellationToken, id: &str) -> Result<User> {
        self.inner
            .users
            .read()
            .get(id)
            .map(|created_at| User {
                id: id.to_string(),
                created_at: *created_at,
            })
            .ok_or_else(|| ShortenerError::not_found(format!("用户不存在: {}", id)))
    }
}
