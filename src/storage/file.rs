//! JSON-lines snapshot backend.
//!
//! The file holds one [`SnapshotRecord`] per line. It is meant for persistence
//! across restarts, not as a primary store: every operation loads the whole
//! file, and mutations rewrite it through a temp file + rename so a crash never
//! leaves a half-written snapshot behind.

use std::fs;
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::StorageBackend;
use super::keygen::KeyGenerator;
use super::memory::MemoryBackend;
use super::models::{BatchItem, BatchResult, ShortKey, SnapshotRecord, Store, StoredLink};
use crate::errors::{Result, ShortenerError};

pub struct FileSnapshotBackend {
    path: PathBuf,
    lock: Mutex<()>,
    generator: KeyGenerator,
}

impl FileSnapshotBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_generator(path, KeyGenerator::new())
    }

    pub fn with_generator(path: impl Into<PathBuf>, generator: KeyGenerator) -> Self {
        FileSnapshotBackend {
            path: path.into(),
            lock: Mutex::new(()),
            generator,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Store> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || read_snapshot(&path)).await?
    }

    async fn persist(&self, store: Store) -> Result<()> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_snapshot(&path, &store)).await?
    }

    /// 把快照载入一个临时的内存后端
    async fn load_memory(&self) -> Result<MemoryBackend> {
        Ok(MemoryBackend::from_store(
            self.load().await?,
            self.generator.clone(),
        ))
    }

    /// Writes back whatever `memory` changed relative to `before`, even when
    /// the operation itself ended in an error (e.g. cancelled half way).
    async fn persist_changes(&self, before: &Store, memory: &MemoryBackend) -> Result<()> {
        let current = memory.snapshot();
        if current != *before {
            self.persist(current).await?;
        }
        Ok(())
    }
}

fn read_snapshot(path: &Path) -> Result<Store> {
    let file = match fs::File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!("Snapshot file {} not found, starting empty", path.display());
            return Ok(Store::new());
        }
        Err(e) => {
            return Err(ShortenerError::file_operation(format!(
                "打开快照文件失败 {}: {}",
                path.display(),
                e
            )));
        }
    };

    let mut store = Store::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: SnapshotRecord = serde_json::from_str(&line).map_err(|e| {
            ShortenerError::serialization(format!(
                "解析快照第 {} 行失败 ({}): {}",
                idx + 1,
                path.display(),
                e
            ))
        })?;
        let short_url = record.short_url.clone();
        match record.into_entry() {
            Some((key, rec)) => {
                if store.insert(key, rec).is_some() {
                    warn!("Duplicate short key {} in snapshot, keeping the last", key);
                }
            }
            None => warn!(
                "Skipping snapshot line {} with invalid short key {:?}",
                idx + 1,
                short_url
            ),
        }
    }

    debug!("Loaded {} records from {}", store.len(), path.display());
    Ok(store)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

fn write_snapshot(path: &Path, store: &Store) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        fs::create_dir_all(parent)?;
    }

    let mut entries: Vec<(&ShortKey, _)> = store.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    let tmp = temp_path(path);
    {
        let mut writer = BufWriter::new(fs::File::create(&tmp)?);
        for (key, record) in entries {
            serde_json::to_writer(&mut writer, &SnapshotRecord::from_entry(key, record))?;
            writer.write_all(b"\n")?;
        }
        let file = writer
            .into_inner()
            .map_err(|e| ShortenerError::file_operation(format!("写入快照失败: {}", e)))?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path).map_err(|e| {
        ShortenerError::file_operation(format!(
            "替换快照文件失败 {} -> {}: {}",
            tmp.display(),
            path.display(),
            e
        ))
    })?;

    debug!("Wrote {} records to {}", store.len(), path.display());
    Ok(())
}

#[async_trait]
impl StorageBackend for FileSnapshotBackend {
    fn backend_name(&self) -> &'static str {
        "file"
    }

    async fn new_short(
        &self,
        cancel: &CancellationToken,
        url: &str,
        owner_id: Option<&str>,
    ) -> Result<ShortKey> {
        let _guard = self.lock.lock().await;
        let memory = self.load_memory().await?;
        let key = memory.new_short(cancel, url, owner_id).await?;
        self.persist(memory.snapshot()).await?;
        Ok(key)
    }

    async fn get_by_key(&self, cancel: &CancellationToken, key: &str) -> Result<String> {
        if ShortKey::parse(key).is_none() {
            return Err(ShortenerError::not_found(key));
        }
        let _guard = self.lock.lock().await;
        self.load_memory().await?.get_by_key(cancel, key).await
    }

    async fn get_by_url(&self, cancel: &CancellationToken, url: &str) -> Result<Option<ShortKey>> {
        let _guard = self.lock.lock().await;
        self.load_memory().await?.get_by_url(cancel, url).await
    }

    async fn list_all(&self, _cancel: &CancellationToken) -> Result<Store> {
        let _guard = self.lock.lock().await;
        self.load().await
    }

    async fn list_by_owner(
        &self,
        cancel: &CancellationToken,
        owner_id: &str,
    ) -> Result<Vec<StoredLink>> {
        let _guard = self.lock.lock().await;
        self.load_memory()
            .await?
            .list_by_owner(cancel, owner_id)
            .await
    }

    async fn create_batch(
        &self,
        cancel: &CancellationToken,
        items: &[BatchItem],
        owner_id: Option<&str>,
        url_prefix: &str,
    ) -> Result<Vec<BatchResult>> {
        let _guard = self.lock.lock().await;
        let before = self.load().await?;
        let memory = MemoryBackend::from_store(before.clone(), self.generator.clone());
        let outcome = memory
            .create_batch(cancel, items, owner_id, url_prefix)
            .await;
        self.persist_changes(&before, &memory).await?;
        outcome
    }

    async fn delete_one(&self, owner_id: &str, key: &str) -> Result<bool> {
        let _guard = self.lock.lock().await;
        let memory = self.load_memory().await?;
        let deleted = memory.delete_one(owner_id, key).await?;
        if deleted {
            self.persist(memory.snapshot()).await?;
        }
        Ok(deleted)
    }

    async fn soft_delete(
        &self,
        cancel: &CancellationToken,
        owner_id: &str,
        keys: &[String],
    ) -> Result<u64> {
        let _guard = self.lock.lock().await;
        let before = self.load().await?;
        let memory = MemoryBackend::from_store(before.clone(), self.generator.clone());
        let outcome = memory.soft_delete(cancel, owner_id, keys).await;
        self.persist_changes(&before, &memory).await?;
        outcome
    }

    async fn restore_all(&self, store: Store) -> Result<()> {
        let _guard = self.lock.lock().await;
        let count = store.len();
        self.persist(store).await?;
        info!("Snapshot saved to {} ({} records)", self.path.display(), count);
        Ok(())
    }

    async fn ping(&self, _cancel: &CancellationToken) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let target = dir.clone();
        let reachable = tokio::task::spawn_blocking(move || target.is_dir()).await?;
        if reachable {
            Ok(())
        } else {
            Err(ShortenerError::backend_unavailable(format!(
                "快照目录不可用: {}",
                dir.display()
            )))
        }
    }
}
