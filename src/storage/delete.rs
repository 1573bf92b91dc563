//! Concurrent soft deletion.
//!
//! A producer feeds keys into a bounded channel, a pool of workers performs
//! [`StorageBackend::delete_one`] per key and reports 0/1 on a results
//! channel, and the calling task aggregates the results. Every spawned task is
//! joined before `run` returns.

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::StorageBackend;
use crate::errors::{Result, ShortenerError};

pub struct BulkDeleter {
    workers: usize,
}

impl Default for BulkDeleter {
    fn default() -> Self {
        Self::new()
    }
}

impl BulkDeleter {
    /// 工作协程数量与 CPU 数量一致
    pub fn new() -> Self {
        Self::with_workers(num_cpus::get())
    }

    pub fn with_workers(workers: usize) -> Self {
        BulkDeleter {
            workers: workers.max(1),
        }
    }

    pub async fn run<B>(
        &self,
        cancel: &CancellationToken,
        target: Arc<B>,
        owner_id: &str,
        keys: &[String],
    ) -> Result<u64>
    where
        B: StorageBackend + ?Sized + 'static,
    {
        if owner_id.is_empty() {
            return Err(ShortenerError::validation("用户 ID 不能为空"));
        }
        if keys.is_empty() {
            return Ok(0);
        }

        let workers = self.workers.min(keys.len());
        // 出错或调用方取消时停止派发
        let stop = cancel.child_token();

        let (key_tx, key_rx) = mpsc::channel::<String>(workers);
        let key_rx = Arc::new(Mutex::new(key_rx));
        let (result_tx, mut result_rx) = mpsc::channel::<Result<bool>>(workers);

        let mut tasks = JoinSet::new();

        for _ in 0..workers {
            let key_rx = Arc::clone(&key_rx);
            let result_tx = result_tx.clone();
            let target = Arc::clone(&target);
            let owner = owner_id.to_string();
            let worker_stop = stop.clone();
            tasks.spawn(async move {
                loop {
                    let next = tokio::select! {
                        biased;
                        _ = worker_stop.cancelled() => None,
                        next = async { key_rx.lock().await.recv().await } => next,
                    };
                    let Some(key) = next else {
                        break;
                    };
                    // 已排队但尚未开始的短码不再处理
                    if worker_stop.is_cancelled() {
                        break;
                    }
                    let res = target.delete_one(&owner, &key).await;
                    if result_tx.send(res).await.is_err() {
                        break;
                    }
                }
            });
        }
        drop(result_tx);

        let pending: Vec<String> = keys.to_vec();
        let producer_stop = stop.clone();
        tasks.spawn(async move {
            for key in pending {
                tokio::select! {
                    biased;
                    _ = producer_stop.cancelled() => break,
                    sent = key_tx.send(key) => {
                        if sent.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        let mut deleted = 0u64;
        let mut first_error = None;
        while let Some(res) = result_rx.recv().await {
            match res {
                Ok(true) => deleted += 1,
                Ok(false) => {}
                Err(e) => {
                    if first_error.is_none() {
                        warn!("Soft delete failed, stopping dispatch: {}", e);
                        first_error = Some(e);
                        stop.cancel();
                    }
                }
            }
        }

        while let Some(joined) = tasks.join_next().await {
            joined?;
        }

        if let Some(e) = first_error {
            return Err(e);
        }
        if cancel.is_cancelled() {
            return Err(ShortenerError::cancelled(format!(
                "软删除已取消，已处理 {} 个短码",
                deleted
            )));
        }

        debug!(
            "Soft deleted {} of {} keys for owner {}",
            deleted,
            keys.len(),
            owner_id
        );
        Ok(deleted)
    }
}
