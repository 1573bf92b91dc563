use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::StaticConfig;
use crate::services::LinkService;
use crate::storage::{
    FileSnapshotBackend, KeyGenerator, PrimaryBackend, SnapshotCoordinator, StorageBackend,
    StorageFactory,
};

/// Everything the process needs after startup.
pub struct EngineContext {
    pub primary: Arc<dyn PrimaryBackend>,
    pub snapshot: Option<Arc<FileSnapshotBackend>>,
    pub link_service: Arc<LinkService>,
    /// 取消后所有进行中的存储操作尽快返回
    pub cancel: CancellationToken,
}

/// 创建存储后端，必要时从快照恢复，构建服务
pub async fn prepare_engine(config: &StaticConfig) -> Result<EngineContext> {
    let start_time = Instant::now();
    debug!("Preparing storage engine...");

    let generator = KeyGenerator::with_alphabet(&config.shortener.alphabet)
        .context("Invalid shortener.alphabet")?;

    let primary = StorageFactory::create(&config.storage, generator.clone())
        .await
        .context("Failed to create storage backend")?;
    info!("Using storage backend: {}", primary.backend.backend_name());

    let cancel = CancellationToken::new();
    let snapshot = StorageFactory::create_snapshot(&config.storage, generator).map(Arc::new);

    match (&snapshot, primary.fresh) {
        (Some(file), true) => {
            let restored =
                SnapshotCoordinator::restore(&cancel, file.as_ref(), primary.backend.as_ref())
                    .await
                    .with_context(|| {
                        format!("Failed to restore snapshot from {}", file.path().display())
                    })?;
            info!("Restored {} links from {}", restored, file.path().display());
        }
        (Some(_), false) => {
            info!("Primary store already has data, skipping snapshot restore");
        }
        (None, _) => {
            warn!("File storage path is empty, snapshots are disabled");
        }
    }

    let link_service = Arc::new(LinkService::new(
        primary.backend.clone(),
        config.url_prefix(),
    ));

    info!("Engine ready in {} ms", start_time.elapsed().as_millis());
    Ok(EngineContext {
        primary: primary.backend,
        snapshot,
        link_service,
        cancel,
    })
}
