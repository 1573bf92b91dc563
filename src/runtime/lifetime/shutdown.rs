use std::time::Duration;

use tokio::signal;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::EngineContext;
use crate::errors::{Result, ShortenerError};
use crate::storage::SnapshotCoordinator;

/// 关闭超时时间（秒）
pub const SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// 等待 Ctrl+C，然后执行关闭流程
pub async fn listen_for_shutdown(ctx: &EngineContext) -> Result<()> {
    match signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received, saving snapshot..."),
        Err(e) => warn!(
            "Failed to listen for Ctrl+C: {}. Proceeding with shutdown anyway.",
            e
        ),
    }
    perform_shutdown(ctx).await
}

/// Cancels in-flight storage work, then writes the primary store to the
/// snapshot file (if one is configured) within [`SHUTDOWN_TIMEOUT_SECS`].
pub async fn perform_shutdown(ctx: &EngineContext) -> Result<()> {
    ctx.cancel.cancel();

    let Some(snapshot) = &ctx.snapshot else {
        info!("No snapshot configured, nothing to save");
        return Ok(());
    };

    // 原令牌已取消，保存使用新令牌
    let save_token = CancellationToken::new();
    let save = SnapshotCoordinator::save(&save_token, ctx.primary.as_ref(), snapshot.as_ref());

    match timeout(Duration::from_secs(SHUTDOWN_TIMEOUT_SECS), save).await {
        Ok(Ok(count)) => {
            info!("Saved {} links to {}", count, snapshot.path().display());
            Ok(())
        }
        Ok(Err(e)) => {
            error!("Failed to save snapshot: {}", e);
            Err(e)
        }
        Err(_) => {
            save_token.cancel();
            error!(
                "Snapshot save timed out after {} seconds",
                SHUTDOWN_TIMEOUT_SECS
            );
            Err(ShortenerError::cancelled(format!(
                "保存快照超时（{} 秒）",
                SHUTDOWN_TIMEOUT_SECS
            )))
        }
    }
}
