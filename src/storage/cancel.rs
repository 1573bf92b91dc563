//! Cancellation helpers shared by the backends.

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::errors::{Result, ShortenerError};

/// 令牌已取消时返回 `Cancelled`
pub fn ensure_active(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(ShortenerError::cancelled("操作已取消"))
    } else {
        Ok(())
    }
}

/// Races `fut` against the token; whichever completes first wins.
///
/// A cancelled future is dropped, so for database calls the in-flight query is
/// abandoned by the driver rather than awaited.
pub async fn run_cancellable<T, F>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    ensure_active(cancel)?;
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ShortenerError::cancelled("操作已取消")),
        res = fut => res,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_ensure_active() {
        let token = CancellationToken::new();
        assert!(ensure_active(&token).is_ok());
        token.cancel();
        assert!(ensure_active(&token).unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn test_run_cancellable_completes() {
        let token = CancellationToken::new();
        let value = run_cancellable(&token, async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_run_cancellable_aborts_pending_future() {
        let token = CancellationToken::new();
        let child = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            child.cancel();
        });
        let res: Result<()> = run_cancellable(&token, async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        })
        .await;
        assert!(res.unwrap_err().is_cancelled());
    }
}
