//! Batch creation with URL de-duplication.
//!
//! Every item is resolved independently: a URL that already has a live key
//! reuses it, anything else gets a fresh key. A URL whose records are all
//! soft-deleted is shortened again.

use tokio_util::sync::CancellationToken;

use super::StorageBackend;
use super::cancel::ensure_active;
use super::models::{BatchItem, BatchResult, ShortKey};
use crate::errors::{Result, ShortenerError};

/// 批量输入校验：非空，且每项的 correlation_id 与 URL 均非空
pub fn validate_batch(items: &[BatchItem]) -> Result<()> {
    if items.is_empty() {
        return Err(ShortenerError::validation("批量请求不能为空"));
    }
    for (idx, item) in items.iter().enumerate() {
        if item.correlation_id.trim().is_empty() {
            return Err(ShortenerError::validation(format!(
                "第 {} 项缺少 correlation_id",
                idx + 1
            )));
        }
        if item.original_url.trim().is_empty() {
            return Err(ShortenerError::validation(format!(
                "第 {} 项缺少 original_url",
                idx + 1
            )));
        }
    }
    Ok(())
}

pub fn short_url(prefix: &str, key: &ShortKey) -> String {
    format!("{}{}", prefix, key)
}

/// Item-by-item batch used by backends without a transactional path.
pub async fn create_each<B>(
    backend: &B,
    cancel: &CancellationToken,
    items: &[BatchItem],
    owner_id: Option<&str>,
    url_prefix: &str,
) -> Result<Vec<BatchResult>>
where
    B: StorageBackend + ?Sized,
{
    validate_batch(items)?;

    let mut results = Vec::with_capacity(items.len());
    for item in items {
        ensure_active(cancel)?;
        let key = match backend.get_by_url(cancel, &item.original_url).await {
            Ok(Some(key)) => key,
            Ok(None) | Err(ShortenerError::Deleted(_)) => {
                backend
                    .new_short(cancel, &item.original_url, owner_id)
                    .await?
            }
            Err(e) => return Err(e),
        };
        results.push(BatchResult {
            correlation_id: item.correlation_id.clone(),
            short_url: short_url(url_prefix, &key),
        });
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBackend;

    #[test]
    fn test_validate_batch() {
        assert!(validate_batch(&[]).is_err());
        assert!(validate_batch(&[BatchItem::new("", "https://a.example/")]).is_err());
        assert!(validate_batch(&[BatchItem::new("1", " ")]).is_err());
        assert!(validate_batch(&[BatchItem::new("1", "https://a.example/")]).is_ok());
    }

    #[tokio::test]
    async fn test_invalid_item_fails_before_any_write() {
        let backend = MemoryBackend::new();
        let items = vec![
            BatchItem::new("1", "https://a.example/"),
            BatchItem::new("2", ""),
        ];
        let err = backend
            .create_batch(&CancellationToken::new(), &items, None, "http://s/")
            .await
            .unwrap_err();
        assert!(matches!(err, ShortenerError::Validation(_)));
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_urls_in_one_batch_share_a_key() {
        let backend = MemoryBackend::new();
        let items = vec![
            BatchItem::new("1", "https://a.example/"),
            BatchItem::new("2", "https://a.example/"),
        ];
        let out = backend
            .create_batch(&CancellationToken::new(), &items, None, "http://s/")
            .await
            .unwrap();
        assert_eq!(out[0].short_url, out[1].short_url);
        assert_eq!(out[0].correlation_id, "1");
        assert_eq!(out[1].correlation_id, "2");
        assert_eq!(backend.len(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_batch() {
        let backend = MemoryBackend::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = backend
            .create_batch(&cancel, &[BatchItem::new("1", "https://a.example/")], None, "")
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }
}
