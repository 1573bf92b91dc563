//! Shared scenarios run against every backend.

#![allow(dead_code)]

use shortener::errors::ShortenerError;
use shortener::storage::{BatchItem, ShortKey, StorageBackend};
use tokio_util::sync::CancellationToken;

pub const PREFIX: &str = "http://localhost:8080/";

pub fn key_of(short_url: &str) -> String {
    short_url
        .strip_prefix(PREFIX)
        .unwrap_or_else(|| panic!("unexpected short url {short_url}"))
        .to_string()
}

/// a/b 创建 -> 批量 (a 复用, c 新建) -> 删除 c -> 校验
pub async fn abc_scenario(backend: &dyn StorageBackend) {
    let cancel = CancellationToken::new();
    let owner = Some("u1");

    let a = backend
        .new_short(&cancel, "https://a.example/", owner)
        .await
        .unwrap();
    let b = backend
        .new_short(&cancel, "https://b.example/", owner)
        .await
        .unwrap();
    assert_ne!(a, b);
    assert_eq!(
        backend.get_by_key(&cancel, a.as_str()).await.unwrap(),
        "https://a.example/"
    );
    assert_eq!(
        backend.get_by_key(&cancel, b.as_str()).await.unwrap(),
        "https://b.example/"
    );

    let items = vec![
        BatchItem::new("1", "https://a.example/"),
        BatchItem::new("2", "https://c.example/"),
    ];
    let results = backend
        .create_batch(&cancel, &items, owner, PREFIX)
        .await
        .unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].correlation_id, "1");
    assert_eq!(results[0].short_url, format!("{PREFIX}{a}"));
    assert_eq!(results[1].correlation_id, "2");
    let c = key_of(&results[1].short_url);
    assert_ne!(c, a.as_str());
    assert_ne!(c, b.as_str());
    assert_eq!(
        backend.get_by_key(&cancel, &c).await.unwrap(),
        "https://c.example/"
    );

    let deleted = backend
        .soft_delete(&cancel, "u1", std::slice::from_ref(&c))
        .await
        .unwrap();
    assert_eq!(deleted, 1);
    assert_eq!(
        backend.get_by_key(&cancel, &c).await.unwrap_err(),
        ShortenerError::Deleted(c.clone())
    );

    let owned: Vec<String> = backend
        .list_by_owner(&cancel, "u1")
        .await
        .unwrap()
        .into_iter()
        .map(|link| link.key.to_string())
        .collect();
    assert_eq!(owned.len(), 2);
    assert!(owned.contains(&a.to_string()));
    assert!(owned.contains(&b.to_string()));
    assert!(!owned.contains(&c));
}

/// 删除只作用于本人的、仍存活的链接
pub async fn ownership_scenario(backend: &dyn StorageBackend) {
    let cancel = CancellationToken::new();
    let mine = backend
        .new_short(&cancel, "https://mine.example/", Some("owner"))
        .await
        .unwrap();
    let theirs = backend
        .new_short(&cancel, "https://theirs.example/", Some("other"))
        .await
        .unwrap();
    let anonymous = backend
        .new_short(&cancel, "https://anon.example/", None)
        .await
        .unwrap();

    let keys = vec![
        mine.to_string(),
        theirs.to_string(),
        anonymous.to_string(),
        "missing1".to_string(),
        "bad".to_string(),
        mine.to_string(),
    ];
    let deleted = backend.soft_delete(&cancel, "owner", &keys).await.unwrap();
    assert_eq!(deleted, 1);

    assert!(backend
        .get_by_key(&cancel, mine.as_str())
        .await
        .unwrap_err()
        .is_deleted());
    assert!(backend.get_by_key(&cancel, theirs.as_str()).await.is_ok());
    assert!(backend.get_by_key(&cancel, anonymous.as_str()).await.is_ok());
}

pub async fn lookup_edge_cases(backend: &dyn StorageBackend) {
    let cancel = CancellationToken::new();
    for key in ["", "abc", "abcdefghijk"] {
        assert!(backend.get_by_key(&cancel, key).await.unwrap_err().is_not_found());
    }
    assert!(backend
        .get_by_key(&cancel, "zzzzzzzz")
        .await
        .unwrap_err()
        .is_not_found());
    assert_eq!(
        backend
            .get_by_url(&cancel, "https://never.example/")
            .await
            .unwrap(),
        None::<ShortKey>
    );
    assert!(matches!(
        backend.list_by_owner(&cancel, "").await.unwrap_err(),
        ShortenerError::Validation(_)
    ));
}

pub async fn batch_validation(backend: &dyn StorageBackend) {
    let cancel = CancellationToken::new();
    let items = vec![
        BatchItem::new("1", "https://ok.example/"),
        BatchItem::new("", "https://missing-id.example/"),
    ];
    let err = backend
        .create_batch(&cancel, &items, None, PREFIX)
        .await
        .unwrap_err();
    assert!(matches!(err, ShortenerError::Validation(_)));
    assert_eq!(
        backend
            .get_by_url(&cancel, "https://ok.example/")
            .await
            .unwrap(),
        None
    );
}
