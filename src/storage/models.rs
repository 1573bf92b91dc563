use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 短码长度
pub const SHORT_KEY_LEN: usize = 8;

/// Fixed-length short key.
///
/// Stored as raw bytes so it is `Copy` and cheap to hash. Construction goes
/// through [`ShortKey::parse`] (or the key generator), so every value in the
/// system has exactly [`SHORT_KEY_LEN`] ASCII bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShortKey([u8; SHORT_KEY_LEN]);

impl ShortKey {
    /// 长度不符（或包含非 ASCII 字符）时返回 None
    pub fn parse(s: &str) -> Option<Self> {
        let bytes = s.as_bytes();
        if bytes.len() != SHORT_KEY_LEN || !bytes.is_ascii() {
            return None;
        }
        let mut buf = [0u8; SHORT_KEY_LEN];
        buf.copy_from_slice(bytes);
        Some(ShortKey(buf))
    }

    pub(crate) fn from_bytes(bytes: [u8; SHORT_KEY_LEN]) -> Self {
        ShortKey(bytes)
    }

    pub fn as_str(&self) -> &str {
        // 构造路径只接受 ASCII
        std::str::from_utf8(&self.0).unwrap_or_default()
    }
}

impl fmt::Display for ShortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ShortKey {
    type Err = crate::errors::ShortenerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ShortKey::parse(s).ok_or_else(|| crate::errors::ShortenerError::not_found(s))
    }
}

/// 存储的链接记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub id: String,
    pub original_url: String,
    pub owner_id: Option<String>,
    pub is_deleted: bool,
}

impl Record {
    pub fn new(original_url: &str, owner_id: Option<&str>) -> Self {
        Record {
            id: uuid::Uuid::new_v4().to_string(),
            original_url: original_url.to_string(),
            owner_id: owner_id.filter(|o| !o.is_empty()).map(str::to_string),
            is_deleted: false,
        }
    }

    pub fn is_owned_by(&self, owner_id: &str) -> bool {
        self.owner_id.as_deref() == Some(owner_id)
    }
}

/// 短码到记录的完整映射，快照保存/恢复时在后端之间传递
pub type Store = HashMap<ShortKey, Record>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredLink {
    pub key: ShortKey,
    pub record: Record,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new() -> Self {
        User {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: Utc::now(),
        }
    }
}

impl Default for User {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItem {
    pub correlation_id: String,
    pub original_url: String,
}

impl BatchItem {
    pub fn new(correlation_id: impl Into<String>, original_url: impl Into<String>) -> Self {
        BatchItem {
            correlation_id: correlation_id.into(),
            original_url: original_url.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    pub correlation_id: String,
    pub short_url: String,
}

/// Snapshot line format, one JSON object per record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub id: String,
    pub short_url: String,
    pub original_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_deleted: bool,
}

impl SnapshotRecord {
    pub fn from_entry(key: &ShortKey, record: &Record) -> Self {
        SnapshotRecord {
            id: record.id.clone(),
            short_url: key.to_string(),
            original_url: record.original_url.clone(),
            user_id: record.owner_id.clone(),
            is_deleted: record.is_deleted,
        }
    }

    /// 短码不合法时返回 None
    pub fn into_entry(self) -> Option<(ShortKey, Record)> {
        let key = ShortKey::parse(&self.short_url)?;
        Some((
            key,
            Record {
                id: self.id,
                original_url: self.original_url,
                owner_id: self.user_id.filter(|u| !u.is_empty()),
                is_deleted: self.is_deleted,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rejects_wrong_length() {
        assert!(ShortKey::parse("").is_none());
        assert!(ShortKey::parse("abc").is_none());
        assert!(ShortKey::parse("abcdefghi").is_none());
        assert!(ShortKey::parse("abcdefgh").is_some());
    }

    #[test]
    fn test_parse_rejects_multibyte() {
        // 8 字节但不是 ASCII
        assert_eq!("éabcdef".len(), SHORT_KEY_LEN);
        assert!(ShortKey::parse("éabcdef").is_none());
    }

    #[test]
    fn test_display_roundtrip() {
        let key = ShortKey::parse("AbCdEfGh").unwrap();
        assert_eq!(key.to_string(), "AbCdEfGh");
        assert_eq!(key.as_str(), "AbCdEfGh");
    }

    #[test]
    fn test_record_empty_owner_is_anonymous() {
        let record = Record::new("https://a.example/", Some(""));
        assert!(record.owner_id.is_none());
        assert!(!record.is_deleted);
        assert!(uuid::Uuid::parse_str(&record.id).is_ok());
    }

    #[test]
    fn test_snapshot_record_skips_defaults() {
        let key = ShortKey::parse("abcdefgh").unwrap();
        let record = Record::new("https://a.example/", None);
        let line = serde_json::to_string(&SnapshotRecord::from_entry(&key, &record)).unwrap();
        assert!(!line.contains("user_id"));
        assert!(!line.contains("is_deleted"));
        assert!(line.contains("\"short_url\":\"abcdefgh\""));
    }

    #[test]
    fn test_snapshot_record_invalid_key() {
        let rec = SnapshotRecord {
            id: "1".into(),
            short_url: "short".into(),
            original_url: "https://a.example/".into(),
            user_id: None,
            is_deleted: false,
        };
        assert!(rec.into_entry().is_none());
    }
}
