//! Read paths.

use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use tracing::debug;

use super::RelationalBackend;
use super::converters::{model_to_entry, model_to_stored_link, model_to_user};
use super::errors::map_db_err;
use crate::errors::{Result, ShortenerError};
use crate::storage::models::{ShortKey, Store, StoredLink, User};
use migration::entities::{LinkEntity, UserEntity, link};

impl RelationalBackend {
    pub(super) async fn find_by_key(&self, key: ShortKey) -> Result<String> {
        let model = LinkEntity::find()
            .filter(link::Column::ShortKey.eq(key.as_str()))
            .one(&self.db)
            .await
            .map_err(|e| map_db_err("查询短码失败", e))?;

        match model {
            None => Err(ShortenerError::not_found(key.as_str())),
            Some(m) if m.is_deleted => Err(ShortenerError::deleted(key.as_str())),
            Some(m) => Ok(m.original_url),
        }
    }

    pub(super) async fn find_by_url(&self, url: &str) -> Result<Option<ShortKey>> {
        let models = LinkEntity::find()
            .filter(link::Column::OriginalUrl.eq(url))
            .order_by_asc(link::Column::IsDeleted)
            .all(&self.db)
            .await
            .map_err(|e| map_db_err("按 URL 查询失败", e))?;

        if models.is_empty() {
            return Ok(None);
        }
        match models.into_iter().find(|m| !m.is_deleted) {
            Some(live) => Ok(ShortKey::parse(&live.short_key)),
            None => Err(ShortenerError::deleted(url)),
        }
    }

    pub(super) async fn load_all(&self) -> Result<Store> {
        let models = LinkEntity::find()
            .all(&self.db)
            .await
            .map_err(|e| map_db_err("加载全部链接失败", e))?;

        let store: Store = models.into_iter().filter_map(model_to_entry).collect();
        debug!("Loaded {} links from {}", store.len(), self.backend_name);
        Ok(store)
    }

    pub(super) async fn load_by_owner(&self, owner_id: &str) -> Result<Vec<StoredLink>> {
        let models = LinkEntity::find()
            .filter(link::Column::OwnerId.eq(owner_id))
            .filter(link::Column::IsDeleted.eq(false))
            .order_by_asc(link::Column::ShortKey)
            .all(&self.db)
            .await
            .map_err(|e| map_db_err("查询用户链接失败", e))?;

        Ok(models.into_iter().filter_map(model_to_stored_link).collect())
    }

    pub(super) async fn find_user(&self, id: &str) -> Result<User> {
        UserEntity::find_by_id(id.to_string())
            .one(&self.db)
            .await
            .map_err(|e| map_db_err("查询用户失败", e))?
            .map(model_to_user)
            .ok_or_else(|| ShortenerError::not_found(format!("用户不存在: {}", id)))
    }
}
