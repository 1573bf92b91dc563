use sea_orm::ActiveValue::Set;
use tracing::warn;

use crate::storage::models::{Record, ShortKey, StoredLink, User};
use migration::entities::{link, user};

/// 数据库中短码不合法的行会被跳过
pub fn model_to_entry(model: link::Model) -> Option<(ShortKey, Record)> {
    let Some(key) = ShortKey::parse(&model.short_key) else {
        warn!("Skipping row {} with invalid short key {:?}", model.id, model.short_key);
        return None;
    };
    Some((
        key,
        Record {
            id: model.id,
            original_url: model.original_url,
            owner_id: model.owner_id.filter(|o| !o.is_empty()),
            is_deleted: model.is_deleted,
        },
    ))
}

pub fn model_to_stored_link(model: link::Model) -> Option<StoredLink> {
    model_to_entry(model).map(|(key, record)| StoredLink { key, record })
}

pub fn entry_to_active_model(key: &ShortKey, record: &Record) -> link::ActiveModel {
    link::ActiveModel {
        id: Set(record.id.clone()),
        short_key: Set(key.to_string()),
        original_url: Set(record.original_url.clone()),
        owner_id: Set(record.owner_id.clone()),
        is_deleted: Set(record.is_deleted),
    }
}

pub fn model_to_user(model: user::Model) -> User {
    User {
        id: model.id,
        created_at: model.created_at,
    }
}

pub fn user_to_active_model(user: &User) -> user::ActiveModel {
    user::ActiveModel {
        id: Set(user.id.clone()),
        created_at: Set(user.created_at),
    }
}
