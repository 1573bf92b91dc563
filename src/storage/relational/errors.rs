//! Driver error classification.
//!
//! Conflicts are detected from the database error code, never from the
//! message text.

use std::ops::Deref;

use sea_orm::error::RuntimeErr;
use sea_orm::{DbErr, SqlErr};

use crate::errors::ShortenerError;

/// SQLite 2067/1555, MySQL 1062, PostgreSQL 23505
const UNIQUE_VIOLATION_CODES: [&str; 4] = ["2067", "1555", "1062", "23505"];

fn sqlx_error(err: &DbErr) -> Option<&sea_orm::sqlx::Error> {
    match err {
        DbErr::Exec(RuntimeErr::SqlxError(e)) | DbErr::Query(RuntimeErr::SqlxError(e)) => {
            Some(e.deref())
        }
        _ => None,
    }
}

/// 唯一约束冲突（短码重复等）
pub fn is_unique_violation(err: &DbErr) -> bool {
    if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
        return true;
    }
    let Some(db_err) = sqlx_error(err).and_then(|e| e.as_database_error()) else {
        return false;
    };
    db_err.is_unique_violation()
        || db_err
            .code()
            .is_some_and(|code| UNIQUE_VIOLATION_CODES.contains(&&*code))
}

/// 连接类错误映射为 BackendUnavailable，其余为 DatabaseOperation
pub fn map_db_err(context: &str, err: DbErr) -> ShortenerError {
    match err {
        DbErr::ConnectionAcquire(_) | DbErr::Conn(_) => {
            ShortenerError::backend_unavailable(format!("{}: {}", context, err))
        }
        _ => ShortenerError::database_operation(format!("{}: {}", context, err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_driver_errors_are_not_conflicts() {
        assert!(!is_unique_violation(&DbErr::RecordNotFound("x".to_string())));
        assert!(!is_unique_violation(&DbErr::Custom("UNIQUE constraint failed".to_string())));
        assert!(!is_unique_violation(&DbErr::Exec(RuntimeErr::Internal(
            "duplicate key value violates unique constraint".to_string()
        ))));
    }

    #[test]
    fn test_map_db_err() {
        let err = map_db_err(
            "ping",
            DbErr::ConnectionAcquire(sea_orm::error::ConnAcquireErr::Timeout),
        );
        assert!(matches!(err, ShortenerError::BackendUnavailable(_)));
        let err = map_db_err("query", DbErr::Custom("bad".to_string()));
        assert!(matches!(err, ShortenerError::DatabaseOperation(_)));
    }
}
