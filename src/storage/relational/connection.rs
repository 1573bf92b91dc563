//! Pool setup per database family, followed by schema migration.

use std::str::FromStr;
use std::time::Duration;

use sea_orm::sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
};
use sea_orm::{ConnectOptions, Database, DatabaseConnection, SqlxSqliteConnector};
use tracing::{debug, info};

use crate::errors::{Result, ShortenerError};
use migration::{Migrator, MigratorTrait};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(8);
const IDLE_TIMEOUT: Duration = Duration::from_secs(300);
/// 并发写入（短码分配、批量事务）等待 SQLite 写锁的上限
const SQLITE_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens a pool of at most `pool_size` connections and migrates the schema.
pub(super) async fn open(
    database_url: &str,
    backend_name: &str,
    pool_size: u32,
) -> Result<DatabaseConnection> {
    let pool_size = pool_size.max(1);
    let db = if backend_name == "sqlite" {
        connect_sqlite(database_url, pool_size).await?
    } else {
        connect_generic(database_url, backend_name, pool_size).await?
    };
    run_migrations(&db).await?;
    Ok(db)
}

/// WAL 模式：读取不阻塞写入；文件不存在时创建
fn sqlite_options(database_url: &str) -> Result<SqliteConnectOptions> {
    let opt = SqliteConnectOptions::from_str(database_url)
        .map_err(|e| ShortenerError::database_config(format!("SQLite URL 解析失败: {}", e)))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(SQLITE_BUSY_TIMEOUT);
    Ok(opt)
}

pub async fn connect_sqlite(database_url: &str, pool_size: u32) -> Result<DatabaseConnection> {
    let opt = sqlite_options(database_url)?;
    let pool = SqlitePoolOptions::new()
        .max_connections(pool_size.max(1))
        .acquire_timeout(CONNECT_TIMEOUT)
        .connect_with(opt)
        .await
        .map_err(|e| {
            ShortenerError::backend_unavailable(format!("无法连接到 SQLite 数据库: {}", e))
        })?;
    debug!("SQLite pool ready ({} connections max)", pool_size);
    Ok(SqlxSqliteConnector::from_sqlx_sqlite_pool(pool))
}

async fn connect_generic(
    database_url: &str,
    backend_name: &str,
    pool_size: u32,
) -> Result<DatabaseConnection> {
    let mut opt = ConnectOptions::new(database_url.to_owned());
    opt.max_connections(pool_size)
        .min_connections(pool_size.min(2))
        .connect_timeout(CONNECT_TIMEOUT)
        .acquire_timeout(CONNECT_TIMEOUT)
        .idle_timeout(IDLE_TIMEOUT)
        .sqlx_logging(false);

    Database::connect(opt).await.map_err(|e| {
        ShortenerError::backend_unavailable(format!(
            "{} 数据库不可达: {}",
            backend_name.to_uppercase(),
            e
        ))
    })
}

/// 建表（幂等）
pub async fn run_migrations(db: &DatabaseConnection) -> Result<()> {
    Migrator::up(db, None)
        .await
        .map_err(|e| ShortenerError::database_operation(format!("迁移失败: {}", e)))?;
    info!("Schema for links/users is up to date");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_unknown_sqlite_option_is_config_error() {
        let err = sqlite_options("sqlite://links.db?no_such_option=1").unwrap_err();
        assert!(matches!(err, ShortenerError::DatabaseConfig(_)));
    }

    #[tokio::test]
    async fn test_open_with_zero_pool_size() {
        let dir = TempDir::new().unwrap();
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("c.db").display());
        let db = open(&url, "sqlite", 0).await.unwrap();
        run_migrations(&db).await.unwrap();
    }
}
