pub mod models;
pub use models::*;

use crate::core::cursor::{CursorStore, SyncCursor, KEY_LAST_REVISION, KEY_LAST_SYNC, KEY_LAST_SYNC_CHECK};
use crate::core::Timestamp;
use crate::storage::Revision;
use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
pub use sqlx::SqlitePool;
use sqlx::{Sqlite, SqliteConnection};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// 打开数据库并运行迁移
pub async fn open_pool(db_path: &Path) -> Result<SqlitePool> {
    // Windows 路径需要转换反斜杠为正斜杠
    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid database path"))?
        .replace('\\', "/");

    let db = SqlitePoolOptions::new()
        .max_connections(5) // SQLite 单文件，不需要太多连接
        .acquire_timeout(Duration::from_secs(30))
        .idle_timeout(Duration::from_secs(600))
        .connect(&format!("sqlite:{}?mode=rwc", db_path_str))
        .await?;

    migrate(&db).await?;
    Ok(db)
}

/// 内存数据库（单连接，否则每个连接各有一份数据）
pub async fn open_memory_pool() -> Result<SqlitePool> {
    let db = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    migrate(&db).await?;
    Ok(db)
}

async fn migrate(db: &SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations").run(db).await?;
    Ok(())
}

/// 基于 SQLite 的游标存储
#[derive(Debug, Clone)]
pub struct SqliteCursorStore {
    db: Arc<SqlitePool>,
}

impl SqliteCursorStore {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    async fn put(conn: &mut SqliteConnection, key: &str, value: String) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query::<Sqlite>(
            r#"INSERT INTO sync_cursor (key, value, updated_at)
               VALUES (?, ?, ?)
               ON CONFLICT(key) DO UPDATE SET
                   value = excluded.value,
                   updated_at = excluded.updated_at"#,
        )
        .bind(key)
        .bind(value)
        .bind(now)
        .execute(conn)
        .await?;
        Ok(())
    }

    async fn put_one(&self, key: &str, value: String) -> Result<()> {
        let mut conn = self.db.acquire().await?;
        Self::put(&mut conn, key, value).await
    }
}

#[async_trait]
impl CursorStore for SqliteCursorStore {
    async fn get(&self) -> Result<SyncCursor> {
        let rows = sqlx::query_as::<_, CursorRow>("SELECT key, value, updated_at FROM sync_cursor")
            .fetch_all(&*self.db)
            .await?;

        let mut cursor = SyncCursor::default();
        for row in rows {
            match row.key.as_str() {
                KEY_LAST_REVISION => cursor.last_known_revision = Revision::new(row.value),
                // 无法解析时视为从未同步
                KEY_LAST_SYNC => cursor.last_sync_timestamp = row.value.parse().unwrap_or(0),
                KEY_LAST_SYNC_CHECK => cursor.last_attempt_timestamp = row.value.parse().ok(),
                other => tracing::debug!("忽略未知的游标键: {}", other),
            }
        }
        Ok(cursor)
    }

    async fn set_revision(&self, revision: &Revision) -> Result<()> {
        self.put_one(KEY_LAST_REVISION, revision.to_string()).await
    }

    async fn set_last_sync(&self, timestamp: Timestamp) -> Result<()> {
        self.put_one(KEY_LAST_SYNC, timestamp.to_string()).await
    }

    async fn set_last_attempt(&self, timestamp: Timestamp) -> Result<()> {
        self.put_one(KEY_LAST_SYNC_CHECK, timestamp.to_string()).await
    }

    /// 版本和时间在同一事务中写入
    async fn advance(&self, revision: &Revision, timestamp: Timestamp) -> Result<()> {
        let mut tx = self.db.begin().await?;
        Self::put(&mut tx, KEY_LAST_REVISION, revision.to_string()).await?;
        Self::put(&mut tx, KEY_LAST_SYNC, timestamp.to_string()).await?;
        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn setup_store() -> SqliteCursorStore {
        SqliteCursorStore::new(Arc::new(open_memory_pool().await.unwrap()))
    }

    #[tokio::test]
    async fn test_empty_cursor() {
        let store = setup_store().await;
        let cursor = store.get().await.unwrap();
        assert_eq!(cursor, SyncCursor::default());
    }

    #[tokio::test]
    async fn test_advance_and_reload() {
        let store = setup_store().await;
        let rev = Revision::new("rev-1").unwrap();
        store.advance(&rev, 12_345).await.unwrap();
        store.set_last_attempt(99).await.unwrap();

        let cursor = store.get().await.unwrap();
        assert_eq!(cursor.last_known_revision, Some(rev));
        assert_eq!(cursor.last_sync_timestamp, 12_345);
        assert_eq!(cursor.last_attempt_timestamp, Some(99));

        store.set_last_sync(20_000).await.unwrap();
        assert_eq!(store.get().await.unwrap().last_sync_timestamp, 20_000);
    }

    #[tokio::test]
    async fn test_unparsable_last_sync_reads_as_zero() {
        let store = setup_store().await;
        let mut conn = store.db.acquire().await.unwrap();
        SqliteCursorStore::put(&mut conn, KEY_LAST_SYNC, "NaN".to_string())
            .await
            .unwrap();
        drop(conn);

        assert_eq!(store.get().await.unwrap().last_sync_timestamp, 0);
    }

    #[tokio::test]
    async fn test_file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapsync.db");
        {
            let db = Arc::new(open_pool(&path).await.unwrap());
            let store = SqliteCursorStore::new(db.clone());
            store
                .advance(&Revision::new("persisted").unwrap(), 777)
                .await
                .unwrap();
            db.close().await;
        }

        let store = SqliteCursorStore::new(Arc::new(open_pool(&path).await.unwrap()));
        let cursor = store.get().await.unwrap();
        assert_eq!(cursor.last_known_revision.unwrap().as_str(), "persisted");
        assert_eq!(cursor.last_sync_timestamp, 777);
    }
}
