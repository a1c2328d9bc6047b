//! SQLite 断点存储

use super::CheckpointStore;
use crate::core::scanner::path_key;
use crate::error::ProviderResult;
use crate::models::SyncCheckpoint;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// 断点存储（SQLite 后端）
pub struct SqliteCheckpointStore {
    db: Arc<SqlitePool>,
}

impl SqliteCheckpointStore {
    /// 打开（必要时创建）数据库文件
    pub async fn open(db_path: &Path) -> ProviderResult<Self> {
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);

        // 单次运行只有一个写入者
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await?;

        Self::with_pool(pool).await
    }

    /// 使用已有连接池并初始化表结构
    pub async fn with_pool(pool: SqlitePool) -> ProviderResult<Self> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS checkpoint_paths (
                   checkpoint_key TEXT NOT NULL,
                   relative_path TEXT NOT NULL COLLATE NOCASE,
                   PRIMARY KEY (checkpoint_key, relative_path)
               )"#,
        )
        .execute(&pool)
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS checkpoints (
                   checkpoint_key TEXT PRIMARY KEY,
                   updated_at TEXT
               )"#,
        )
        .execute(&pool)
        .await?;

        Ok(Self { db: Arc::new(pool) })
    }

    async fn try_load(&self, checkpoint_key: &str) -> ProviderResult<SyncCheckpoint> {
        let paths = sqlx::query_as::<_, (String,)>(
            "SELECT relative_path FROM checkpoint_paths WHERE checkpoint_key = ? ORDER BY rowid",
        )
        .bind(checkpoint_key)
        .fetch_all(&*self.db)
        .await?;

        let updated_at = sqlx::query_as::<_, (Option<String>,)>(
            "SELECT updated_at FROM checkpoints WHERE checkpoint_key = ?",
        )
        .bind(checkpoint_key)
        .fetch_optional(&*self.db)
        .await?
        .and_then(|(value,)| value)
        .and_then(|value| DateTime::parse_from_rfc3339(&value).ok())
        .map(|dt| dt.with_timezone(&Utc));

        Ok(SyncCheckpoint::from_paths(
            paths.into_iter().map(|(path,)| path),
            updated_at,
        ))
    }
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    async fn load(&self, checkpoint_key: &str) -> SyncCheckpoint {
        match self.try_load(checkpoint_key).await {
            Ok(checkpoint) => {
                debug!("加载断点 {}: {} 条已完成记录", checkpoint_key, checkpoint.len());
                checkpoint
            }
            Err(e) => {
                warn!("读取断点失败，按空断点处理: {} - {}", checkpoint_key, e);
                SyncCheckpoint::empty()
            }
        }
    }

    /// 只写入差异：新增的路径插入，断点中已不存在的路径删除
    async fn save(&self, checkpoint_key: &str, checkpoint: &SyncCheckpoint) -> ProviderResult<()> {
        let mut tx = self.db.begin().await?;

        let existing = sqlx::query_as::<_, (String,)>(
            "SELECT relative_path FROM checkpoint_paths WHERE checkpoint_key = ?",
        )
        .bind(checkpoint_key)
        .fetch_all(&mut *tx)
        .await?;

        let existing_keys: HashSet<String> = existing.iter().map(|(p,)| path_key(p)).collect();

        for (path,) in &existing {
            if !checkpoint.contains(path) {
                sqlx::query("DELETE FROM checkpoint_paths WHERE checkpoint_key = ? AND relative_path = ?")
                    .bind(checkpoint_key)
                    .bind(path)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        for path in checkpoint.completed_paths() {
            if existing_keys.contains(&path_key(path)) {
                continue;
            }
            sqlx::query("INSERT OR IGNORE INTO checkpoint_paths (checkpoint_key, relative_path) VALUES (?, ?)")
                .bind(checkpoint_key)
                .bind(path)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query(
            r#"INSERT INTO checkpoints (checkpoint_key, updated_at) VALUES (?, ?)
               ON CONFLICT(checkpoint_key) DO UPDATE SET updated_at = excluded.updated_at"#,
        )
        .bind(checkpoint_key)
        .bind(checkpoint.updated_at_utc.map(|dt| dt.to_rfc3339()))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_store() -> SqliteCheckpointStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        SqliteCheckpointStore::with_pool(pool).await.unwrap()
    }

    #[tokio::test]
    async fn test_round_trip() {
        let store = memory_store().await;
        let now = Utc::now();
        let checkpoint = SyncCheckpoint::from_paths(["DCIM/IMG_0001.jpg", "DCIM/IMG_0002.jpg"], Some(now));

        store.save("device-001", &checkpoint).await.unwrap();
        let loaded = store.load("device-001").await;

        assert_eq!(loaded.len(), 2);
        assert!(loaded.contains("dcim/img_0001.jpg"));
        assert_eq!(loaded.updated_at_utc, Some(now));
    }

    #[tokio::test]
    async fn test_keys_are_isolated() {
        let store = memory_store().await;
        store
            .save("a", &SyncCheckpoint::from_paths(["x.jpg"], None))
            .await
            .unwrap();

        assert!(store.load("b").await.is_empty());
        assert_eq!(store.load("a").await.len(), 1);
    }

    #[tokio::test]
    async fn test_incremental_saves_and_removal() {
        let store = memory_store().await;
        let first = SyncCheckpoint::from_paths(["a.jpg", "b.jpg"], None);
        let second = first.with_completed("C.jpg", Utc::now());

        store.save("k", &first).await.unwrap();
        store.save("k", &second).await.unwrap();
        assert_eq!(store.load("k").await.len(), 3);

        let shrunk = SyncCheckpoint::from_paths(["A.JPG"], None);
        store.save("k", &shrunk).await.unwrap();
        let loaded = store.load("k").await;
        assert_eq!(loaded.len(), 1);
        assert!(loaded.contains("a.jpg"));
        assert_eq!(loaded.updated_at_utc, None);
    }

    #[tokio::test]
    async fn test_open_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nested").join("checkpoints.db");

        let store = SqliteCheckpointStore::open(&db_path).await.unwrap();
        store
            .save("k", &SyncCheckpoint::from_paths(["a.jpg"], None))
            .await
            .unwrap();

        assert!(db_path.exists());
        assert_eq!(store.load("k").await.len(), 1);
    }
}
