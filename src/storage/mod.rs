pub mod adb;
pub mod checkpoint;
pub mod local;
pub mod log_writer;
pub mod sqlite;

use crate::config::{AppConfig, CheckpointBackend};
use crate::error::ProviderResult;
use crate::models::{FileEntry, SyncCheckpoint, SyncLogEntry};
use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use adb::{AdbDevice, AdbRemoteFileProvider};
pub use checkpoint::FileCheckpointStore;
pub use local::FileSystemLocalFileProvider;
pub use log_writer::FileLogWriter;
pub use sqlite::SqliteCheckpointStore;

// ============ 公共常量 ============

/// 本地根目录下的应用簿记目录（断点与同步日志），本地枚举时会跳过
pub const APP_DIR_NAME: &str = ".aps";

/// 远端文件访问接口，屏蔽具体传输通道（例如 adb）
#[async_trait]
pub trait RemoteFileProvider: Send + Sync {
    /// 列出远端根目录下的文件，路径相对于根目录；没有文件时返回空列表
    async fn list_files(&self, remote_root: &str, recursive: bool) -> ProviderResult<Vec<FileEntry>>;

    /// 将远端文件传输到本地指定路径
    ///
    /// 目标已存在且不允许覆盖时返回 `TargetExists`。
    async fn transfer_to_local(
        &self,
        remote_path: &str,
        local_path: &Path,
        overwrite: bool,
    ) -> ProviderResult<()>;

    /// 提供者名称（用于日志）
    fn name(&self) -> &str;
}

/// 本地文件访问接口
#[async_trait]
pub trait LocalFileProvider: Send + Sync {
    /// 列出本地根目录下的所有文件（不含目录），根目录不存在时返回空列表
    async fn list_files(&self, local_root: &Path) -> ProviderResult<Vec<FileEntry>>;

    /// 确保目录及其所有上级目录存在
    async fn ensure_directory(&self, path: &Path) -> ProviderResult<()>;
}

/// 同步断点存储
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// 加载断点；不存在或无法读取时返回空断点，从不失败
    async fn load(&self, checkpoint_key: &str) -> SyncCheckpoint;

    /// 持久化断点
    async fn save(&self, checkpoint_key: &str, checkpoint: &SyncCheckpoint) -> ProviderResult<()>;
}

/// 结构化同步日志输出
#[async_trait]
pub trait SyncLogWriter: Send + Sync {
    async fn write(&self, entry: &SyncLogEntry) -> ProviderResult<()>;
}

/// 默认断点目录：`<本地根>/.aps/checkpoints`
pub fn default_checkpoint_dir(local_root: &Path) -> PathBuf {
    local_root.join(APP_DIR_NAME).join("checkpoints")
}

/// 默认同步日志：`<本地根>/.aps/logs/sync.log`
pub fn default_sync_log_path(local_root: &Path) -> PathBuf {
    local_root.join(APP_DIR_NAME).join("logs").join("sync.log")
}

/// 根据配置创建断点存储实例
pub async fn create_checkpoint_store(
    config: &AppConfig,
    checkpoint_dir: &Path,
) -> Result<Arc<dyn CheckpointStore>> {
    match config.checkpoint_backend {
        CheckpointBackend::Json => {
            tracing::info!("使用 JSON 断点存储: {}", checkpoint_dir.display());
            Ok(Arc::new(FileCheckpointStore::new(checkpoint_dir)) as Arc<dyn CheckpointStore>)
        }
        CheckpointBackend::Sqlite => {
            let db_path = checkpoint_dir.join("checkpoints.db");
            tracing::info!("使用 SQLite 断点存储: {}", db_path.display());
            Ok(Arc::new(SqliteCheckpointStore::open(&db_path).await?) as Arc<dyn CheckpointStore>)
        }
    }
}
