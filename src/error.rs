//! 错误类型
//!
//! `ProviderError` 是单个外部操作的可恢复错误，由引擎按文件隔离；
//! `SyncError` 表示整次同步无法开始或无法生成计划。

use std::path::PathBuf;
use thiserror::Error;

/// 外部提供者（远端、本地、断点存储、日志）单次操作的错误
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("目标文件已存在: {}", .path.display())]
    TargetExists { path: PathBuf },

    #[error("传输失败 (退出码 {status:?}): {stderr}")]
    TransferFailed { status: Option<i32>, stderr: String },

    #[error("无法启动外部工具 {}: {source}", .path.display())]
    ToolUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("序列化失败: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("后台任务失败: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// 同步运行级别的致命错误
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("配置错误: {0}")]
    Config(String),

    #[error("枚举远端文件失败: {0}")]
    RemoteEnumeration(#[source] ProviderError),

    #[error("枚举本地文件失败: {0}")]
    LocalEnumeration(#[source] ProviderError),
}

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;
