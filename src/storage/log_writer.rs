use super::SyncLogWriter;
use crate::error::ProviderResult;
use crate::models::SyncLogEntry;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// 同步日志写入器：每条日志一行 JSON，只追加
pub struct FileLogWriter {
    log_file_path: PathBuf,
    /// 保证多行不会交错写入
    lock: Mutex<()>,
}

impl FileLogWriter {
    pub fn new(log_file_path: impl Into<PathBuf>) -> Self {
        Self {
            log_file_path: log_file_path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.log_file_path
    }
}

#[async_trait]
impl SyncLogWriter for FileLogWriter {
    async fn write(&self, entry: &SyncLogEntry) -> ProviderResult<()> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let _guard = self.lock.lock().await;

        if let Some(parent) = self.log_file_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_file_path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        Ok(())
    }
}
