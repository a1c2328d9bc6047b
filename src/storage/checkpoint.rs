//! 基于 JSON 文件的断点存储
//!
//! 每个断点键对应 `<目录>/<安全键>.json` 一个文件。

use super::CheckpointStore;
use crate::error::ProviderResult;
use crate::models::SyncCheckpoint;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

pub struct FileCheckpointStore {
    checkpoint_dir: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(checkpoint_dir: impl Into<PathBuf>) -> Self {
        Self {
            checkpoint_dir: checkpoint_dir.into(),
        }
    }

    /// 将断点键中不能出现在文件名里的字符替换为 `_`
    fn safe_key(checkpoint_key: &str) -> String {
        checkpoint_key
            .chars()
            .map(|ch| match ch {
                '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
                c if c.is_control() => '_',
                c => c,
            })
            .collect()
    }

    pub fn checkpoint_path(&self, checkpoint_key: &str) -> PathBuf {
        self.checkpoint_dir
            .join(format!("{}.json", Self::safe_key(checkpoint_key)))
    }

    /// 持久化目录项（重命名本身）；不支持的平台上忽略
    async fn sync_dir(dir: &Path) {
        #[cfg(unix)]
        {
            let synced = match fs::File::open(dir).await {
                Ok(handle) => handle.sync_all().await,
                Err(e) => Err(e),
            };
            if let Err(e) = synced {
                debug!("同步断点目录失败: {} - {}", dir.display(), e);
            }
        }
        #[cfg(not(unix))]
        let _ = dir;
    }

    async fn read(path: &Path) -> Option<SyncCheckpoint> {
        let content = match fs::read(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("读取断点失败，按空断点处理: {} - {}", path.display(), e);
                return None;
            }
        };

        match serde_json::from_slice::<SyncCheckpoint>(&content) {
            Ok(checkpoint) => Some(checkpoint),
            Err(e) => {
                warn!("断点文件损坏，按空断点处理: {} - {}", path.display(), e);
                None
            }
        }
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn load(&self, checkpoint_key: &str) -> SyncCheckpoint {
        let path = self.checkpoint_path(checkpoint_key);
        let checkpoint = Self::read(&path).await.unwrap_or_default();
        debug!("加载断点 {}: {} 条已完成记录", checkpoint_key, checkpoint.len());
        checkpoint
    }

    async fn save(&self, checkpoint_key: &str, checkpoint: &SyncCheckpoint) -> ProviderResult<()> {
        fs::create_dir_all(&self.checkpoint_dir).await?;
        let path = self.checkpoint_path(checkpoint_key);
        let data = serde_json::to_vec_pretty(checkpoint)?;

        // 先把临时文件刷到磁盘再重命名，掉电后不会留下空的断点文件
        let temp_path = path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&temp_path).await?;
            file.write_all(&data).await?;
            file.sync_all().await?;
        }
        fs::rename(&temp_path, &path).await?;
        Self::sync_dir(&self.checkpoint_dir).await;

        Ok(())
    }
}
