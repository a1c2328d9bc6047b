//! 命令行子命令实现

pub mod devices;
pub mod plan;
pub mod settings;
pub mod sync;

use crate::config::{create_checkpoint_key, AppConfig};
use crate::core::SyncEngine;
use crate::error::SyncError;
use crate::models::SyncOptions;
use crate::storage::{self, AdbRemoteFileProvider, FileLogWriter, FileSystemLocalFileProvider};
use anyhow::Result;
use clap::Args;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// 命令执行上下文
pub struct AppContext {
    pub data_dir: PathBuf,
    pub config: AppConfig,
}

/// `sync` 与 `plan` 共用的参数
#[derive(Debug, Clone, Args)]
pub struct SelectionArgs {
    /// 设备上的源目录，例如 /sdcard/DCIM
    #[arg(long)]
    pub remote: String,

    /// 本地备份目录
    #[arg(long)]
    pub local: PathBuf,

    /// adb 可执行文件路径
    #[arg(long)]
    pub adb: Option<PathBuf>,

    /// 设备序列号（连接多台设备时需要）
    #[arg(short, long)]
    pub serial: Option<String>,

    /// 断点键，默认由远端与本地目录生成
    #[arg(long)]
    pub checkpoint: Option<String>,

    /// 断点目录
    #[arg(long)]
    pub checkpoint_dir: Option<PathBuf>,

    /// 同步日志文件
    #[arg(long)]
    pub log: Option<PathBuf>,

    /// 允许覆盖已存在的本地文件
    #[arg(long)]
    pub overwrite: bool,

    /// 只同步远端根目录下的文件，不进入子目录
    #[arg(long)]
    pub no_recursive: bool,

    /// 同步所有文件，不按扩展名过滤
    #[arg(long, conflicts_with = "ext")]
    pub all: bool,

    /// 只同步这些扩展名，逗号分隔（例如 .jpg,.mp4）
    #[arg(long, value_delimiter = ',')]
    pub ext: Option<Vec<String>>,
}

impl SelectionArgs {
    pub fn to_options(&self, config: &AppConfig) -> SyncOptions {
        let checkpoint_key = self
            .checkpoint
            .clone()
            .filter(|key| !key.trim().is_empty())
            .unwrap_or_else(|| create_checkpoint_key(&self.remote, &self.local));

        let mut options = SyncOptions::new(self.remote.clone(), self.local.clone(), checkpoint_key);
        options.overwrite_existing = self.overwrite;
        options.recursive = !self.no_recursive;
        options.allowed_extensions = if self.all {
            None
        } else {
            Some(
                self.ext
                    .clone()
                    .unwrap_or_else(|| config.media_extensions.clone()),
            )
        };
        options
    }

    pub fn checkpoint_dir(&self, config: &AppConfig) -> PathBuf {
        self.checkpoint_dir
            .clone()
            .or_else(|| config.checkpoint_dir.clone())
            .unwrap_or_else(|| storage::default_checkpoint_dir(&self.local))
    }

    pub fn sync_log_path(&self, config: &AppConfig) -> PathBuf {
        self.log
            .clone()
            .or_else(|| config.sync_log_path.clone())
            .unwrap_or_else(|| storage::default_sync_log_path(&self.local))
    }
}

/// 查找 adb：命令行参数 > 配置文件 > 自动查找；找不到属于配置错误
pub fn resolve_adb(explicit: Option<&Path>, config: &AppConfig) -> Result<PathBuf, SyncError> {
    let explicit = explicit.or(config.adb_path.as_deref());
    AdbRemoteFileProvider::resolve_adb_path(explicit).ok_or_else(|| {
        SyncError::Config(match explicit {
            Some(path) => format!("找不到 adb: {}", path.display()),
            None => "找不到 adb，请安装 Android platform-tools 或使用 --adb 指定路径".to_string(),
        })
    })
}

/// 按参数与配置组装同步引擎
pub async fn create_engine(args: &SelectionArgs, ctx: &AppContext) -> Result<SyncEngine> {
    let adb_path = resolve_adb(args.adb.as_deref(), &ctx.config)?;
    let serial = args
        .serial
        .clone()
        .or_else(|| ctx.config.device_serial.clone());
    tracing::debug!("使用 adb: {} (设备 {:?})", adb_path.display(), serial);

    let remote = Arc::new(AdbRemoteFileProvider::new(adb_path, serial));
    let local = Arc::new(FileSystemLocalFileProvider::new());
    let checkpoints =
        storage::create_checkpoint_store(&ctx.config, &args.checkpoint_dir(&ctx.config)).await?;
    let sync_log = Arc::new(FileLogWriter::new(args.sync_log_path(&ctx.config)));

    Ok(SyncEngine::new(remote, local, checkpoints, sync_log))
}
