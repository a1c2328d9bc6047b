//! 应用配置模块

use crate::logging::LogConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// 配置文件名（位于应用数据目录）
pub const CONFIG_FILE_NAME: &str = "config.json";

/// 断点存储后端
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointBackend {
    #[default]
    Json,
    Sqlite,
}

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    /// adb 可执行文件路径，未设置时自动查找
    #[serde(default)]
    pub adb_path: Option<PathBuf>,
    /// 默认设备序列号
    #[serde(default)]
    pub device_serial: Option<String>,
    #[serde(default)]
    pub checkpoint_backend: CheckpointBackend,
    /// 断点目录，未设置时使用 `<本地根>/.aps/checkpoints`
    #[serde(default)]
    pub checkpoint_dir: Option<PathBuf>,
    /// 同步日志文件，未设置时使用 `<本地根>/.aps/logs/sync.log`
    #[serde(default)]
    pub sync_log_path: Option<PathBuf>,
    /// 默认只同步的媒体扩展名
    #[serde(default = "default_media_extensions")]
    pub media_extensions: Vec<String>,
    #[serde(default)]
    pub log: LogConfig,
}

pub fn default_media_extensions() -> Vec<String> {
    [
        ".jpg", ".jpeg", ".png", ".heic", ".dng", ".webp", ".gif", ".bmp", ".tiff", ".mp4",
        ".mov", ".mkv", ".avi", ".3gp", ".flv", ".wmv",
    ]
    .iter()
    .map(|e| e.to_string())
    .collect()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            adb_path: None,
            device_serial: None,
            checkpoint_backend: CheckpointBackend::default(),
            checkpoint_dir: None,
            sync_log_path: None,
            media_extensions: default_media_extensions(),
            log: LogConfig::default(),
        }
    }
}

impl AppConfig {
    /// 从配置文件加载；文件不存在或无法解析时使用默认配置
    pub fn load(config_dir: &Path) -> Self {
        let config_file = config_dir.join(CONFIG_FILE_NAME);
        let Ok(content) = fs::read_to_string(&config_file) else {
            return Self::default();
        };

        match serde_json::from_str::<AppConfig>(&content) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("配置文件无法解析，使用默认配置: {} - {}", config_file.display(), e);
                Self::default()
            }
        }
    }

    /// 保存配置（保留文件中本结构不认识的字段）
    pub fn save(&self, config_dir: &Path) -> io::Result<()> {
        fs::create_dir_all(config_dir)?;
        let config_file = config_dir.join(CONFIG_FILE_NAME);

        // 读取现有配置
        let mut config: serde_json::Value = fs::read_to_string(&config_file)
            .ok()
            .and_then(|content| serde_json::from_str(&content).ok())
            .filter(serde_json::Value::is_object)
            .unwrap_or_else(|| serde_json::json!({}));

        let ours = serde_json::to_value(self).map_err(io::Error::other)?;
        if let (Some(target), serde_json::Value::Object(fields)) = (config.as_object_mut(), ours) {
            target.extend(fields);
        }

        let content = serde_json::to_string_pretty(&config).map_err(io::Error::other)?;
        fs::write(&config_file, content)
    }
}

/// 默认应用数据目录
pub fn default_data_dir() -> PathBuf {
    crate::dirs::config_dir()
        .map(|p| p.join("photosync"))
        .unwrap_or_else(|| PathBuf::from(".photosync"))
}

/// 由远端根与本地根确定性地生成断点键
pub fn create_checkpoint_key(remote_root: &str, local_root: &Path) -> String {
    let input = format!("{}|{}", remote_root, local_root.display());
    blake3::hash(input.as_bytes()).to_hex().to_string()
}
