use crate::core::scanner::{normalize_relative_path, path_key};
use crate::error::SyncError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// 文件指纹信息，用于判断文件是否一致
///
/// 三项都是可选的：远端只能廉价地拿到什么就填什么。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileFingerprint {
    /// 文件大小（字节）
    pub size_bytes: Option<u64>,
    /// 修改时间（UTC）
    pub modified_time_utc: Option<DateTime<Utc>>,
    /// 内容哈希（十六进制）
    pub content_hash: Option<String>,
}

impl FileFingerprint {
    pub fn new(size_bytes: Option<u64>, modified_time_utc: Option<DateTime<Utc>>) -> Self {
        Self {
            size_bytes,
            modified_time_utc,
            content_hash: None,
        }
    }

    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.content_hash = Some(hash.into());
        self
    }

    /// 三项都缺失时视为没有指纹
    pub fn is_empty(&self) -> bool {
        self.size_bytes.is_none() && self.modified_time_utc.is_none() && self.content_hash.is_none()
    }
}

/// 文件条目，描述相对路径与指纹信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    /// 相对路径，统一使用正斜杠分隔
    pub relative_path: String,
    pub is_directory: bool,
    /// 目录永远没有指纹
    pub fingerprint: Option<FileFingerprint>,
}

impl FileEntry {
    pub fn file(relative_path: impl Into<String>, fingerprint: Option<FileFingerprint>) -> Self {
        Self {
            relative_path: normalize_relative_path(&relative_path.into()),
            is_directory: false,
            fingerprint,
        }
    }

    pub fn directory(relative_path: impl Into<String>) -> Self {
        Self {
            relative_path: normalize_relative_path(&relative_path.into()),
            is_directory: true,
            fingerprint: None,
        }
    }
}

/// 计划动作类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncActionType {
    Skip,
    Copy,
    CopyWithRename,
}

impl SyncActionType {
    /// 该动作是否需要从远端传输文件
    pub fn requires_copy(self) -> bool {
        !matches!(self, SyncActionType::Skip)
    }
}

/// 动作原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionReason {
    /// 断点中已记录完成
    Checkpoint,
    /// 指纹一致
    Identical,
    /// 本地同名文件指纹不一致，改名复制
    Conflict,
}

impl fmt::Display for ActionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionReason::Checkpoint => write!(f, "Checkpoint"),
            ActionReason::Identical => write!(f, "Identical"),
            ActionReason::Conflict => write!(f, "Conflict"),
        }
    }
}

/// 单个计划动作，创建后不可变
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncAction {
    pub relative_path: String,
    /// 仅在冲突改名时与 `relative_path` 不同
    pub target_relative_path: String,
    pub action_type: SyncActionType,
    pub reason: Option<ActionReason>,
}

impl SyncAction {
    pub fn skip(relative_path: &str, reason: ActionReason) -> Self {
        Self {
            relative_path: relative_path.to_string(),
            target_relative_path: relative_path.to_string(),
            action_type: SyncActionType::Skip,
            reason: Some(reason),
        }
    }

    pub fn copy(relative_path: &str) -> Self {
        Self {
            relative_path: relative_path.to_string(),
            target_relative_path: relative_path.to_string(),
            action_type: SyncActionType::Copy,
            reason: None,
        }
    }

    pub fn copy_with_rename(relative_path: &str, target_relative_path: String) -> Self {
        Self {
            relative_path: relative_path.to_string(),
            target_relative_path,
            action_type: SyncActionType::CopyWithRename,
            reason: Some(ActionReason::Conflict),
        }
    }
}

/// 同步断点：已确认传输完成的相对路径集合（大小写不敏感）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "CheckpointRecord", into = "CheckpointRecord")]
pub struct SyncCheckpoint {
    /// 规范化小写键 -> 首次记录时的原始路径
    completed: BTreeMap<String, String>,
    pub updated_at_utc: Option<DateTime<Utc>>,
}

impl SyncCheckpoint {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_paths<I, S>(paths: I, updated_at_utc: Option<DateTime<Utc>>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut checkpoint = Self {
            completed: BTreeMap::new(),
            updated_at_utc,
        };
        for path in paths {
            checkpoint.insert(path.as_ref());
        }
        checkpoint
    }

    pub fn contains(&self, relative_path: &str) -> bool {
        self.completed.contains_key(&path_key(relative_path))
    }

    /// 返回是否为新增路径
    pub fn insert(&mut self, relative_path: &str) -> bool {
        let key = path_key(relative_path);
        if self.completed.contains_key(&key) {
            return false;
        }
        self.completed
            .insert(key, normalize_relative_path(relative_path));
        true
    }

    /// 追加一条完成记录并刷新更新时间，生成新的断点快照
    pub fn with_completed(&self, relative_path: &str, now: DateTime<Utc>) -> Self {
        let mut next = self.clone();
        next.insert(relative_path);
        next.updated_at_utc = Some(now);
        next
    }

    pub fn completed_paths(&self) -> impl Iterator<Item = &str> {
        self.completed.values().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.completed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.completed.is_empty()
    }
}

/// 断点的持久化形式
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckpointRecord {
    #[serde(default)]
    completed_relative_paths: Vec<String>,
    #[serde(default)]
    updated_at_utc: Option<DateTime<Utc>>,
}

impl From<CheckpointRecord> for SyncCheckpoint {
    fn from(record: CheckpointRecord) -> Self {
        SyncCheckpoint::from_paths(record.completed_relative_paths, record.updated_at_utc)
    }
}

impl From<SyncCheckpoint> for CheckpointRecord {
    fn from(checkpoint: SyncCheckpoint) -> Self {
        CheckpointRecord {
            completed_relative_paths: checkpoint.completed.into_values().collect(),
            updated_at_utc: checkpoint.updated_at_utc,
        }
    }
}

/// 同步计划
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncPlan {
    pub actions: Vec<SyncAction>,
    pub total_files: usize,
    pub pending_copies: usize,
}

/// 同步结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    pub total_files: usize,
    pub copied_files: usize,
    pub skipped_files: usize,
    pub conflict_copies: usize,
    pub error_files: usize,
    pub is_cancelled: bool,
}

/// 同步选项
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// 远端根目录（设备上的路径）
    pub remote_root: String,
    /// 本地备份根目录
    pub local_root: PathBuf,
    /// 断点键，同一对根目录应保持一致
    pub checkpoint_key: String,
    /// 是否允许覆盖已存在的本地文件
    pub overwrite_existing: bool,
    /// 枚举远端时是否递归子目录
    pub recursive: bool,
    /// 仅同步这些扩展名（`None` 或空表示不限制）
    pub allowed_extensions: Option<Vec<String>>,
}

impl SyncOptions {
    pub fn new(
        remote_root: impl Into<String>,
        local_root: impl Into<PathBuf>,
        checkpoint_key: impl Into<String>,
    ) -> Self {
        Self {
            remote_root: remote_root.into(),
            local_root: local_root.into(),
            checkpoint_key: checkpoint_key.into(),
            overwrite_existing: false,
            recursive: true,
            allowed_extensions: None,
        }
    }

    pub fn validate(&self) -> Result<(), SyncError> {
        if self.remote_root.trim().is_empty() {
            return Err(SyncError::Config("未指定远端根目录".to_string()));
        }
        if self.local_root.as_os_str().is_empty() {
            return Err(SyncError::Config("未指定本地根目录".to_string()));
        }
        if self.checkpoint_key.trim().is_empty() {
            return Err(SyncError::Config("断点键不能为空".to_string()));
        }
        Ok(())
    }

    /// 远端完整路径：根目录 + 相对路径
    pub fn remote_path(&self, relative_path: &str) -> String {
        format!(
            "{}/{}",
            self.remote_root.trim_end_matches(['/', '\\']),
            relative_path
        )
    }

    /// 本地完整路径：根目录 + 相对路径（转换为平台分隔符）
    pub fn local_path(&self, relative_path: &str) -> PathBuf {
        relative_path
            .split('/')
            .filter(|segment| !segment.is_empty())
            .fold(self.local_root.clone(), |path, segment| path.join(segment))
    }
}

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

/// 同步日志事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncEvent {
    SyncStarted,
    SyncSkipped,
    SyncCopied,
    SyncFailed,
    SyncCompleted,
}

/// 结构化同步日志条目，只追加不改写
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncLogEntry {
    pub timestamp_utc: DateTime<Utc>,
    pub level: LogLevel,
    pub message: SyncEvent,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub relative_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub details: Option<String>,
}

impl SyncLogEntry {
    pub fn new(level: LogLevel, message: SyncEvent) -> Self {
        Self {
            timestamp_utc: Utc::now(),
            level,
            message,
            relative_path: None,
            details: None,
        }
    }

    pub fn path(mut self, relative_path: &str) -> Self {
        self.relative_path = Some(relative_path.to_string());
        self
    }

    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// 同步阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncPhase {
    Planned,
    Syncing,
    Finished,
}

/// 同步进度快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncProgress {
    pub phase: SyncPhase,
    pub current_file: Option<String>,
    /// 已处理的计划动作数
    pub processed: usize,
    pub total_actions: usize,
    pub pending_copies: usize,
    pub copied: usize,
    pub skipped: usize,
    pub conflicts: usize,
    pub errors: usize,
}
