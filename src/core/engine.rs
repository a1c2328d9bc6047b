//! 同步引擎
//!
//! 严格顺序执行计划：同一时刻只有一个传输在进行，每个文件成功后立即持久化断点，
//! 因此崩溃后重新运行最多重试正在传输的那一个文件。
//!
//! 取消是协作式的，只在两个动作之间检查。取消时正在进行的传输不会被打断：
//! 它可能完成、部分完成或失败，引擎都要等该动作返回后才会停止。

use crate::core::planner::SyncPlanner;
use crate::core::scanner::{FileScanner, ScanConfig};
use crate::error::{ProviderResult, SyncError};
use crate::models::{
    LogLevel, SyncAction, SyncActionType, SyncCheckpoint, SyncEvent, SyncLogEntry, SyncOptions,
    SyncPhase, SyncPlan, SyncProgress, SyncResult,
};
use crate::storage::{CheckpointStore, LocalFileProvider, RemoteFileProvider, SyncLogWriter};
use chrono::Utc;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// 同步引擎
pub struct SyncEngine {
    remote: Arc<dyn RemoteFileProvider>,
    local: Arc<dyn LocalFileProvider>,
    checkpoints: Arc<dyn CheckpointStore>,
    sync_log: Arc<dyn SyncLogWriter>,
    cancelled: Arc<AtomicBool>,
}

impl SyncEngine {
    pub fn new(
        remote: Arc<dyn RemoteFileProvider>,
        local: Arc<dyn LocalFileProvider>,
        checkpoints: Arc<dyn CheckpointStore>,
        sync_log: Arc<dyn SyncLogWriter>,
    ) -> Self {
        Self {
            remote,
            local,
            checkpoints,
            sync_log,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// 取消同步
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// 共享的取消标志（例如交给 Ctrl-C 处理）
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    /// 检查是否已取消
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// 加载断点、枚举两端并生成计划，不做任何传输
    pub async fn build_plan(
        &self,
        options: &SyncOptions,
    ) -> Result<(SyncCheckpoint, SyncPlan), SyncError> {
        options.validate()?;

        let checkpoint = self.checkpoints.load(&options.checkpoint_key).await;

        debug!("枚举远端文件: {} ({})", options.remote_root, self.remote.name());
        let remote_files = self
            .remote
            .list_files(&options.remote_root, options.recursive)
            .await
            .map_err(SyncError::RemoteEnumeration)?;

        let scanner = FileScanner::with_config(ScanConfig::with_extensions(
            options.allowed_extensions.as_deref(),
        ));
        let remote_files = scanner.filter_entries(remote_files);

        debug!("枚举本地文件: {}", options.local_root.display());
        let local_files = self
            .local
            .list_files(&options.local_root)
            .await
            .map_err(SyncError::LocalEnumeration)?;

        // 本次运行中的所有冲突改名共用这一时刻
        let plan = SyncPlanner::create_plan(&remote_files, &local_files, &checkpoint, Utc::now());

        info!(
            "同步计划: 远端 {} 个文件, 本地 {} 个文件, 待复制 {} 个",
            plan.total_files,
            local_files.len(),
            plan.pending_copies
        );

        Ok((checkpoint, plan))
    }

    /// 运行同步
    ///
    /// 只有配置错误与枚举失败会返回 `Err`；单个文件的失败计入结果中的错误数。
    pub async fn run(
        &self,
        options: &SyncOptions,
        progress_tx: Option<mpsc::Sender<SyncProgress>>,
    ) -> Result<SyncResult, SyncError> {
        let (mut checkpoint, plan) = self.build_plan(options).await?;

        info!(
            "开始同步: {} -> {}",
            options.remote_root,
            options.local_root.display()
        );

        let mut result = SyncResult {
            total_files: plan.total_files,
            ..Default::default()
        };

        self.write_log(
            SyncLogEntry::new(LogLevel::Info, SyncEvent::SyncStarted).details(format!(
                "Total={}, Pending={}",
                plan.total_files, plan.pending_copies
            )),
        )
        .await;

        self.send_progress(
            &progress_tx,
            Self::snapshot(SyncPhase::Planned, None, 0, &plan, &result),
        )
        .await;

        for (index, action) in plan.actions.iter().enumerate() {
            if self.is_cancelled() {
                info!("同步已取消，剩余 {} 个动作未执行", plan.actions.len() - index);
                result.is_cancelled = true;
                break;
            }

            if action.action_type.requires_copy() {
                self.copy_file(options, action, &mut checkpoint, &mut result)
                    .await;
            } else {
                result.skipped_files += 1;
                let reason = action.reason.map(|r| r.to_string()).unwrap_or_default();
                debug!("跳过: {} ({})", action.relative_path, reason);
                self.write_log(
                    SyncLogEntry::new(LogLevel::Info, SyncEvent::SyncSkipped)
                        .path(&action.relative_path)
                        .details(reason),
                )
                .await;
            }

            self.send_progress(
                &progress_tx,
                Self::snapshot(
                    SyncPhase::Syncing,
                    Some(&action.relative_path),
                    index + 1,
                    &plan,
                    &result,
                ),
            )
            .await;
        }

        self.write_log(
            SyncLogEntry::new(LogLevel::Info, SyncEvent::SyncCompleted).details(format!(
                "Copied={}, Skipped={}, Conflicts={}, Errors={}, Cancelled={}",
                result.copied_files,
                result.skipped_files,
                result.conflict_copies,
                result.error_files,
                result.is_cancelled
            )),
        )
        .await;

        let processed = result.copied_files
            + result.skipped_files
            + result.conflict_copies
            + result.error_files;
        self.send_progress(
            &progress_tx,
            Self::snapshot(SyncPhase::Finished, None, processed, &plan, &result),
        )
        .await;

        info!(
            "同步完成: 复制 {}, 跳过 {}, 冲突 {}, 失败 {}{}",
            result.copied_files,
            result.skipped_files,
            result.conflict_copies,
            result.error_files,
            if result.is_cancelled { " (已取消)" } else { "" }
        );

        Ok(result)
    }

    /// 执行单个复制动作；任何失败只影响这一个文件
    async fn copy_file(
        &self,
        options: &SyncOptions,
        action: &SyncAction,
        checkpoint: &mut SyncCheckpoint,
        result: &mut SyncResult,
    ) {
        let remote_path = options.remote_path(&action.relative_path);
        let local_path = options.local_path(&action.target_relative_path);

        if let Err(e) = self
            .transfer(&remote_path, &local_path, options.overwrite_existing)
            .await
        {
            result.error_files += 1;
            warn!("复制失败: {} - {}", action.relative_path, e);
            self.write_log(
                SyncLogEntry::new(LogLevel::Error, SyncEvent::SyncFailed)
                    .path(&action.relative_path)
                    .details(e.to_string()),
            )
            .await;
            return;
        }

        // 内存中的断点保留该路径，下一次成功保存时一并持久化
        *checkpoint = checkpoint.with_completed(&action.relative_path, Utc::now());
        if let Err(e) = self
            .checkpoints
            .save(&options.checkpoint_key, checkpoint)
            .await
        {
            result.error_files += 1;
            error!("保存断点失败: {} - {}", action.relative_path, e);
            self.write_log(
                SyncLogEntry::new(LogLevel::Error, SyncEvent::SyncFailed)
                    .path(&action.relative_path)
                    .details(format!("checkpoint save failed: {}", e)),
            )
            .await;
            return;
        }

        let entry = if action.action_type == SyncActionType::CopyWithRename {
            result.conflict_copies += 1;
            info!(
                "冲突改名复制: {} -> {}",
                action.relative_path, action.target_relative_path
            );
            SyncLogEntry::new(LogLevel::Warning, SyncEvent::SyncCopied)
                .details(format!("ConflictRename -> {}", action.target_relative_path))
        } else {
            result.copied_files += 1;
            debug!("已复制: {}", action.relative_path);
            SyncLogEntry::new(LogLevel::Info, SyncEvent::SyncCopied).details("Copied")
        };
        self.write_log(entry.path(&action.relative_path)).await;
    }

    async fn transfer(&self, remote_path: &str, local_path: &Path, overwrite: bool) -> ProviderResult<()> {
        if let Some(parent) = local_path.parent() {
            self.local.ensure_directory(parent).await?;
        }
        self.remote
            .transfer_to_local(remote_path, local_path, overwrite)
            .await
    }

    /// 写入同步日志，失败只记录警告
    async fn write_log(&self, entry: SyncLogEntry) {
        if let Err(e) = self.sync_log.write(&entry).await {
            warn!("写入同步日志失败: {:?} - {}", entry.message, e);
        }
    }

    fn snapshot(
        phase: SyncPhase,
        current_file: Option<&str>,
        processed: usize,
        plan: &SyncPlan,
        result: &SyncResult,
    ) -> SyncProgress {
        SyncProgress {
            phase,
            current_file: current_file.map(str::to_string),
            processed,
            total_actions: plan.actions.len(),
            pending_copies: plan.pending_copies,
            copied: result.copied_files,
            skipped: result.skipped_files,
            conflicts: result.conflict_copies,
            errors: result.error_files,
        }
    }

    async fn send_progress(
        &self,
        tx: &Option<mpsc::Sender<SyncProgress>>,
        progress: SyncProgress,
    ) {
        if let Some(tx) = tx {
            let _ = tx.send(progress).await;
        }
    }
}
