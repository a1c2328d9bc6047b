use super::{create_engine, AppContext, SelectionArgs};
use crate::models::{SyncPhase, SyncProgress, SyncResult};
use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::warn;

/// 执行同步
pub async fn execute(args: &SelectionArgs, ctx: &AppContext) -> Result<SyncResult> {
    let options = args.to_options(&ctx.config);
    options.validate()?;

    let engine = create_engine(args, ctx).await?;

    // Ctrl-C 只设置取消标志，正在传输的文件会先完成
    let cancel = engine.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("收到中断信号，当前文件处理完成后停止");
            cancel.store(true, Ordering::SeqCst);
        }
    });

    let (tx, rx) = mpsc::channel(64);
    let reporter = tokio::spawn(report_progress(rx));

    let outcome = engine.run(&options, Some(tx)).await;
    let _ = reporter.await;
    let result = outcome?;

    println!(
        "total={} copied={} skipped={} conflicts={} errors={} cancelled={}",
        result.total_files,
        result.copied_files,
        result.skipped_files,
        result.conflict_copies,
        result.error_files,
        result.is_cancelled
    );

    Ok(result)
}

fn sync_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} {msg:>10} [{bar:25.cyan/dim}] {pos}/{len} {prefix:.dim}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
    pb.set_style(style);
    pb.set_message("Syncing");
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// 把引擎的进度快照渲染成进度条，通道关闭时结束
async fn report_progress(mut rx: mpsc::Receiver<SyncProgress>) {
    let pb = sync_bar();

    while let Some(progress) = rx.recv().await {
        match progress.phase {
            SyncPhase::Planned => {
                pb.set_length(progress.total_actions as u64);
                pb.println(format!(
                    "{} 个文件，待复制 {} 个",
                    progress.total_actions, progress.pending_copies
                ));
            }
            SyncPhase::Syncing => {
                pb.set_position(progress.processed as u64);
                if let Some(file) = progress.current_file {
                    pb.set_prefix(file);
                }
            }
            SyncPhase::Finished => {
                pb.set_prefix("");
                pb.finish_with_message("Done");
            }
        }
    }

    if !pb.is_finished() {
        pb.finish_and_clear();
    }
}
