use super::{create_engine, AppContext, SelectionArgs};
use crate::models::{SyncAction, SyncActionType, SyncPlan};
use anyhow::Result;

/// 只生成并打印同步计划，不传输也不写断点
pub async fn execute(args: &SelectionArgs, ctx: &AppContext) -> Result<SyncPlan> {
    let options = args.to_options(&ctx.config);
    options.validate()?;

    let engine = create_engine(args, ctx).await?;
    let (checkpoint, plan) = engine.build_plan(&options).await?;

    for action in &plan.actions {
        println!("{}", describe(action));
    }
    println!(
        "total={} pending={} checkpointed={}",
        plan.total_files,
        plan.pending_copies,
        checkpoint.len()
    );

    Ok(plan)
}

pub fn describe(action: &SyncAction) -> String {
    match action.action_type {
        SyncActionType::Skip => match action.reason {
            Some(reason) => format!("skip   {} ({})", action.relative_path, reason),
            None => format!("skip   {}", action.relative_path),
        },
        SyncActionType::Copy => format!("copy   {}", action.relative_path),
        SyncActionType::CopyWithRename => format!(
            "rename {} -> {}",
            action.relative_path, action.target_relative_path
        ),
    }
}
