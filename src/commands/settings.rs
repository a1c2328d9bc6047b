use super::AppContext;
use crate::config::CONFIG_FILE_NAME;
use anyhow::{Context, Result};

/// 打印当前生效的配置；`init` 时写入配置文件（保留已有的其他字段）
pub fn execute(init: bool, ctx: &AppContext) -> Result<()> {
    if init {
        ctx.config
            .save(&ctx.data_dir)
            .with_context(|| format!("写入配置失败: {}", ctx.data_dir.display()))?;
        tracing::info!("配置已写入 {}", ctx.data_dir.join(CONFIG_FILE_NAME).display());
    }

    println!("{}", serde_json::to_string_pretty(&ctx.config)?);
    println!("# {}", ctx.data_dir.join(CONFIG_FILE_NAME).display());
    Ok(())
}
