use super::{resolve_adb, AppContext};
use crate::storage::{AdbDevice, AdbRemoteFileProvider};
use anyhow::Result;
use std::path::Path;

/// 列出已连接的设备
pub async fn execute(adb: Option<&Path>, ctx: &AppContext) -> Result<Vec<AdbDevice>> {
    let adb_path = resolve_adb(adb, &ctx.config)?;
    let devices = AdbRemoteFileProvider::list_devices(&adb_path).await?;

    if devices.is_empty() {
        println!("没有已连接的设备");
    }
    for device in &devices {
        println!("{}\t{}", device, device.state);
    }

    Ok(devices)
}
