//! adb 远端文件提供者
//!
//! 通过 `adb shell find/stat` 枚举设备文件，通过 `adb pull` 传输。

use super::RemoteFileProvider;
use crate::error::{ProviderError, ProviderResult};
use crate::models::{FileEntry, FileFingerprint};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::ffi::OsStr;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, info, warn};

#[cfg(windows)]
const ADB_EXECUTABLE: &str = "adb.exe";
#[cfg(not(windows))]
const ADB_EXECUTABLE: &str = "adb";

/// 可执行文件所在目录向上查找 platform-tools 的最大层数
const MAX_ANCESTOR_DEPTH: usize = 6;

/// 已连接设备
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AdbDevice {
    pub serial: String,
    pub model: String,
    pub state: String,
}

impl fmt::Display for AdbDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.model, self.serial)
    }
}

/// 子进程输出
struct CommandOutput {
    status: Option<i32>,
    stdout: String,
    stderr: String,
}

impl CommandOutput {
    fn success(&self) -> bool {
        self.status == Some(0)
    }
}

pub struct AdbRemoteFileProvider {
    adb_path: PathBuf,
    device_serial: Option<String>,
    name: String,
}

impl AdbRemoteFileProvider {
    pub fn new(adb_path: impl Into<PathBuf>, device_serial: Option<String>) -> Self {
        let adb_path = adb_path.into();
        let name = match &device_serial {
            Some(serial) => format!("adb:{}", serial),
            None => "adb".to_string(),
        };
        Self {
            adb_path,
            device_serial,
            name,
        }
    }

    /// 查找 adb：显式路径 > PATH > 可执行文件上层目录中的 platform-tools
    pub fn resolve_adb_path(explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return path.is_file().then(|| path.to_path_buf());
        }

        if let Some(paths) = std::env::var_os("PATH") {
            if let Some(found) = std::env::split_paths(&paths)
                .map(|dir| dir.join(ADB_EXECUTABLE))
                .find(|candidate| candidate.is_file())
            {
                return Some(found);
            }
        }

        let exe = std::env::current_exe().ok()?;
        exe.ancestors()
            .skip(1)
            .take(MAX_ANCESTOR_DEPTH)
            .map(|dir| dir.join("platform-tools").join(ADB_EXECUTABLE))
            .find(|candidate| candidate.is_file())
    }

    /// 列出已连接的设备（`adb devices -l`）
    pub async fn list_devices(adb_path: &Path) -> ProviderResult<Vec<AdbDevice>> {
        let output = run_adb(adb_path, None, &["devices", "-l"]).await?;
        if !output.success() {
            warn!("adb devices 失败: {}", output.stderr.trim());
            return Ok(Vec::new());
        }
        Ok(parse_devices(&output.stdout))
    }

    async fn run<I, S>(&self, args: I) -> ProviderResult<CommandOutput>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        run_adb(&self.adb_path, self.device_serial.as_deref(), args).await
    }

    /// 一次 find + stat 批量获取路径、大小、修改时间；命令失败时返回 None
    async fn list_with_stat_batch(
        &self,
        remote_root: &str,
        recursive: bool,
    ) -> ProviderResult<Option<Vec<FileEntry>>> {
        let command = format!(
            "find {}{} -type f -exec stat -c '%n|%s|%Y' {{}} +",
            quote_for_shell(remote_root),
            depth_option(recursive)
        );

        let output = self.run(&["shell", command.as_str()]).await?;
        if !output.success() {
            debug!("批量 stat 失败，回退到逐个 stat: {}", output.stderr.trim());
            return Ok(None);
        }

        let files = output
            .stdout
            .lines()
            .filter_map(parse_stat_line)
            .map(|(path, size, secs)| {
                FileEntry::file(relative_to_root(remote_root, path), fingerprint_from(size, secs))
            })
            .collect();

        Ok(Some(files))
    }

    async fn list_with_per_file_stat(
        &self,
        remote_root: &str,
        recursive: bool,
    ) -> ProviderResult<Vec<FileEntry>> {
        let command = format!(
            "find {}{} -type f",
            quote_for_shell(remote_root),
            depth_option(recursive)
        );

        let output = self.run(&["shell", command.as_str()]).await?;
        if !output.success() {
            warn!("远端 find 失败，视为没有文件: {}", output.stderr.trim());
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for line in output.stdout.lines() {
            let remote_path = line.trim();
            if remote_path.is_empty() {
                continue;
            }
            let fingerprint = self.stat_fingerprint(remote_path).await?;
            files.push(FileEntry::file(
                relative_to_root(remote_root, remote_path),
                fingerprint,
            ));
        }

        Ok(files)
    }

    async fn stat_fingerprint(&self, remote_path: &str) -> ProviderResult<Option<FileFingerprint>> {
        let command = format!("stat -c '%s|%Y' {}", quote_for_shell(remote_path));
        let output = self.run(&["shell", command.as_str()]).await?;
        if !output.success() {
            return Ok(None);
        }

        let line = output.stdout.trim();
        let Some((size, secs)) = line.split_once('|') else {
            return Ok(None);
        };
        let Ok(size) = size.trim().parse::<u64>() else {
            return Ok(None);
        };
        Ok(fingerprint_from(Some(size), secs.trim().parse::<i64>().ok()))
    }
}

#[async_trait]
impl RemoteFileProvider for AdbRemoteFileProvider {
    async fn list_files(&self, remote_root: &str, recursive: bool) -> ProviderResult<Vec<FileEntry>> {
        info!("枚举远端文件: {} (recursive={})", remote_root, recursive);

        let files = match self.list_with_stat_batch(remote_root, recursive).await? {
            Some(files) => files,
            None => self.list_with_per_file_stat(remote_root, recursive).await?,
        };

        info!("远端共 {} 个文件", files.len());
        Ok(files)
    }

    async fn transfer_to_local(
        &self,
        remote_path: &str,
        local_path: &Path,
        overwrite: bool,
    ) -> ProviderResult<()> {
        // adb pull 自行覆盖已有文件，不预先删除
        if !overwrite && tokio::fs::try_exists(local_path).await? {
            return Err(ProviderError::TargetExists {
                path: local_path.to_path_buf(),
            });
        }

        debug!("adb pull {} -> {}", remote_path, local_path.display());
        let output = self
            .run([OsStr::new("pull"), OsStr::new(remote_path), local_path.as_os_str()])
            .await?;

        if !output.success() {
            return Err(ProviderError::TransferFailed {
                status: output.status,
                stderr: output.stderr.trim().to_string(),
            });
        }

        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

async fn run_adb<I, S>(adb_path: &Path, serial: Option<&str>, args: I) -> ProviderResult<CommandOutput>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = Command::new(adb_path);
    if let Some(serial) = serial.filter(|s| !s.is_empty()) {
        command.arg("-s").arg(serial);
    }
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = command
        .output()
        .await
        .map_err(|source| ProviderError::ToolUnavailable {
            path: adb_path.to_path_buf(),
            source,
        })?;

    Ok(CommandOutput {
        status: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

fn depth_option(recursive: bool) -> &'static str {
    if recursive {
        ""
    } else {
        " -maxdepth 1"
    }
}

/// 解析 `adb devices -l` 输出，跳过首行标题
pub fn parse_devices(output: &str) -> Vec<AdbDevice> {
    output
        .lines()
        .skip(1)
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let serial = parts.next()?;
            let state = parts.next()?;
            let model = parts
                .find_map(|p| p.strip_prefix("model:"))
                .unwrap_or("Unknown");
            Some(AdbDevice {
                serial: serial.to_string(),
                model: model.to_string(),
                state: state.to_string(),
            })
        })
        .collect()
}

/// 解析 `路径|大小|时间` 行，按最后两个 `|` 切分（路径本身可能包含 `|`）
fn parse_stat_line(line: &str) -> Option<(&str, Option<u64>, Option<i64>)> {
    let line = line.trim();
    let (rest, time) = line.rsplit_once('|')?;
    let (path, size) = rest.rsplit_once('|')?;
    if path.is_empty() {
        return None;
    }
    Some((path, size.trim().parse().ok(), time.trim().parse().ok()))
}

fn fingerprint_from(size: Option<u64>, epoch_secs: Option<i64>) -> Option<FileFingerprint> {
    let modified = epoch_secs.and_then(|s| DateTime::<Utc>::from_timestamp(s, 0));
    let fingerprint = FileFingerprint::new(size, modified);
    (!fingerprint.is_empty()).then_some(fingerprint)
}

/// 设备 shell 单引号转义
fn quote_for_shell(path: &str) -> String {
    format!("'{}'", path.replace('\'', "'\\''"))
}

/// 远端完整路径 -> 相对根目录的路径
fn relative_to_root(root: &str, full_path: &str) -> String {
    let root = root.trim_end_matches('/');
    match full_path.strip_prefix(root) {
        Some(rest) => rest.trim_start_matches('/').to_string(),
        None => full_path.to_string(),
    }
}
