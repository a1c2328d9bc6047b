use super::{LocalFileProvider, APP_DIR_NAME};
use crate::error::ProviderResult;
use crate::models::{FileEntry, FileFingerprint};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;
use walkdir::WalkDir;

/// 基于本地文件系统的文件提供者
#[derive(Debug, Clone, Default)]
pub struct FileSystemLocalFileProvider;

impl FileSystemLocalFileProvider {
    pub fn new() -> Self {
        Self
    }

    /// 规范化路径分隔符（统一使用 /）
    fn normalize_path(path: &Path) -> Option<String> {
        Some(path.to_str()?.replace('\\', "/"))
    }

    /// 大小 + 修改时间（UTC，秒精度）指纹
    fn fingerprint(metadata: &Metadata) -> FileFingerprint {
        let modified = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .and_then(|d| DateTime::<Utc>::from_timestamp(d.as_secs() as i64, 0));
        FileFingerprint::new(Some(metadata.len()), modified)
    }

    /// 获取单个本地文件条目，不存在或不是文件时返回 None
    pub async fn file_entry(&self, local_path: &Path) -> ProviderResult<Option<FileEntry>> {
        match fs::metadata(local_path).await {
            Ok(metadata) if metadata.is_file() => {
                let name = local_path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                Ok(Some(FileEntry::file(name, Some(Self::fingerprint(&metadata)))))
            }
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl LocalFileProvider for FileSystemLocalFileProvider {
    async fn list_files(&self, local_root: &Path) -> ProviderResult<Vec<FileEntry>> {
        if !local_root.exists() {
            debug!("本地根目录不存在: {}", local_root.display());
            return Ok(Vec::new());
        }

        let base: PathBuf = local_root.to_path_buf();

        // 使用 spawn_blocking 避免阻塞 async runtime
        let entries = tokio::task::spawn_blocking(move || {
            WalkDir::new(&base)
                .follow_links(false)
                .sort_by_file_name()
                .into_iter()
                .filter_entry(|entry| !(entry.depth() == 1 && entry.file_name() == APP_DIR_NAME))
                .filter_map(|e| e.ok())
                .filter(|entry| entry.file_type().is_file())
                .filter_map(|entry| {
                    let metadata = entry.metadata().ok()?;
                    let relative = entry.path().strip_prefix(&base).ok()?;
                    let relative_path = Self::normalize_path(relative)?;
                    Some(FileEntry::file(relative_path, Some(Self::fingerprint(&metadata))))
                })
                .collect::<Vec<_>>()
        })
        .await?;

        debug!("本地扫描完成: {} 个文件", entries.len());
        Ok(entries)
    }

    async fn ensure_directory(&self, path: &Path) -> ProviderResult<()> {
        fs::create_dir_all(path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_files_relative_and_skips_app_dir() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("DCIM").join("Camera")).unwrap();
        std::fs::create_dir_all(root.join(APP_DIR_NAME).join("checkpoints")).unwrap();
        std::fs::write(root.join("DCIM").join("Camera").join("a.jpg"), b"12345").unwrap();
        std::fs::write(root.join("top.png"), b"1").unwrap();
        std::fs::write(root.join(APP_DIR_NAME).join("checkpoints").join("k.json"), b"{}").unwrap();

        let files = FileSystemLocalFileProvider::new().list_files(root).await.unwrap();
        let mut paths: Vec<_> = files.iter().map(|f| f.relative_path.as_str()).collect();
        paths.sort();

        assert_eq!(paths, vec!["DCIM/Camera/a.jpg", "top.png"]);
        let photo = files
            .iter()
            .find(|f| f.relative_path == "DCIM/Camera/a.jpg")
            .unwrap();
        let fingerprint = photo.fingerprint.as_ref().unwrap();
        assert_eq!(fingerprint.size_bytes, Some(5));
        assert!(fingerprint.modified_time_utc.is_some());
        assert!(!photo.is_directory);
    }

    #[tokio::test]
    async fn test_missing_root_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let files = FileSystemLocalFileProvider::new()
            .list_files(&dir.path().join("missing"))
            .await
            .unwrap();
        assert!(files.is_empty());
    }

    #[tokio::test]
    async fn test_ensure_directory_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("a").join("b").join("c");
        let provider = FileSystemLocalFileProvider::new();

        provider.ensure_directory(&target).await.unwrap();
        provider.ensure_directory(&target).await.unwrap();
        assert!(target.is_dir());
    }

    #[tokio::test]
    async fn test_file_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.jpg");
        std::fs::write(&path, b"abc").unwrap();
        let provider = FileSystemLocalFileProvider::new();

        let entry = provider.file_entry(&path).await.unwrap().unwrap();
        assert_eq!(entry.relative_path, "x.jpg");
        assert_eq!(entry.fingerprint.unwrap().size_bytes, Some(3));
        assert!(provider.file_entry(dir.path()).await.unwrap().is_none());
        assert!(provider
            .file_entry(&dir.path().join("nope"))
            .await
            .unwrap()
            .is_none());
    }
}
