use crate::models::FileEntry;
use std::path::Path;
use tracing::{debug, info};

/// 规范化相对路径分隔符（统一使用 /）
pub fn normalize_relative_path(path: &str) -> String {
    path.replace('\\', "/")
}

/// 相对路径比较键：规范化分隔符后转小写
pub fn path_key(path: &str) -> String {
    normalize_relative_path(path).to_lowercase()
}

/// 取相对路径最后一段的扩展名（小写，不含点）
pub fn extension_of(relative_path: &str) -> Option<String> {
    let normalized = normalize_relative_path(relative_path);
    let file_name = normalized.rsplit('/').next()?;
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty())
        .map(|e| e.to_lowercase())
}

/// 扫描过滤配置
#[derive(Debug, Clone, Default)]
pub struct ScanConfig {
    /// 仅包含的扩展名，大小写不敏感，可带或不带前导点
    ///
    /// `None` 表示不限制；`Some` 即使清理后为空也保持生效（此时没有文件通过）。
    pub include_extensions: Option<Vec<String>>,
}

impl ScanConfig {
    pub fn with_extensions(extensions: Option<&[String]>) -> Self {
        Self {
            include_extensions: extensions.map(|list| {
                list.iter()
                    .map(|e| e.trim().trim_start_matches('.').to_lowercase())
                    .filter(|e| !e.is_empty())
                    .collect()
            }),
        }
    }
}

/// 文件条目过滤器
#[derive(Debug, Clone, Default)]
pub struct FileScanner {
    config: ScanConfig,
}

impl FileScanner {
    pub fn with_config(config: ScanConfig) -> Self {
        Self { config }
    }

    /// 扩展名是否被允许；配置了过滤时无扩展名的文件一律排除
    pub fn is_allowed(&self, relative_path: &str) -> bool {
        let Some(allowed) = &self.config.include_extensions else {
            return true;
        };
        match extension_of(relative_path) {
            Some(ext) => allowed.iter().any(|e| *e == ext),
            None => false,
        }
    }

    /// 按配置过滤条目，保持原有顺序
    pub fn filter_entries(&self, entries: Vec<FileEntry>) -> Vec<FileEntry> {
        let before = entries.len();
        let mut dir_count = 0;

        let filtered: Vec<FileEntry> = entries
            .into_iter()
            .filter(|entry| {
                if entry.is_directory {
                    dir_count += 1;
                    return false;
                }
                let allowed = self.is_allowed(&entry.relative_path);
                if !allowed {
                    debug!("排除文件: {}", entry.relative_path);
                }
                allowed
            })
            .collect();

        if filtered.len() != before {
            info!(
                "过滤完成: 保留 {} 个, 目录 {} 个, 排除 {} 个",
                filtered.len(),
                dir_count,
                before - filtered.len()
            );
        }

        filtered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(extensions: &[&str]) -> FileScanner {
        let extensions: Vec<String> = extensions.iter().map(|e| e.to_string()).collect();
        FileScanner::with_config(ScanConfig::with_extensions(Some(&extensions)))
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("DCIM/IMG_0001.JPG").as_deref(), Some("jpg"));
        assert_eq!(extension_of("a.b/README"), None);
        assert_eq!(extension_of("DCIM/.nomedia"), None);
        assert_eq!(extension_of("DCIM\\clip.tar.MP4").as_deref(), Some("mp4"));
    }

    #[test]
    fn test_extension_filter_case_insensitive() {
        let scanner = filter(&[".jpg", "MP4"]);
        assert!(scanner.is_allowed("DCIM/IMG_0001.JPG"));
        assert!(scanner.is_allowed("Movies/clip.mp4"));
        assert!(!scanner.is_allowed("Docs/notes.txt"));
        assert!(!scanner.is_allowed("DCIM/no_extension"));
    }

    #[test]
    fn test_empty_filter_allows_everything() {
        let scanner = FileScanner::with_config(ScanConfig::with_extensions(None));
        assert!(scanner.is_allowed("DCIM/no_extension"));
    }

    #[test]
    fn test_blank_filter_still_active() {
        // 例如命令行传入 `--ext ,`
        let blanks = vec![String::new(), " ".to_string(), ".".to_string()];
        let scanner = FileScanner::with_config(ScanConfig::with_extensions(Some(&blanks)));
        assert!(!scanner.is_allowed("notes.txt"));
        assert!(!scanner.is_allowed("README"));

        let scanner = FileScanner::with_config(ScanConfig::with_extensions(Some(&[])));
        assert!(!scanner.is_allowed("DCIM/IMG_0001.jpg"));
    }

    #[test]
    fn test_filter_entries_keeps_order_and_drops_dirs() {
        let scanner = filter(&["jpg"]);
        let entries = vec![
            FileEntry::file("b.jpg", None),
            FileEntry::directory("DCIM"),
            FileEntry::file("c.txt", None),
            FileEntry::file("a.jpg", None),
        ];
        let kept: Vec<_> = scanner
            .filter_entries(entries)
            .into_iter()
            .map(|e| e.relative_path)
            .collect();
        assert_eq!(kept, vec!["b.jpg", "a.jpg"]);
    }
}
