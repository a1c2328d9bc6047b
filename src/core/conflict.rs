use crate::core::scanner::normalize_relative_path;
use chrono::{DateTime, Utc};

/// 冲突文件名中的标记
pub const CONFLICT_MARKER: &str = "conflict";

/// 生成冲突文件名
///
/// `DCIM/IMG_0003.jpg` -> `DCIM/IMG_0003.conflict.20240201000000.jpg`。
/// 时间戳精确到秒，同一次运行的所有改名共用运行开始的时刻。
pub fn generate_conflict_name(relative_path: &str, now: DateTime<Utc>) -> String {
    let normalized = normalize_relative_path(relative_path);
    let (directory, file_name) = match normalized.rfind('/') {
        Some(pos) => (&normalized[..pos], &normalized[pos + 1..]),
        None => ("", normalized.as_str()),
    };

    // 以点开头且没有其他点的名字（如 .nomedia）视为没有扩展名
    let (stem, extension) = match file_name.rfind('.') {
        Some(pos) if pos > 0 => file_name.split_at(pos),
        _ => (file_name, ""),
    };

    let stamp = now.format("%Y%m%d%H%M%S");
    let conflict_name = format!("{}.{}.{}{}", stem, CONFLICT_MARKER, stamp, extension);

    if directory.is_empty() {
        conflict_name
    } else {
        format!("{}/{}", directory, conflict_name)
    }
}
