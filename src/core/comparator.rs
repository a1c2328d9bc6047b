use crate::models::FileFingerprint;

/// 判定所依据的证据层级
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evidence {
    /// 双方都有内容哈希
    ContentHash,
    /// 双方都有大小和修改时间
    SizeAndTime,
    /// 双方只有大小
    SizeOnly,
}

/// 文件比较结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileRelation {
    Equal(Evidence),
    Different(Evidence),
    /// 证据不足（任一方缺失指纹或没有可比较的字段）
    Unknown,
}

impl FileRelation {
    pub fn is_equal(self) -> bool {
        matches!(self, FileRelation::Equal(_))
    }
}

/// 指纹比较器
///
/// 证据优先级严格固定：哈希 > 大小+时间 > 仅大小。强证据一旦可用就直接决定结果，
/// 不会被某一侧碰巧存在的弱证据推翻。未知文件永远不视为相同。
pub struct FileComparator;

impl FileComparator {
    pub fn compare(remote: Option<&FileFingerprint>, local: Option<&FileFingerprint>) -> FileRelation {
        let (remote, local) = match (remote, local) {
            (Some(r), Some(l)) => (r, l),
            _ => return FileRelation::Unknown,
        };

        if let (Some(r), Some(l)) = (non_blank(&remote.content_hash), non_blank(&local.content_hash)) {
            return relation(r.eq_ignore_ascii_case(l), Evidence::ContentHash);
        }

        if let (Some(rs), Some(ls), Some(rt), Some(lt)) = (
            remote.size_bytes,
            local.size_bytes,
            remote.modified_time_utc,
            local.modified_time_utc,
        ) {
            return relation(rs == ls && rt == lt, Evidence::SizeAndTime);
        }

        if let (Some(rs), Some(ls)) = (remote.size_bytes, local.size_bytes) {
            return relation(rs == ls, Evidence::SizeOnly);
        }

        FileRelation::Unknown
    }
}

fn non_blank(hash: &Option<String>) -> Option<&str> {
    hash.as_deref().map(str::trim).filter(|h| !h.is_empty())
}

fn relation(equal: bool, evidence: Evidence) -> FileRelation {
    if equal {
        FileRelation::Equal(evidence)
    } else {
        FileRelation::Different(evidence)
    }
}
