//! 同步计划生成
//!
//! 纯函数：同样的远端快照、本地快照、断点与时刻，总是得到同样的计划。

use crate::core::comparator::FileComparator;
use crate::core::conflict::generate_conflict_name;
use crate::core::scanner::{normalize_relative_path, path_key};
use crate::models::{ActionReason, FileEntry, SyncAction, SyncCheckpoint, SyncPlan};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::debug;

pub struct SyncPlanner;

impl SyncPlanner {
    /// 生成同步计划
    ///
    /// 动作顺序严格跟随远端条目的枚举顺序。目录与仅存在于本地的文件不产生动作。
    pub fn create_plan(
        remote_files: &[FileEntry],
        local_files: &[FileEntry],
        checkpoint: &SyncCheckpoint,
        now_utc: DateTime<Utc>,
    ) -> SyncPlan {
        let mut local_map: HashMap<String, &FileEntry> = HashMap::with_capacity(local_files.len());
        for local in local_files.iter().filter(|f| !f.is_directory) {
            local_map.entry(path_key(&local.relative_path)).or_insert(local);
        }

        let mut plan = SyncPlan::default();

        for remote in remote_files.iter().filter(|f| !f.is_directory) {
            let relative_path = normalize_relative_path(&remote.relative_path);
            plan.total_files += 1;

            if checkpoint.contains(&relative_path) {
                plan.actions
                    .push(SyncAction::skip(&relative_path, ActionReason::Checkpoint));
                continue;
            }

            let Some(local) = local_map.get(&path_key(&relative_path)) else {
                plan.actions.push(SyncAction::copy(&relative_path));
                plan.pending_copies += 1;
                continue;
            };

            let relation =
                FileComparator::compare(remote.fingerprint.as_ref(), local.fingerprint.as_ref());
            if relation.is_equal() {
                plan.actions
                    .push(SyncAction::skip(&relative_path, ActionReason::Identical));
            } else {
                let target = generate_conflict_name(&relative_path, now_utc);
                debug!("检测到冲突: {} ({:?}) -> {}", relative_path, relation, target);
                plan.actions
                    .push(SyncAction::copy_with_rename(&relative_path, target));
                plan.pending_copies += 1;
            }
        }

        plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::conflict::CONFLICT_MARKER;
    use crate::models::{FileFingerprint, SyncActionType};
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap()
    }

    fn photo(path: &str, size: u64, day: u32) -> FileEntry {
        FileEntry::file(path, Some(FileFingerprint::new(Some(size), Some(at(day)))))
    }

    #[test]
    fn test_skip_checkpoint_and_identical() {
        let remote = vec![photo("DCIM/IMG_0001.jpg", 100, 1), photo("DCIM/IMG_0002.jpg", 200, 2)];
        let local = vec![photo("DCIM/IMG_0002.jpg", 200, 2)];
        let checkpoint = SyncCheckpoint::from_paths(["DCIM/IMG_0001.jpg"], Some(Utc::now()));

        let plan = SyncPlanner::create_plan(&remote, &local, &checkpoint, Utc::now());

        assert_eq!(plan.total_files, 2);
        assert_eq!(plan.pending_copies, 0);
        assert_eq!(
            plan.actions,
            vec![
                SyncAction::skip("DCIM/IMG_0001.jpg", ActionReason::Checkpoint),
                SyncAction::skip("DCIM/IMG_0002.jpg", ActionReason::Identical),
            ]
        );
    }

    #[test]
    fn test_conflict_rename() {
        let remote = vec![photo("DCIM/IMG_0003.jpg", 300, 3)];
        let local = vec![photo("DCIM/IMG_0003.jpg", 999, 3)];
        let now = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();

        let plan = SyncPlanner::create_plan(&remote, &local, &SyncCheckpoint::empty(), now);

        assert_eq!(plan.actions.len(), 1);
        let action = &plan.actions[0];
        assert_eq!(action.action_type, SyncActionType::CopyWithRename);
        assert_eq!(action.reason, Some(ActionReason::Conflict));
        assert_ne!(action.target_relative_path, action.relative_path);
        assert!(action.target_relative_path.contains(CONFLICT_MARKER));
        assert!(action.target_relative_path.contains("20240201000000"));
        assert!(action.target_relative_path.starts_with("DCIM/"));
        assert!(action.target_relative_path.ends_with(".jpg"));
        assert_eq!(plan.pending_copies, 1);
    }

    #[test]
    fn test_new_file_is_copied_to_same_path() {
        let remote = vec![photo("DCIM/IMG_0004.jpg", 400, 4)];
        let plan = SyncPlanner::create_plan(&remote, &[], &SyncCheckpoint::empty(), Utc::now());

        assert_eq!(plan.actions, vec![SyncAction::copy("DCIM/IMG_0004.jpg")]);
        assert_eq!(plan.pending_copies, 1);
    }

    #[test]
    fn test_all_checkpointed_is_idempotent() {
        let remote = vec![
            photo("DCIM/a.jpg", 1, 1),
            photo("DCIM/b.jpg", 2, 2),
            photo("DCIM/c.jpg", 3, 3),
        ];
        // 本地内容与远端不同也不影响：断点优先
        let local = vec![photo("DCIM/b.jpg", 999, 9)];
        let checkpoint = SyncCheckpoint::from_paths(["dcim/A.JPG", "DCIM/b.jpg", "DCIM/c.jpg"], None);

        let plan = SyncPlanner::create_plan(&remote, &local, &checkpoint, Utc::now());

        assert_eq!(plan.pending_copies, 0);
        assert!(plan
            .actions
            .iter()
            .all(|a| a.action_type == SyncActionType::Skip && a.reason == Some(ActionReason::Checkpoint)));
    }

    #[test]
    fn test_hash_match_skips_despite_size_and_time() {
        let remote = vec![FileEntry::file(
            "DCIM/a.jpg",
            Some(FileFingerprint::new(Some(1), Some(at(1))).with_hash("ABC123")),
        )];
        let local = vec![FileEntry::file(
            "dcim/A.jpg",
            Some(FileFingerprint::new(Some(2), Some(at(2))).with_hash("abc123")),
        )];

        let plan = SyncPlanner::create_plan(&remote, &local, &SyncCheckpoint::empty(), Utc::now());
        assert_eq!(plan.actions, vec![SyncAction::skip("DCIM/a.jpg", ActionReason::Identical)]);
    }

    #[test]
    fn test_missing_remote_fingerprint_is_conflict() {
        let remote = vec![FileEntry::file("DCIM/a.jpg", None)];
        let local = vec![photo("DCIM/a.jpg", 1, 1)];

        let plan = SyncPlanner::create_plan(&remote, &local, &SyncCheckpoint::empty(), Utc::now());
        assert_eq!(plan.actions[0].action_type, SyncActionType::CopyWithRename);
    }

    #[test]
    fn test_directories_and_local_only_files_ignored() {
        let remote = vec![
            FileEntry::directory("DCIM"),
            photo("DCIM/z.jpg", 1, 1),
            photo("DCIM/a.jpg", 1, 1),
        ];
        let local = vec![FileEntry::directory("DCIM/z.jpg"), photo("DCIM/only_local.jpg", 5, 5)];

        let plan = SyncPlanner::create_plan(&remote, &local, &SyncCheckpoint::empty(), Utc::now());

        assert_eq!(plan.total_files, 2);
        // 本地同名目录不参与比较，z.jpg 仍按新文件复制；顺序与远端一致
        assert_eq!(
            plan.actions,
            vec![SyncAction::copy("DCIM/z.jpg"), SyncAction::copy("DCIM/a.jpg")]
        );
    }

    #[test]
    fn test_backslash_paths_are_normalized() {
        let remote = vec![FileEntry {
            relative_path: "DCIM\\b.jpg".to_string(),
            is_directory: false,
            fingerprint: None,
        }];
        let plan = SyncPlanner::create_plan(&remote, &[], &SyncCheckpoint::empty(), Utc::now());
        assert_eq!(plan.actions[0].relative_path, "DCIM/b.jpg");
    }
}
