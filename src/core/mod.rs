pub mod comparator;
pub mod conflict;
pub mod engine;
pub mod planner;
pub mod scanner;

pub use comparator::{Evidence, FileComparator, FileRelation};
pub use conflict::generate_conflict_name;
pub use engine::SyncEngine;
pub use planner::SyncPlanner;
pub use scanner::{FileScanner, ScanConfig};
