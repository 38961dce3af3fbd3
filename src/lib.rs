//! Checks the YCU academic portal for new grades and pings a WeChat follower when they change.

pub mod checker;
pub mod config;
pub mod models;
pub mod utils;

pub use checker::{compare, diff_by_course, run, DisabledNotifier, GradeSource, Notifier};
pub use config::Config;
pub use models::{Comparison, GradeChange, GradeRecord, GradeSnapshot, RunOutcome};
pub use utils::snapshot::SnapshotStore;
