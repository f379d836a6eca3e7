//! On-disk layout for downloaded, annotated and exported files.

pub mod manager;

pub use manager::{
    CategoryCounts, CategoryUsage, CleanupReport, JobDirectories, RetentionPolicy,
    StorageCategory, StorageManager, StorageStats, SweepFailure, SweepReport,
};
