use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use serde::Serialize;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::StorageError;
use crate::sanitize::is_safe_component;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Top-level storage categories, each subdivided by job id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageCategory {
    Raw,
    Annotated,
    Artifact,
}

impl StorageCategory {
    pub const ALL: [StorageCategory; 3] = [
        StorageCategory::Raw,
        StorageCategory::Annotated,
        StorageCategory::Artifact,
    ];

    pub fn dir_name(&self) -> &'static str {
        match self {
            StorageCategory::Raw => "raw_pdfs",
            StorageCategory::Annotated => "annotated_pdfs",
            StorageCategory::Artifact => "artifacts",
        }
    }
}

/// Per-category retention windows in days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub raw_days: u64,
    pub annotated_days: u64,
    pub artifact_days: u64,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            raw_days: 30,
            annotated_days: 90,
            artifact_days: 30,
        }
    }
}

impl RetentionPolicy {
    pub fn window(&self, category: StorageCategory) -> Duration {
        let days = match category {
            StorageCategory::Raw => self.raw_days,
            StorageCategory::Annotated => self.annotated_days,
            StorageCategory::Artifact => self.artifact_days,
        };
        DAY.saturating_mul(days.min(u32::MAX as u64) as u32)
    }
}

/// Counts keyed by category, serialized with the on-disk directory names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryCounts {
    pub raw_pdfs: u64,
    pub annotated_pdfs: u64,
    pub artifacts: u64,
}

impl CategoryCounts {
    pub fn get(&self, category: StorageCategory) -> u64 {
        match category {
            StorageCategory::Raw => self.raw_pdfs,
            StorageCategory::Annotated => self.annotated_pdfs,
            StorageCategory::Artifact => self.artifacts,
        }
    }

    fn add(&mut self, category: StorageCategory, n: u64) {
        match category {
            StorageCategory::Raw => self.raw_pdfs += n,
            StorageCategory::Annotated => self.annotated_pdfs += n,
            StorageCategory::Artifact => self.artifacts += n,
        }
    }

    pub fn total(&self) -> u64 {
        self.raw_pdfs + self.annotated_pdfs + self.artifacts
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDirectories {
    pub raw: PathBuf,
    pub annotated: PathBuf,
    pub artifacts: PathBuf,
}

/// Files deleted by [`StorageManager::cleanup_job`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    pub job_id: String,
    pub deleted_files: CategoryCounts,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Job directories removed by a retention sweep.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub deleted_directories: CategoryCounts,
    pub errors: Vec<SweepFailure>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryUsage {
    pub bytes: u64,
    pub files: u64,
    pub jobs: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageStats {
    pub raw_pdfs: CategoryUsage,
    pub annotated_pdfs: CategoryUsage,
    pub artifacts: CategoryUsage,
    pub total_bytes: u64,
    pub total_files: u64,
}

impl StorageStats {
    pub fn category(&self, category: StorageCategory) -> &CategoryUsage {
        match category {
            StorageCategory::Raw => &self.raw_pdfs,
            StorageCategory::Annotated => &self.annotated_pdfs,
            StorageCategory::Artifact => &self.artifacts,
        }
    }
}

/// Owns the on-disk layout under a base directory.
///
/// There is no locking: callers only clean or sweep jobs that reached a
/// terminal state.
#[derive(Debug, Clone)]
pub struct StorageManager {
    base_dir: PathBuf,
    retention: RetentionPolicy,
}

impl StorageManager {
    pub fn new<P: AsRef<Path>>(base_dir: P, retention: RetentionPolicy) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
            retention,
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn retention(&self) -> &RetentionPolicy {
        &self.retention
    }

    pub fn category_dir(&self, category: StorageCategory) -> PathBuf {
        self.base_dir.join(category.dir_name())
    }

    /// `<base>/<category>/<job_id>`.
    pub fn job_dir(&self, category: StorageCategory, job_id: &str) -> Result<PathBuf, StorageError> {
        check_component(job_id)?;
        Ok(self.category_dir(category).join(job_id))
    }

    pub fn raw_pdf_path(&self, job_id: &str, filename: &str) -> Result<PathBuf, StorageError> {
        check_component(filename)?;
        Ok(self.job_dir(StorageCategory::Raw, job_id)?.join(filename))
    }

    /// `<base>/annotated_pdfs/<job_id>/<stem>_annotated.pdf`.
    pub fn annotated_pdf_path(&self, job_id: &str, filename: &str) -> Result<PathBuf, StorageError> {
        check_component(filename)?;
        let stem = Path::new(filename)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(filename);
        Ok(self
            .job_dir(StorageCategory::Annotated, job_id)?
            .join(format!("{}_annotated.pdf", stem)))
    }

    pub fn artifact_path(&self, job_id: &str, artifact_id: &str) -> Result<PathBuf, StorageError> {
        check_component(artifact_id)?;
        Ok(self
            .job_dir(StorageCategory::Artifact, job_id)?
            .join(format!("{}.zip", artifact_id)))
    }

    /// Creates the job's three directories. Safe to call repeatedly.
    pub fn ensure_job_directories(&self, job_id: &str) -> Result<JobDirectories, StorageError> {
        let dirs = JobDirectories {
            raw: self.job_dir(StorageCategory::Raw, job_id)?,
            annotated: self.job_dir(StorageCategory::Annotated, job_id)?,
            artifacts: self.job_dir(StorageCategory::Artifact, job_id)?,
        };
        for dir in [&dirs.raw, &dirs.annotated, &dirs.artifacts] {
            ensure_directory(dir)?;
        }
        Ok(dirs)
    }

    /// Writes a downloaded document, replacing any previous copy.
    pub fn save_raw_pdf(&self, job_id: &str, filename: &str, content: &[u8]) -> Result<PathBuf, StorageError> {
        let path = self.raw_pdf_path(job_id, filename)?;
        if let Some(parent) = path.parent() {
            ensure_directory(parent)?;
        }
        fs::write(&path, content).map_err(|e| StorageError::WriteFile {
            path: path.clone(),
            source: e,
        })?;
        debug!(job_id, filename, bytes = content.len(), "Saved raw document");
        Ok(path)
    }

    /// Deletes a job's files. Artifacts are kept unless `include_artifacts`.
    pub fn cleanup_job(&self, job_id: &str, include_artifacts: bool) -> Result<CleanupReport, StorageError> {
        let mut deleted = CategoryCounts::default();
        for category in StorageCategory::ALL {
            if category == StorageCategory::Artifact && !include_artifacts {
                continue;
            }
            let dir = self.job_dir(category, job_id)?;
            if !dir.exists() {
                continue;
            }
            let files = count_files(&dir);
            fs::remove_dir_all(&dir).map_err(|e| StorageError::Remove {
                path: dir.clone(),
                source: e,
            })?;
            deleted.add(category, files);
        }

        info!(
            job_id,
            raw = deleted.raw_pdfs,
            annotated = deleted.annotated_pdfs,
            artifacts = deleted.artifacts,
            "Cleaned up job storage"
        );
        Ok(CleanupReport {
            job_id: job_id.to_string(),
            deleted_files: deleted,
        })
    }

    /// Removes every job directory older than its category's window.
    pub fn sweep_expired(&self) -> SweepReport {
        self.sweep_expired_at(SystemTime::now())
    }

    /// [`sweep_expired`](Self::sweep_expired) evaluated at `now`.
    pub fn sweep_expired_at(&self, now: SystemTime) -> SweepReport {
        let mut report = SweepReport::default();

        for category in StorageCategory::ALL {
            let window = self.retention.window(category);
            let root = self.category_dir(category);
            let entries = match fs::read_dir(&root) {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    report.errors.push(SweepFailure {
                        path: root,
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            for entry in entries.flatten() {
                let path = entry.path();
                let modified = match entry.metadata().and_then(|m| {
                    if m.is_dir() {
                        m.modified().map(Some)
                    } else {
                        Ok(None)
                    }
                }) {
                    Ok(Some(modified)) => modified,
                    Ok(None) => continue,
                    Err(e) => {
                        report.errors.push(SweepFailure {
                            path,
                            error: e.to_string(),
                        });
                        continue;
                    }
                };

                // A modification time in the future counts as fresh.
                let Ok(age) = now.duration_since(modified) else {
                    continue;
                };
                if age <= window {
                    continue;
                }

                match fs::remove_dir_all(&path) {
                    Ok(()) => {
                        debug!(path = %path.display(), age_days = age.as_secs() / DAY.as_secs(), "Removed expired job directory");
                        report.deleted_directories.add(category, 1);
                    }
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Failed to remove expired job directory");
                        report.errors.push(SweepFailure {
                            path,
                            error: e.to_string(),
                        });
                    }
                }
            }
        }

        info!(
            raw = report.deleted_directories.raw_pdfs,
            annotated = report.deleted_directories.annotated_pdfs,
            artifacts = report.deleted_directories.artifacts,
            errors = report.errors.len(),
            "Retention sweep finished"
        );
        report
    }

    /// Bytes, files and distinct jobs per category.
    pub fn usage_stats(&self) -> StorageStats {
        let mut stats = StorageStats::default();
        for category in StorageCategory::ALL {
            let usage = category_usage(&self.category_dir(category));
            stats.total_bytes += usage.bytes;
            stats.total_files += usage.files;
            match category {
                StorageCategory::Raw => stats.raw_pdfs = usage,
                StorageCategory::Annotated => stats.annotated_pdfs = usage,
                StorageCategory::Artifact => stats.artifacts = usage,
            }
        }
        stats
    }
}

fn check_component(component: &str) -> Result<(), StorageError> {
    if is_safe_component(component) {
        Ok(())
    } else {
        Err(StorageError::InvalidComponent(component.to_string()))
    }
}

fn ensure_directory(path: &Path) -> Result<(), StorageError> {
    if !path.exists() {
        fs::create_dir_all(path).map_err(|e| StorageError::CreateDirectory {
            path: path.to_path_buf(),
            source: e,
        })?;
    }
    Ok(())
}

fn count_files(dir: &Path) -> u64 {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .count() as u64
}

fn category_usage(root: &Path) -> CategoryUsage {
    let mut usage = CategoryUsage::default();
    if !root.is_dir() {
        return usage;
    }
    for entry in WalkDir::new(root).min_depth(1).into_iter().filter_map(|e| e.ok()) {
        if entry.depth() == 1 && entry.file_type().is_dir() {
            usage.jobs += 1;
        } else if entry.file_type().is_file() {
            usage.files += 1;
            usage.bytes += entry.metadata().map(|m| m.len()).unwrap_or(0);
        }
    }
    usage
}
