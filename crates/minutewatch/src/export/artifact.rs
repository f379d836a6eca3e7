//! ZIP bundles of a job's results and downloaded documents.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{Seek, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use super::summary::JobSummary;
use crate::error::{ExportError, StorageError};
use crate::storage::StorageManager;
use crate::store::MatchResult;

pub const RESULTS_ENTRY: &str = "results.csv";
pub const METADATA_ENTRY: &str = "metadata.json";
pub const PDF_PREFIX: &str = "pdfs/";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ArtifactMetadata<'a> {
    job_id: &'a str,
    exported_at: DateTime<Utc>,
    summary: &'a JobSummary,
}

/// Where an artifact landed and what went into it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactReport {
    pub artifact_id: String,
    pub path: PathBuf,
    pub documents_included: Vec<String>,
    pub documents_missing: Vec<String>,
}

fn archive_error(path: &Path, e: impl ToString) -> ExportError {
    ExportError::Archive {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}

/// Deletes an archive on drop unless it was kept, so a failed write leaves
/// nothing behind in the artifacts directory.
struct PartialArchive {
    path: PathBuf,
    keep: bool,
}

impl PartialArchive {
    fn new(path: PathBuf) -> Self {
        Self { path, keep: false }
    }

    fn keep(mut self) -> PathBuf {
        self.keep = true;
        self.path.clone()
    }
}

impl Drop for PartialArchive {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "Failed to remove incomplete artifact");
            }
        }
    }
}

/// Writes `artifacts/<job>/<artifact_id>.zip`.
pub fn write_artifact(
    storage: &StorageManager,
    summary: &JobSummary,
    results: &[MatchResult],
    csv: &str,
) -> Result<ArtifactReport, ExportError> {
    let job_id = summary.job_id.as_str();
    let artifact_id = uuid::Uuid::new_v4().to_string();
    let dirs = storage.ensure_job_directories(job_id)?;
    let path = storage.artifact_path(job_id, &artifact_id)?;

    let file = File::create(&path).map_err(|e| StorageError::WriteFile {
        path: path.clone(),
        source: e,
    })?;
    let partial = PartialArchive::new(path);
    let (included, missing) = write_entries(file, &partial.path, &dirs.raw, summary, results, csv)?;
    let path = partial.keep();

    info!(
        job_id,
        artifact_id = %artifact_id,
        documents = included.len(),
        missing = missing.len(),
        "Artifact written"
    );

    Ok(ArtifactReport {
        artifact_id,
        path,
        documents_included: included,
        documents_missing: missing,
    })
}

/// Writes every archive entry and finishes the ZIP. Returns the documents
/// included and those missing from `raw_dir`.
fn write_entries<W: Write + Seek>(
    writer: W,
    path: &Path,
    raw_dir: &Path,
    summary: &JobSummary,
    results: &[MatchResult],
    csv: &str,
) -> Result<(Vec<String>, Vec<String>), ExportError> {
    let job_id = summary.job_id.as_str();
    let mut zip = ZipWriter::new(writer);
    let options = SimpleFileOptions::default();

    zip.start_file(RESULTS_ENTRY, options)
        .map_err(|e| archive_error(path, e))?;
    zip.write_all(csv.as_bytes()).map_err(|e| archive_error(path, e))?;

    let metadata = ArtifactMetadata {
        job_id,
        exported_at: Utc::now(),
        summary,
    };
    zip.start_file(METADATA_ENTRY, options)
        .map_err(|e| archive_error(path, e))?;
    zip.write_all(&serde_json::to_vec_pretty(&metadata)?)
        .map_err(|e| archive_error(path, e))?;

    let filenames: BTreeSet<&str> = results.iter().map(|r| r.pdf_filename.as_str()).collect();
    let mut included = Vec::new();
    let mut missing = Vec::new();
    for filename in filenames {
        let source = raw_dir.join(filename);
        let bytes = match std::fs::read(&source) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(job_id, filename, error = %e, "Document missing from storage, leaving it out of the artifact");
                missing.push(filename.to_string());
                continue;
            }
        };
        zip.start_file(format!("{}{}", PDF_PREFIX, filename), options)
            .map_err(|e| archive_error(path, e))?;
        zip.write_all(&bytes).map_err(|e| archive_error(path, e))?;
        included.push(filename.to_string());
    }

    zip.finish().map_err(|e| archive_error(path, e))?;
    Ok((included, missing))
}
