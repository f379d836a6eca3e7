//! Results access: summaries, CSV export and ZIP artifacts.

pub mod artifact;
pub mod csv;
pub mod summary;

use std::sync::Arc;

use crate::error::ExportError;
use crate::storage::StorageManager;
use crate::store::{JobStore, MatchResult, Page, PageRequest};

pub use artifact::{write_artifact, ArtifactReport, METADATA_ENTRY, PDF_PREFIX, RESULTS_ENTRY};
pub use csv::{quote_field, render_csv, CSV_HEADER};
pub use summary::{summarize, JobSummary};

pub struct ResultsService {
    store: Arc<dyn JobStore>,
    storage: Arc<StorageManager>,
}

impl ResultsService {
    pub fn new(store: Arc<dyn JobStore>, storage: Arc<StorageManager>) -> Self {
        Self { store, storage }
    }

    pub fn summary(&self, job_id: &str) -> Result<Option<JobSummary>, ExportError> {
        summarize(self.store.as_ref(), job_id)
    }

    pub fn list_results(&self, job_id: &str, page: PageRequest) -> Result<Page<MatchResult>, ExportError> {
        Ok(self.store.list_results(job_id, page)?)
    }

    /// CSV text for a job's results. `None` when the job does not exist.
    pub fn export_csv(&self, job_id: &str) -> Result<Option<String>, ExportError> {
        if self.store.get_job(job_id)?.is_none() {
            return Ok(None);
        }
        let results = self.store.list_results(job_id, PageRequest::all())?;
        Ok(Some(render_csv(&results.items)))
    }

    /// Bundles results, metadata and stored documents into a ZIP archive.
    pub fn generate_artifact(&self, job_id: &str) -> Result<ArtifactReport, ExportError> {
        let summary = self
            .summary(job_id)?
            .ok_or_else(|| ExportError::JobNotFound(job_id.to_string()))?;
        let results = self.store.list_results(job_id, PageRequest::all())?;
        let csv = render_csv(&results.items);
        write_artifact(&self.storage, &summary, &results.items, &csv)
    }
}
