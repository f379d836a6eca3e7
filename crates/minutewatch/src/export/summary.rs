use std::collections::BTreeSet;

use serde::Serialize;

use crate::error::ExportError;
use crate::store::{Job, JobStatus, JobStore, KeywordCount, MatchResult, PageRequest};

/// Aggregate view of a job's results.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub job_id: String,
    pub status: JobStatus,
    pub result_count: u64,
    pub unique_pdfs: usize,
    pub unique_keywords: usize,
    /// Descending by count, ties broken by keyword.
    pub keyword_breakdown: Vec<KeywordCount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<i64>,
}

impl JobSummary {
    pub fn from_results(job: &Job, results: &[MatchResult], mut breakdown: Vec<KeywordCount>) -> Self {
        breakdown.sort_by(|a, b| b.match_count.cmp(&a.match_count).then_with(|| a.keyword.cmp(&b.keyword)));

        let pdfs: BTreeSet<&str> = results.iter().map(|r| r.pdf_filename.as_str()).collect();
        // Breakdown rows are per keyword text, so distinct keywords are too.
        let keywords: BTreeSet<&str> = results.iter().map(|r| r.keyword.as_str()).collect();

        Self {
            job_id: job.id.clone(),
            status: job.status,
            result_count: results.len() as u64,
            unique_pdfs: pdfs.len(),
            unique_keywords: keywords.len(),
            keyword_breakdown: breakdown,
            duration_seconds: job.duration_seconds(),
        }
    }
}

/// Builds the summary for `job_id`, or `None` when the job does not exist.
pub fn summarize(store: &dyn JobStore, job_id: &str) -> Result<Option<JobSummary>, ExportError> {
    let Some(job) = store.get_job(job_id)? else {
        return Ok(None);
    };
    let results = store.list_results(job_id, PageRequest::all())?;
    let breakdown = store.keyword_counts(job_id)?;
    Ok(Some(JobSummary::from_results(&job, &results.items, breakdown)))
}
