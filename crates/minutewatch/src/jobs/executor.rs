//! Runs one scrape job end to end.
//!
//! Sources are processed one after another and documents within a source in
//! discovery order, so stored results follow that order. Every failure below
//! the job level is absorbed here; callers only see the final status.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{error, info, info_span, warn, Instrument};

use crate::discovery::{DiscoveryFilter, DocumentLink, LinkDiscovery};
use crate::sanitize::redact_url;
use crate::scanner::DocumentScanner;
use crate::storage::StorageManager;
use crate::store::{Job, JobConfig, JobStatus, JobStore, Keyword, NewMatchResult, StoreError};

use super::progress::{JobProgress, ProgressSnapshot};
use super::retry::RetryPolicy;
use super::signal::{CancellationSignal, DEFAULT_CANCEL_REASON};

pub const DEFAULT_CHECKPOINT_EVERY: usize = 5;
pub const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub source_urls: Vec<String>,
    /// Cancellation and timeout are checked before each source and after
    /// every this many documents.
    pub checkpoint_every: usize,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            source_urls: Vec::new(),
            checkpoint_every: DEFAULT_CHECKPOINT_EVERY,
            timeout: DEFAULT_JOB_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }
}

/// How a job run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobOutcome {
    pub job_id: String,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub progress: ProgressSnapshot,
    /// False when the final status could not be written to the store.
    pub status_persisted: bool,
}

enum Stop {
    Cancelled(String),
    TimedOut(Duration),
}

pub struct JobExecutor {
    store: Arc<dyn JobStore>,
    discovery: LinkDiscovery,
    scanner: DocumentScanner,
    storage: Arc<StorageManager>,
    config: ExecutorConfig,
}

impl JobExecutor {
    pub fn new(
        store: Arc<dyn JobStore>,
        discovery: LinkDiscovery,
        scanner: DocumentScanner,
        storage: Arc<StorageManager>,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            store,
            discovery,
            scanner,
            storage,
            config,
        }
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Executes the job. Never fails; the outcome mirrors what was written
    /// to the store.
    pub async fn run(&self, job_id: &str, signal: &CancellationSignal, progress: &JobProgress) -> JobOutcome {
        let span = info_span!("job", job_id = %job_id);
        self.run_inner(job_id, signal, progress).instrument(span).await
    }

    async fn run_inner(&self, job_id: &str, signal: &CancellationSignal, progress: &JobProgress) -> JobOutcome {
        let job = match self.store.get_job(job_id) {
            Ok(Some(job)) => job,
            Ok(None) => {
                warn!("Job not found");
                return self.unpersisted(job_id, JobStatus::Failed, "Job not found", progress);
            }
            Err(e) => {
                error!(error = %e, "Failed to load job");
                return self.unpersisted(job_id, JobStatus::Failed, &e.to_string(), progress);
            }
        };

        if job.status != JobStatus::Pending {
            warn!(status = %job.status, "Job is not pending, skipping execution");
            return JobOutcome {
                job_id: job.id,
                status: job.status,
                error_message: job.error_message,
                progress: progress.snapshot(),
                status_persisted: true,
            };
        }

        if signal.is_cancelled() {
            let reason = cancel_reason(signal);
            return self.finish(job_id, JobStatus::Cancelled, Some(reason), progress).await;
        }

        let (config, keywords) = match self.load_inputs(&job) {
            Ok(inputs) => inputs,
            Err(message) => {
                warn!(reason = %message, "Job cannot run");
                return self.finish(job_id, JobStatus::Failed, Some(message), progress).await;
            }
        };

        if let Err(e) = self.storage.ensure_job_directories(job_id) {
            error!(error = %e, "Failed to prepare job storage");
            let message = format!("Failed to prepare storage: {}", e);
            return self.finish(job_id, JobStatus::Failed, Some(message), progress).await;
        }

        match self
            .config
            .retry
            .run(self.store.as_ref(), "mark_running", |s| {
                s.update_status(job_id, JobStatus::Running, None)
            })
            .await
        {
            Ok(_) => {}
            Err(StoreError::InvalidTransition { from, .. }) => {
                // Cancelled or failed by someone else before we started.
                info!(status = %from, "Job left pending before execution started");
                return self.current_outcome(job_id, from, progress);
            }
            Err(e) => {
                error!(error = %e, "Failed to mark job running");
                return self.unpersisted(job_id, JobStatus::Failed, &e.to_string(), progress);
            }
        }

        info!(
            sources = self.config.source_urls.len(),
            keywords = keywords.len(),
            "Job started"
        );

        let stop = self.process_sources(&job, &config, &keywords, signal, progress).await;

        let (status, message) = match stop {
            None => (JobStatus::Completed, None),
            Some(Stop::Cancelled(reason)) => (JobStatus::Cancelled, Some(reason)),
            Some(Stop::TimedOut(limit)) => (
                JobStatus::Failed,
                Some(format!(
                    "Job timed out after exceeding the {} second limit",
                    limit.as_secs()
                )),
            ),
        };
        self.finish(job_id, status, message, progress).await
    }

    /// Resolves config and keywords, or the message the job fails with.
    fn load_inputs(&self, job: &Job) -> Result<(JobConfig, Vec<Keyword>), String> {
        let config = match self.store.get_config(&job.config_id) {
            Ok(Some(config)) => config,
            Ok(None) => return Err(format!("Job configuration {} not found", job.config_id)),
            Err(e) => return Err(format!("Failed to load job configuration: {}", e)),
        };

        let keywords = self
            .store
            .active_keywords(&job.client_id)
            .map_err(|e| format!("Failed to load keywords: {}", e))?;
        if keywords.is_empty() {
            return Err(format!(
                "No active keywords configured for client {}",
                job.client_id
            ));
        }

        Ok((config, keywords))
    }

    /// Checks the in-process signal, the stored status and the time limit.
    /// A job made terminal in the store by another process stops here too.
    fn checkpoint(&self, job_id: &str, signal: &CancellationSignal, started: Instant) -> Option<Stop> {
        if signal.is_cancelled() {
            return Some(Stop::Cancelled(cancel_reason(signal)));
        }
        match self.store.get_job(job_id) {
            Ok(Some(job)) if job.status.is_terminal() => {
                info!(status = %job.status, "Job finished outside this run, stopping");
                return Some(Stop::Cancelled(
                    job.error_message
                        .unwrap_or_else(|| DEFAULT_CANCEL_REASON.to_string()),
                ));
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Could not re-read job status at checkpoint"),
        }
        if started.elapsed() >= self.config.timeout {
            return Some(Stop::TimedOut(self.config.timeout));
        }
        None
    }

    async fn process_sources(
        &self,
        job: &Job,
        config: &JobConfig,
        keywords: &[Keyword],
        signal: &CancellationSignal,
        progress: &JobProgress,
    ) -> Option<Stop> {
        let started = Instant::now();
        let every = self.config.checkpoint_every.max(1);
        let filter = DiscoveryFilter {
            date_range: config.date_range(),
            include_minutes: config.include_minutes,
            include_agendas: config.include_agendas,
        };

        progress.set_sources_total(self.config.source_urls.len() as u64);
        let mut documents_processed = 0usize;

        for source in &self.config.source_urls {
            if let Some(stop) = self.checkpoint(&job.id, signal, started) {
                return Some(stop);
            }

            let source_span = info_span!("source", source = %redact_url(source));
            let links = self
                .discovery
                .discover(source, &filter)
                .instrument(source_span.clone())
                .await;
            progress.documents_discovered(links.len() as u64);

            for link in &links {
                if documents_processed > 0 && documents_processed % every == 0 {
                    if let Some(stop) = self.checkpoint(&job.id, signal, started) {
                        return Some(stop);
                    }
                }

                let doc_span = info_span!(parent: &source_span, "document", filename = %link.filename);
                self.process_document(&job.id, link, keywords, config.max_pages, progress)
                    .instrument(doc_span)
                    .await;
                documents_processed += 1;
            }

            progress.source_processed();
        }

        None
    }

    async fn process_document(
        &self,
        job_id: &str,
        link: &DocumentLink,
        keywords: &[Keyword],
        max_pages: Option<u32>,
        progress: &JobProgress,
    ) {
        let outcome = match self.scanner.try_scan(&link.url, keywords, max_pages).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "Document scan failed");
                progress.document_failed();
                return;
            }
        };
        progress.document_scanned(outcome.pages_scanned as u64);

        if !outcome.has_matches() {
            return;
        }
        progress.matches_found(outcome.matches.len() as u64);
        info!(
            matches = outcome.matches.len(),
            pages = outcome.pages_scanned,
            "Document matched"
        );

        if let Err(e) = self.storage.save_raw_pdf(job_id, &link.filename, &outcome.content) {
            warn!(error = %e, "Failed to store raw document");
            progress.write_failed();
        }

        for hit in outcome.matches {
            let result = NewMatchResult {
                job_id: job_id.to_string(),
                pdf_filename: link.filename.clone(),
                page_number: hit.page_number,
                keyword_id: hit.keyword_id,
                snippet: hit.snippet,
                entities: hit.entities,
            };
            if let Err(e) = self
                .config
                .retry
                .run(self.store.as_ref(), "save_result", |s| s.save_result(&result))
                .await
            {
                error!(
                    error = %e,
                    page = result.page_number,
                    keyword = %hit.keyword,
                    "Giving up on match result"
                );
                progress.write_failed();
            }
        }
    }

    async fn finish(
        &self,
        job_id: &str,
        status: JobStatus,
        message: Option<String>,
        progress: &JobProgress,
    ) -> JobOutcome {
        let result = self
            .config
            .retry
            .run(self.store.as_ref(), "finish_job", |s| {
                s.update_status(job_id, status, message.as_deref())
            })
            .await;

        let snapshot = progress.snapshot();
        match result {
            Ok(job) => {
                info!(
                    status = %job.status,
                    documents = snapshot.documents_scanned,
                    failed = snapshot.documents_failed,
                    matches = snapshot.matches_found,
                    write_failures = snapshot.write_failures,
                    "Job finished"
                );
                JobOutcome {
                    job_id: job.id,
                    status: job.status,
                    error_message: job.error_message,
                    progress: snapshot,
                    status_persisted: true,
                }
            }
            Err(StoreError::InvalidTransition { from, .. }) => {
                warn!(status = %from, wanted = %status, "Job already finished elsewhere");
                self.current_outcome(job_id, from, progress)
            }
            Err(e) => {
                error!(error = %e, wanted = %status, "Failed to record final job status");
                JobOutcome {
                    job_id: job_id.to_string(),
                    status,
                    error_message: message,
                    progress: snapshot,
                    status_persisted: false,
                }
            }
        }
    }

    fn current_outcome(&self, job_id: &str, status: JobStatus, progress: &JobProgress) -> JobOutcome {
        let error_message = self
            .store
            .get_job(job_id)
            .ok()
            .flatten()
            .and_then(|job| job.error_message);
        JobOutcome {
            job_id: job_id.to_string(),
            status,
            error_message,
            progress: progress.snapshot(),
            status_persisted: true,
        }
    }

    fn unpersisted(&self, job_id: &str, status: JobStatus, message: &str, progress: &JobProgress) -> JobOutcome {
        JobOutcome {
            job_id: job_id.to_string(),
            status,
            error_message: Some(message.to_string()),
            progress: progress.snapshot(),
            status_persisted: false,
        }
    }
}

fn cancel_reason(signal: &CancellationSignal) -> String {
    signal
        .reason()
        .unwrap_or_else(|| DEFAULT_CANCEL_REASON.to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::error::FetchError;
    use crate::fetch::{Fetcher, MemoryFetcher};
    use crate::jobs::retry::tests::FlakyStore;
    use crate::pdf::compose_text_pdf;
    use crate::scanner::EntityCapability;
    use crate::storage::RetentionPolicy;
    use crate::store::{NewJob, NewJobConfig, PageRequest, SqliteJobStore};

    const SOURCE: &str = "https://city.gov/council/";

    struct Fixture {
        _dir: tempfile::TempDir,
        fetcher: Arc<MemoryFetcher>,
        storage: Arc<StorageManager>,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let storage = Arc::new(StorageManager::new(dir.path(), RetentionPolicy::default()));
            Self {
                _dir: dir,
                fetcher: Arc::new(MemoryFetcher::new()),
                storage,
            }
        }

        fn publish(&self, source: &str, docs: &[(&str, &[&str])]) {
            let mut html = String::from("<html><body>");
            for (name, pages) in docs {
                let url = format!("https://city.gov/docs/{}", name);
                html.push_str(&format!(r#"<a href="{}">Meeting Minutes</a>"#, url));
                self.fetcher.insert(url, compose_text_pdf(pages).unwrap());
            }
            html.push_str("</body></html>");
            self.fetcher.insert(source, html);
        }

        fn executor(&self, store: Arc<dyn JobStore>, config: ExecutorConfig) -> JobExecutor {
            self.executor_with(self.fetcher.clone(), store, config)
        }

        fn executor_with(
            &self,
            fetcher: Arc<dyn Fetcher>,
            store: Arc<dyn JobStore>,
            config: ExecutorConfig,
        ) -> JobExecutor {
            JobExecutor::new(
                store,
                LinkDiscovery::new(Arc::clone(&fetcher)),
                DocumentScanner::new(fetcher, Arc::new(EntityCapability::pattern())),
                Arc::clone(&self.storage),
                config,
            )
        }
    }

    /// Serves from a [`MemoryFetcher`] and runs `on_fetch` once, the first
    /// time `trigger_url` is downloaded.
    struct TriggerFetcher {
        inner: Arc<MemoryFetcher>,
        trigger_url: String,
        fired: AtomicBool,
        on_fetch: Box<dyn Fn() + Send + Sync>,
    }

    #[async_trait]
    impl Fetcher for TriggerFetcher {
        async fn get_text(&self, url: &str) -> Result<String, FetchError> {
            self.inner.get_text(url).await
        }

        async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, FetchError> {
            if url == self.trigger_url && !self.fired.swap(true, Ordering::SeqCst) {
                (self.on_fetch)();
            }
            self.inner.get_bytes(url).await
        }
    }

    fn twelve_minutes() -> Vec<String> {
        (1..=12).map(|day| format!("minutes_2024-01-{:02}.pdf", day)).collect()
    }

    fn config_for(sources: &[&str]) -> ExecutorConfig {
        ExecutorConfig {
            source_urls: sources.iter().map(|s| s.to_string()).collect(),
            retry: RetryPolicy {
                max_attempts: 3,
                initial_backoff: Duration::from_millis(1),
                max_backoff: Duration::from_millis(2),
            },
            ..Default::default()
        }
    }

    fn pending_job(store: &dyn JobStore, client: &str) -> Job {
        let config = store.create_config(&NewJobConfig::default()).unwrap();
        store
            .create_job(&NewJob {
                client_id: client.to_string(),
                config_id: config.id,
                created_by: "admin".to_string(),
            })
            .unwrap()
    }

    #[tokio::test]
    async fn test_no_keywords_fails_without_scanning() {
        let fx = Fixture::new();
        fx.publish(SOURCE, &[("minutes_2024-01-01.pdf", &["zoning"][..])]);
        let store = Arc::new(SqliteJobStore::in_memory().unwrap());
        let job = pending_job(store.as_ref(), "client-without-keywords");

        let executor = fx.executor(store.clone(), config_for(&[SOURCE]));
        let progress = JobProgress::new();
        let outcome = executor.run(&job.id, &CancellationSignal::new(), &progress).await;

        assert_eq!(outcome.status, JobStatus::Failed);
        assert!(outcome
            .error_message
            .as_deref()
            .unwrap()
            .contains("No active keywords"));
        assert_eq!(progress.snapshot().documents_discovered, 0);

        let stored = store.get_job(&job.id).unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
        assert!(stored.started_at.is_none());
        assert!(stored.completed_at.is_some());
        assert_eq!(
            store.list_results(&job.id, PageRequest::all()).unwrap().total,
            0
        );
    }

    #[tokio::test]
    async fn test_completed_job_stores_results_in_order() {
        let fx = Fixture::new();
        fx.publish(
            SOURCE,
            &[
                ("minutes_2024-01-01.pdf", &["intro", "zoning variance"][..]),
                ("minutes_2024-02-01.pdf", &["no hits here"][..]),
                ("minutes_2024-03-01.pdf", &["Zoning and budget"][..]),
            ],
        );
        let store = Arc::new(SqliteJobStore::in_memory().unwrap());
        store.add_keyword("c1", "zoning").unwrap();
        store.add_keyword("c1", "budget").unwrap();
        let job = pending_job(store.as_ref(), "c1");

        let executor = fx.executor(store.clone(), config_for(&[SOURCE]));
        let outcome = executor
            .run(&job.id, &CancellationSignal::new(), &JobProgress::new())
            .await;

        assert_eq!(outcome.status, JobStatus::Completed);
        assert!(outcome.status_persisted);
        assert_eq!(outcome.progress.documents_scanned, 3);
        assert_eq!(outcome.progress.matches_found, 3);

        let results = store.list_results(&job.id, PageRequest::all()).unwrap();
        let rows: Vec<(&str, u32, &str)> = results
            .items
            .iter()
            .map(|r| (r.pdf_filename.as_str(), r.page_number, r.keyword.as_str()))
            .collect();
        assert_eq!(
            rows,
            vec![
                ("minutes_2024-01-01.pdf", 2, "zoning"),
                ("minutes_2024-03-01.pdf", 1, "zoning"),
                ("minutes_2024-03-01.pdf", 1, "budget"),
            ]
        );

        assert!(fx.storage.raw_pdf_path(&job.id, "minutes_2024-01-01.pdf").unwrap().exists());
        assert!(!fx.storage.raw_pdf_path(&job.id, "minutes_2024-02-01.pdf").unwrap().exists());

        let stored = store.get_job(&job.id).unwrap().unwrap();
        assert!(stored.started_at.is_some());
        assert!(stored.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_pre_cancelled_signal_cancels_before_start() {
        let fx = Fixture::new();
        let store = Arc::new(SqliteJobStore::in_memory().unwrap());
        store.add_keyword("c1", "zoning").unwrap();
        let job = pending_job(store.as_ref(), "c1");

        let signal = CancellationSignal::new();
        signal.cancel("operator stop");
        let outcome = fx
            .executor(store.clone(), config_for(&[SOURCE]))
            .run(&job.id, &signal, &JobProgress::new())
            .await;

        assert_eq!(outcome.status, JobStatus::Cancelled);
        assert_eq!(outcome.error_message.as_deref(), Some("operator stop"));
        assert!(store.get_job(&job.id).unwrap().unwrap().started_at.is_none());
    }

    #[tokio::test]
    async fn test_timeout_fails_job_at_checkpoint() {
        let fx = Fixture::new();
        fx.publish(SOURCE, &[("minutes_2024-01-01.pdf", &["zoning"][..])]);
        let store = Arc::new(SqliteJobStore::in_memory().unwrap());
        store.add_keyword("c1", "zoning").unwrap();
        let job = pending_job(store.as_ref(), "c1");

        let mut config = config_for(&[SOURCE, SOURCE]);
        config.timeout = Duration::ZERO;
        let outcome = fx
            .executor(store.clone(), config)
            .run(&job.id, &CancellationSignal::new(), &JobProgress::new())
            .await;

        assert_eq!(outcome.status, JobStatus::Failed);
        assert!(outcome.error_message.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_write_failures_are_retried_then_counted() {
        let fx = Fixture::new();
        fx.publish(SOURCE, &[("minutes_2024-01-01.pdf", &["zoning", "zoning again"][..])]);
        let store = Arc::new(FlakyStore::new(4));
        store.inner.add_keyword("c1", "zoning").unwrap();
        let job = pending_job(store.as_ref(), "c1");

        let outcome = fx
            .executor(store.clone(), config_for(&[SOURCE]))
            .run(&job.id, &CancellationSignal::new(), &JobProgress::new())
            .await;

        // Page 1 exhausts three attempts; page 2 succeeds on its second.
        assert_eq!(outcome.status, JobStatus::Completed);
        assert_eq!(outcome.progress.write_failures, 1);
        assert_eq!(store.save_calls.load(Ordering::SeqCst), 5);
        let results = store.list_results(&job.id, PageRequest::all()).unwrap();
        assert_eq!(results.total, 1);
        assert_eq!(results.items[0].page_number, 2);
    }

    #[tokio::test]
    async fn test_unreachable_source_still_completes() {
        let fx = Fixture::new();
        let store = Arc::new(SqliteJobStore::in_memory().unwrap());
        store.add_keyword("c1", "zoning").unwrap();
        let job = pending_job(store.as_ref(), "c1");

        let outcome = fx
            .executor(store.clone(), config_for(&["https://down.gov/"]))
            .run(&job.id, &CancellationSignal::new(), &JobProgress::new())
            .await;
        assert_eq!(outcome.status, JobStatus::Completed);
        assert_eq!(outcome.progress.sources_processed, 1);
        assert_eq!(outcome.progress.documents_discovered, 0);
    }

    #[tokio::test]
    async fn test_cancel_mid_source_stops_at_document_checkpoint() {
        let fx = Fixture::new();
        let names = twelve_minutes();
        let docs: Vec<(&str, &[&str])> = names.iter().map(|n| (n.as_str(), &["zoning"][..])).collect();
        fx.publish(SOURCE, &docs);
        let store = Arc::new(SqliteJobStore::in_memory().unwrap());
        store.add_keyword("c1", "zoning").unwrap();
        let job = pending_job(store.as_ref(), "c1");

        let signal = CancellationSignal::new();
        let trip = signal.clone();
        let fetcher = Arc::new(TriggerFetcher {
            inner: fx.fetcher.clone(),
            trigger_url: format!("https://city.gov/docs/{}", names[1]),
            fired: AtomicBool::new(false),
            on_fetch: Box::new(move || {
                trip.cancel("operator stop");
            }),
        });

        let outcome = fx
            .executor_with(fetcher, store.clone(), config_for(&[SOURCE]))
            .run(&job.id, &signal, &JobProgress::new())
            .await;

        assert_eq!(outcome.status, JobStatus::Cancelled);
        assert_eq!(outcome.error_message.as_deref(), Some("operator stop"));
        assert_eq!(outcome.progress.documents_discovered, 12);
        assert_eq!(outcome.progress.documents_scanned, 5);

        let results = store.list_results(&job.id, PageRequest::all()).unwrap();
        let files: Vec<&str> = results.items.iter().map(|r| r.pdf_filename.as_str()).collect();
        let expected: Vec<&str> = names[..5].iter().map(|n| n.as_str()).collect();
        assert_eq!(files, expected);

        let stored = store.get_job(&job.id).unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Cancelled);
        assert_eq!(stored.error_message.as_deref(), Some("operator stop"));
    }

    #[tokio::test]
    async fn test_job_cancelled_in_store_stops_at_next_checkpoint() {
        let fx = Fixture::new();
        let names = twelve_minutes();
        let docs: Vec<(&str, &[&str])> = names.iter().map(|n| (n.as_str(), &["zoning"][..])).collect();
        fx.publish(SOURCE, &docs);
        let store = Arc::new(SqliteJobStore::in_memory().unwrap());
        store.add_keyword("c1", "zoning").unwrap();
        let job = pending_job(store.as_ref(), "c1");

        // Another process cancels the running job directly in the database.
        let elsewhere = store.clone();
        let job_id = job.id.clone();
        let fetcher = Arc::new(TriggerFetcher {
            inner: fx.fetcher.clone(),
            trigger_url: format!("https://city.gov/docs/{}", names[0]),
            fired: AtomicBool::new(false),
            on_fetch: Box::new(move || {
                elsewhere
                    .update_status(&job_id, JobStatus::Cancelled, Some("Cancelled from CLI"))
                    .unwrap();
            }),
        });

        let outcome = fx
            .executor_with(fetcher, store.clone(), config_for(&[SOURCE]))
            .run(&job.id, &CancellationSignal::new(), &JobProgress::new())
            .await;

        assert_eq!(outcome.status, JobStatus::Cancelled);
        assert_eq!(outcome.error_message.as_deref(), Some("Cancelled from CLI"));
        assert!(outcome.status_persisted);
        assert_eq!(outcome.progress.documents_scanned, 5);
        assert_eq!(
            store.list_results(&job.id, PageRequest::all()).unwrap().total,
            5
        );

        let stored = store.get_job(&job.id).unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Cancelled);
        assert_eq!(stored.error_message.as_deref(), Some("Cancelled from CLI"));
    }
}
