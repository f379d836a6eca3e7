//! Test harness for isolated engine runs.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use minutewatch::fetch::{Fetcher, MemoryFetcher};
use minutewatch::jobs::{ExecutorConfig, JobOutcome, RetryPolicy};
use minutewatch::pdf::compose_text_pdf;
use minutewatch::storage::{RetentionPolicy, StorageManager};
use minutewatch::store::{Job, NewJobConfig, SqliteJobStore};
use minutewatch::App;

pub const CLIENT: &str = "client-a";

/// A document published on a source page.
pub struct Doc<'a> {
    pub filename: &'a str,
    pub link_text: &'a str,
    pub pages: &'a [&'a str],
}

impl<'a> Doc<'a> {
    pub fn minutes(filename: &'a str, pages: &'a [&'a str]) -> Self {
        Self {
            filename,
            link_text: "Meeting Minutes",
            pages,
        }
    }
}

/// Engine over a temp directory with canned HTTP responses.
pub struct TestHarness {
    temp_dir: TempDir,
    pub fetcher: Arc<MemoryFetcher>,
    pub store: Arc<SqliteJobStore>,
    pub storage: Arc<StorageManager>,
    sources: Vec<String>,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let storage = Arc::new(StorageManager::new(
            temp_dir.path(),
            RetentionPolicy::default(),
        ));
        Self {
            temp_dir,
            fetcher: Arc::new(MemoryFetcher::new()),
            store: Arc::new(SqliteJobStore::in_memory().expect("Failed to open store")),
            storage,
            sources: Vec::new(),
        }
    }

    pub fn base_dir(&self) -> &std::path::Path {
        self.temp_dir.path()
    }

    /// Registers an active keyword for [`CLIENT`].
    pub fn keyword(&self, text: &str) -> i64 {
        self.store
            .add_keyword(CLIENT, text)
            .expect("Failed to add keyword")
            .id
    }

    /// Serves a source page linking to `docs`, and the docs themselves.
    pub fn publish(&mut self, source: &str, docs: &[Doc<'_>]) {
        let mut html = String::from("<html><body><ul>");
        for doc in docs {
            let url = format!("{}files/{}", source, doc.filename);
            html.push_str(&format!(
                r#"<li><a href="{}">{}</a></li>"#,
                url, doc.link_text
            ));
            self.fetcher
                .insert(url, compose_text_pdf(doc.pages).expect("Failed to build PDF"));
        }
        html.push_str("</ul></body></html>");
        self.fetcher.insert(source, html);
        self.sources.push(source.to_string());
    }

    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            source_urls: self.sources.clone(),
            retry: RetryPolicy {
                max_attempts: 3,
                initial_backoff: Duration::from_millis(1),
                max_backoff: Duration::from_millis(5),
            },
            ..ExecutorConfig::default()
        }
    }

    pub fn app(&self) -> App {
        let fetcher: Arc<dyn Fetcher> = self.fetcher.clone();
        App::assemble(
            Arc::clone(&self.store),
            Arc::clone(&self.storage),
            fetcher,
            self.executor_config(),
            300,
        )
    }

    /// Submits a job for [`CLIENT`] and waits for it to finish.
    pub async fn run_job(&self, app: &App, config: &NewJobConfig) -> (Job, JobOutcome) {
        let (job, handle) = app
            .controller
            .submit(CLIENT, config, "tester")
            .expect("Failed to submit job");
        let outcome = handle.join().await.expect("Job task failed");
        (job, outcome)
    }
}
