//! Wiring of the engine's services from settings.

use std::sync::Arc;

use tracing::info;

use crate::config::Settings;
use crate::db::Database;
use crate::discovery::LinkDiscovery;
use crate::error::Result;
use crate::export::ResultsService;
use crate::fetch::{Fetcher, HttpFetcher};
use crate::highlight::HighlightEngine;
use crate::jobs::{ExecutorConfig, JobController, JobExecutor};
use crate::scanner::{DocumentScanner, EntityCapability};
use crate::storage::StorageManager;
use crate::store::{JobStore, SqliteJobStore, StoreError};

/// The assembled engine.
pub struct App {
    /// Persistence for jobs, configs and results.
    pub store: Arc<SqliteJobStore>,

    /// On-disk layout for documents and artifacts.
    pub storage: Arc<StorageManager>,

    /// Background job control.
    pub controller: JobController,

    /// Summaries, CSV export and artifacts.
    pub results: ResultsService,

    /// Post-completion annotation.
    pub highlighter: HighlightEngine,
}

impl App {
    /// Opens the database and storage named by `settings` and builds the
    /// engine around an HTTP fetcher.
    pub fn open(settings: &Settings) -> Result<Self> {
        let db_path = settings.resolved_database_path();
        let store = Arc::new(SqliteJobStore::new(
            Database::open(&db_path).map_err(StoreError::from)?,
        ));
        let storage = Arc::new(StorageManager::new(
            settings.resolved_data_dir(),
            settings.retention_policy(),
        ));
        let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::new(
            settings.http.timeout(),
            &settings.http.user_agent,
        )?);

        info!(
            database = %db_path.display(),
            data_dir = %storage.base_dir().display(),
            sources = settings.sources.len(),
            "Engine opened"
        );

        Ok(Self::assemble(
            store,
            storage,
            fetcher,
            settings.executor_config(),
            settings.jobs.snippet_chars,
        ))
    }

    /// Builds the engine from already-constructed parts.
    pub fn assemble(
        store: Arc<SqliteJobStore>,
        storage: Arc<StorageManager>,
        fetcher: Arc<dyn Fetcher>,
        config: ExecutorConfig,
        snippet_chars: usize,
    ) -> Self {
        let dyn_store: Arc<dyn JobStore> = store.clone();
        let scanner = DocumentScanner::new(Arc::clone(&fetcher), Arc::new(EntityCapability::pattern()))
            .with_snippet_chars(snippet_chars);
        let executor = Arc::new(JobExecutor::new(
            Arc::clone(&dyn_store),
            LinkDiscovery::new(fetcher),
            scanner,
            Arc::clone(&storage),
            config,
        ));

        Self {
            controller: JobController::new(executor),
            results: ResultsService::new(dyn_store, Arc::clone(&storage)),
            highlighter: HighlightEngine::new(Arc::clone(&storage)),
            store,
            storage,
        }
    }
}
