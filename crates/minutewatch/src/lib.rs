pub mod app;
pub mod config;
pub mod db;
pub mod discovery;
pub mod error;
pub mod export;
pub mod fetch;
pub mod highlight;
pub mod jobs;
pub mod logging;
pub mod pdf;
pub mod sanitize;
pub mod scanner;
pub mod storage;
pub mod store;

pub use app::App;
pub use config::{load_settings, Settings};
pub use discovery::{DiscoveryFilter, DocumentCategory, DocumentLink, LinkDiscovery};
pub use error::{
    ConfigError, ControllerError, ExportError, FetchError, HighlightError, LoggingError,
    MinutewatchError, Result, ScanError, StorageError,
};
pub use export::{ArtifactReport, JobSummary, ResultsService};
pub use fetch::{Fetcher, HttpFetcher, MemoryFetcher};
pub use highlight::{HighlightBatch, HighlightEngine};
pub use jobs::{
    CancellationSignal, ExecutorConfig, JobController, JobExecutor, JobHandle, JobOutcome,
    JobStatusReport, RetryPolicy,
};
pub use scanner::{DocumentScanner, EntityCapability, ScanOutcome};
pub use storage::{RetentionPolicy, StorageManager};
pub use store::{Job, JobStatus, JobStore, MatchResult, NewJobConfig, SqliteJobStore, StoreError};
