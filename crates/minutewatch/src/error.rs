use std::path::PathBuf;
use thiserror::Error;

use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum MinutewatchError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Highlight error: {0}")]
    Highlight(#[from] HighlightError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("Controller error: {0}")]
    Controller(#[from] ControllerError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Logging error: {0}")]
    Logging(#[from] LoggingError),
}

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Invalid log filter '{filter}': {reason}")]
    Filter { filter: String, reason: String },

    #[error("Failed to install log subscriber: {0}")]
    Install(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read settings file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse settings JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Settings validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Invalid source URL '{url}': {reason}")]
    InvalidSourceUrl { url: String, reason: String },
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Failed to build HTTP client: {0}")]
    Client(String),

    #[error("Request to '{url}' failed: {reason}")]
    Request { url: String, reason: String },

    #[error("HTTP {status} for '{url}'")]
    Status { url: String, status: u16 },

    #[error("No content registered for '{0}'")]
    NotFound(String),
}

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Download failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Failed to parse PDF: {0}")]
    PdfParse(String),

    #[error("Scan task aborted: {0}")]
    TaskJoin(String),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to remove '{path}': {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid path component '{0}'")]
    InvalidComponent(String),
}

#[derive(Error, Debug)]
pub enum HighlightError {
    #[error("Failed to load PDF '{path}': {reason}")]
    Load { path: PathBuf, reason: String },

    #[error("Page {page} is out of range (document has {page_count} pages)")]
    PageOutOfRange { page: u32, page_count: usize },

    #[error("Malformed PDF structure: {0}")]
    Structure(String),

    #[error("Failed to save annotated PDF '{path}': {reason}")]
    Save { path: PathBuf, reason: String },

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<lopdf::Error> for HighlightError {
    fn from(e: lopdf::Error) -> Self {
        HighlightError::Structure(e.to_string())
    }
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Failed to write archive '{path}': {reason}")]
    Archive { path: PathBuf, reason: String },

    #[error("Failed to serialize metadata: {0}")]
    Metadata(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Job {job_id} is {status} and cannot be launched")]
    NotLaunchable { job_id: String, status: String },

    #[error("Job {0} is already running")]
    AlreadyRunning(String),

    #[error("Task for job {job_id} did not finish: {reason}")]
    TaskFailed { job_id: String, reason: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, MinutewatchError>;
