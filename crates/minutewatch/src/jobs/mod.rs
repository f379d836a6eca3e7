//! Job orchestration: execution, background control, cancellation, retries.

pub mod controller;
pub mod executor;
pub mod progress;
pub mod retry;
pub mod signal;

pub use controller::{JobController, JobHandle, JobStatusReport};
pub use executor::{ExecutorConfig, JobExecutor, JobOutcome};
pub use progress::{JobProgress, ProgressSnapshot};
pub use retry::RetryPolicy;
pub use signal::{CancellationSignal, DEFAULT_CANCEL_REASON};
