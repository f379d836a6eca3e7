//! Launches job executions as background tasks and tracks them.
//!
//! Each launched job is one spawned tokio task. The caller owns the task's
//! [`JobHandle`]; the controller only keeps the job's cancellation signal
//! and progress counters, and the task removes those when it finishes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::ControllerError;
use crate::store::{Job, JobStatus, JobStore, NewJob, NewJobConfig, PageRequest, StoreError};

use super::executor::{JobExecutor, JobOutcome};
use super::progress::{JobProgress, ProgressSnapshot};
use super::signal::{CancellationSignal, DEFAULT_CANCEL_REASON};

pub const SHUTDOWN_REASON: &str = "Shutting down";

#[derive(Clone, Default)]
struct ActiveJob {
    signal: CancellationSignal,
    progress: Arc<JobProgress>,
    /// Cancelled by the task once it has deregistered.
    finished: CancellationToken,
}

/// Handle to one background job task. Dropping it detaches the task.
pub struct JobHandle {
    job_id: String,
    task: JoinHandle<JobOutcome>,
}

impl JobHandle {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub async fn join(self) -> Result<JobOutcome, ControllerError> {
        self.task.await.map_err(|e| ControllerError::TaskFailed {
            job_id: self.job_id,
            reason: e.to_string(),
        })
    }
}

/// Status plus live counters, as reported to callers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusReport {
    pub job: Job,
    /// Present while the job's task is running.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<ProgressSnapshot>,
    pub result_count: u64,
}

pub struct JobController {
    store: Arc<dyn JobStore>,
    executor: Arc<JobExecutor>,
    active: Arc<Mutex<HashMap<String, ActiveJob>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!("Controller lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

impl JobController {
    pub fn new(executor: Arc<JobExecutor>) -> Self {
        Self {
            store: Arc::clone(executor.store()),
            executor,
            active: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    /// Persists a config and a pending job that uses it.
    pub fn create_job(
        &self,
        client_id: &str,
        config: &NewJobConfig,
        created_by: &str,
    ) -> Result<Job, ControllerError> {
        let config = self.store.create_config(config)?;
        let job = self.store.create_job(&NewJob {
            client_id: client_id.to_string(),
            config_id: config.id,
            created_by: created_by.to_string(),
        })?;
        info!(job_id = %job.id, client_id, "Job created");
        Ok(job)
    }

    /// Spawns the executor for a pending job. Must be called within a tokio
    /// runtime.
    pub fn launch(&self, job_id: &str) -> Result<JobHandle, ControllerError> {
        let job = self
            .store
            .get_job(job_id)?
            .ok_or_else(|| ControllerError::JobNotFound(job_id.to_string()))?;
        if job.status != JobStatus::Pending {
            return Err(ControllerError::NotLaunchable {
                job_id: job_id.to_string(),
                status: job.status.to_string(),
            });
        }

        let entry = {
            let mut active = lock(&self.active);
            if active.contains_key(job_id) {
                return Err(ControllerError::AlreadyRunning(job_id.to_string()));
            }
            let entry = ActiveJob::default();
            active.insert(job_id.to_string(), entry.clone());
            entry
        };

        let executor = Arc::clone(&self.executor);
        let registry = Arc::clone(&self.active);
        let id = job_id.to_string();
        let task = tokio::spawn(async move {
            let outcome = executor.run(&id, &entry.signal, &entry.progress).await;
            lock(&registry).remove(&id);
            entry.finished.cancel();
            outcome
        });

        info!(job_id, "Job launched");
        Ok(JobHandle {
            job_id: job_id.to_string(),
            task,
        })
    }

    /// Creates a job and launches it.
    pub fn submit(
        &self,
        client_id: &str,
        config: &NewJobConfig,
        created_by: &str,
    ) -> Result<(Job, JobHandle), ControllerError> {
        let job = self.create_job(client_id, config, created_by)?;
        let handle = self.launch(&job.id)?;
        Ok((job, handle))
    }

    pub fn status(&self, job_id: &str) -> Result<JobStatusReport, ControllerError> {
        let job = self
            .store
            .get_job(job_id)?
            .ok_or_else(|| ControllerError::JobNotFound(job_id.to_string()))?;
        let result_count = self.store.list_results(job_id, PageRequest::new(0, 0))?.total;
        let progress = lock(&self.active)
            .get(job_id)
            .map(|active| active.progress.snapshot());
        Ok(JobStatusReport {
            job,
            progress,
            result_count,
        })
    }

    /// Requests cancellation.
    ///
    /// Running jobs are signalled and stop at their next checkpoint. Pending
    /// jobs become cancelled immediately. A job running in another process
    /// is cancelled in the store, and its executor stops at its next
    /// checkpoint. Returns false when the job was already in a terminal
    /// state.
    pub fn cancel(&self, job_id: &str, reason: Option<&str>) -> Result<bool, ControllerError> {
        let reason = reason.unwrap_or(DEFAULT_CANCEL_REASON);

        if let Some(active) = lock(&self.active).get(job_id) {
            if active.signal.cancel(reason) {
                info!(job_id, reason, "Cancellation requested");
            }
            return Ok(true);
        }

        let job = self
            .store
            .get_job(job_id)?
            .ok_or_else(|| ControllerError::JobNotFound(job_id.to_string()))?;
        if job.status.is_terminal() {
            info!(job_id, status = %job.status, "Cancel ignored, job already finished");
            return Ok(false);
        }

        // Pending, or running with no task in this process.
        match self
            .store
            .update_status(job_id, JobStatus::Cancelled, Some(reason))
        {
            Ok(_) => {
                info!(job_id, reason, "Job cancelled in store");
                Ok(true)
            }
            Err(StoreError::InvalidTransition { from, .. }) => {
                info!(job_id, status = %from, "Cancel ignored, job already finished");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Ids of jobs whose task is still running, sorted.
    pub fn running_jobs(&self) -> Vec<String> {
        let mut ids: Vec<String> = lock(&self.active).keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Waits until every task running at the time of the call has finished.
    pub async fn drain(&self) {
        let pending: Vec<CancellationToken> = lock(&self.active)
            .values()
            .map(|active| active.finished.clone())
            .collect();
        for finished in pending {
            finished.cancelled().await;
        }
    }

    /// Signals every running job and waits for their tasks. Returns the ids
    /// that were signalled, sorted.
    pub async fn shutdown(&self) -> Vec<String> {
        let mut signalled = Vec::new();
        for (job_id, active) in lock(&self.active).iter() {
            if active.signal.cancel(SHUTDOWN_REASON) {
                info!(job_id = %job_id, "Cancelling for shutdown");
            }
            signalled.push(job_id.clone());
        }
        self.drain().await;
        signalled.sort();
        signalled
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::discovery::LinkDiscovery;
    use crate::fetch::{Fetcher, MemoryFetcher};
    use crate::jobs::executor::ExecutorConfig;
    use crate::pdf::compose_text_pdf;
    use crate::scanner::{DocumentScanner, EntityCapability};
    use crate::storage::{RetentionPolicy, StorageManager};
    use crate::store::SqliteJobStore;

    const SOURCE: &str = "https://city.gov/council/";

    fn controller(dir: &tempfile::TempDir) -> (Arc<SqliteJobStore>, JobController) {
        let fetcher = MemoryFetcher::new();
        fetcher.insert(
            SOURCE,
            r#"<a href="/docs/minutes_2024-05-01.pdf">Minutes</a>"#,
        );
        fetcher.insert(
            "https://city.gov/docs/minutes_2024-05-01.pdf",
            compose_text_pdf(&["Zoning hearing"]).unwrap(),
        );
        let fetcher: Arc<dyn Fetcher> = Arc::new(fetcher);

        let store = Arc::new(SqliteJobStore::in_memory().unwrap());
        store.add_keyword("c1", "zoning").unwrap();

        let executor = JobExecutor::new(
            store.clone(),
            LinkDiscovery::new(Arc::clone(&fetcher)),
            DocumentScanner::new(fetcher, Arc::new(EntityCapability::pattern())),
            Arc::new(StorageManager::new(dir.path(), RetentionPolicy::default())),
            ExecutorConfig {
                source_urls: vec![SOURCE.to_string()],
                ..Default::default()
            },
        );
        (store, JobController::new(Arc::new(executor)))
    }

    #[tokio::test]
    async fn test_submit_and_join() {
        let dir = tempfile::tempdir().unwrap();
        let (_store, controller) = controller(&dir);

        let (job, handle) = controller
            .submit("c1", &NewJobConfig::default(), "admin")
            .unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(handle.job_id(), job.id);

        let outcome = handle.join().await.unwrap();
        assert_eq!(outcome.status, JobStatus::Completed);
        assert!(controller.running_jobs().is_empty());

        let report = controller.status(&job.id).unwrap();
        assert_eq!(report.job.status, JobStatus::Completed);
        assert_eq!(report.result_count, 1);
        assert!(report.progress.is_none());
    }

    #[tokio::test]
    async fn test_cancel_pending_job_never_runs() {
        let dir = tempfile::tempdir().unwrap();
        let (store, controller) = controller(&dir);
        let job = controller
            .create_job("c1", &NewJobConfig::default(), "admin")
            .unwrap();

        assert!(controller.cancel(&job.id, None).unwrap());

        let stored = store.get_job(&job.id).unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Cancelled);
        assert_eq!(stored.error_message.as_deref(), Some(DEFAULT_CANCEL_REASON));
        assert!(stored.started_at.is_none());

        assert!(matches!(
            controller.launch(&job.id),
            Err(ControllerError::NotLaunchable { .. })
        ));
        assert!(controller.running_jobs().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_terminal_job_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let (store, controller) = controller(&dir);
        let (job, handle) = controller
            .submit("c1", &NewJobConfig::default(), "admin")
            .unwrap();
        handle.join().await.unwrap();

        assert!(!controller.cancel(&job.id, Some("too late")).unwrap());
        let stored = store.get_job(&job.id).unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Completed);
        assert!(stored.error_message.is_none());
    }

    #[tokio::test]
    async fn test_cancel_unknown_job() {
        let dir = tempfile::tempdir().unwrap();
        let (_store, controller) = controller(&dir);
        assert!(matches!(
            controller.cancel("missing", None),
            Err(ControllerError::JobNotFound(_))
        ));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_cancel_launched_job_records_signal_reason() {
        let dir = tempfile::tempdir().unwrap();
        let (store, controller) = controller(&dir);
        let (job, handle) = controller
            .submit("c1", &NewJobConfig::default(), "admin")
            .unwrap();

        // On a current-thread runtime the task has not been polled yet.
        assert_eq!(controller.running_jobs(), vec![job.id.clone()]);
        assert!(controller.cancel(&job.id, Some("operator stop")).unwrap());

        let outcome = tokio::time::timeout(Duration::from_secs(10), handle.join())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome.status, JobStatus::Cancelled);
        assert_eq!(outcome.error_message.as_deref(), Some("operator stop"));

        let stored = store.get_job(&job.id).unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Cancelled);
        assert_eq!(
            store.list_results(&job.id, PageRequest::all()).unwrap().total,
            0
        );
    }

    #[tokio::test]
    async fn test_launch_twice_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (_store, controller) = controller(&dir);
        let job = controller
            .create_job("c1", &NewJobConfig::default(), "admin")
            .unwrap();
        let handle = controller.launch(&job.id).unwrap();
        let second = controller.launch(&job.id);
        assert!(matches!(
            second,
            Err(ControllerError::AlreadyRunning(_)) | Err(ControllerError::NotLaunchable { .. })
        ));
        handle.join().await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_awaits_tasks() {
        let dir = tempfile::tempdir().unwrap();
        let (store, controller) = controller(&dir);
        let (first, _) = controller
            .submit("c1", &NewJobConfig::default(), "admin")
            .unwrap();
        let (second, _) = controller
            .submit("c1", &NewJobConfig::default(), "admin")
            .unwrap();

        let mut expected = vec![first.id.clone(), second.id.clone()];
        expected.sort();
        assert_eq!(controller.shutdown().await, expected);
        assert!(controller.running_jobs().is_empty());
        for id in [&first.id, &second.id] {
            assert!(store.get_job(id).unwrap().unwrap().status.is_terminal());
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_detached_jobs_leave_no_tracked_state() {
        let dir = tempfile::tempdir().unwrap();
        let (store, controller) = controller(&dir);

        let mut ids = Vec::new();
        for _ in 0..50 {
            let (job, handle) = controller
                .submit("c1", &NewJobConfig::default(), "admin")
                .unwrap();
            drop(handle);
            ids.push(job.id);
        }

        tokio::time::timeout(Duration::from_secs(30), controller.drain())
            .await
            .unwrap();
        assert!(controller.running_jobs().is_empty());
        assert!(lock(&controller.active).is_empty());
        for id in &ids {
            assert_eq!(
                store.get_job(id).unwrap().unwrap().status,
                JobStatus::Completed
            );
        }
    }
}
