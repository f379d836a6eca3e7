//! Retry-with-backoff around job store writes.

use std::time::Duration;

use tracing::warn;

use crate::store::{JobStore, StoreError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Delay after the given failed attempt (1-based), doubling each time.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Runs `op` against `store`, reconnecting and backing off between
    /// attempts. Only transient errors are retried.
    pub async fn run<T, F>(&self, store: &dyn JobStore, op_name: &str, mut op: F) -> Result<T, StoreError>
    where
        F: FnMut(&dyn JobStore) -> Result<T, StoreError>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(store) {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_transient() || attempt >= max_attempts => return Err(e),
                Err(e) => {
                    let delay = self.backoff_for(attempt);
                    warn!(
                        op = op_name,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Store write failed, reconnecting"
                    );
                    tokio::time::sleep(delay).await;
                    if let Err(e) = store.reconnect() {
                        warn!(op = op_name, error = %e, "Reconnect failed");
                    }
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::db::DatabaseError;
    use crate::store::*;

    /// Wraps a real store and fails the first `failures` result writes.
    pub(crate) struct FlakyStore {
        pub inner: SqliteJobStore,
        pub failures: AtomicU32,
        pub reconnects: AtomicU32,
        pub save_calls: AtomicU32,
    }

    impl FlakyStore {
        pub fn new(failures: u32) -> Self {
            Self {
                inner: SqliteJobStore::in_memory().unwrap(),
                failures: AtomicU32::new(failures),
                reconnects: AtomicU32::new(0),
                save_calls: AtomicU32::new(0),
            }
        }
    }

    impl JobStore for FlakyStore {
        fn create_config(&self, c: &NewJobConfig) -> Result<JobConfig, StoreError> {
            self.inner.create_config(c)
        }
        fn create_job(&self, j: &NewJob) -> Result<Job, StoreError> {
            self.inner.create_job(j)
        }
        fn get_job(&self, id: &str) -> Result<Option<Job>, StoreError> {
            self.inner.get_job(id)
        }
        fn get_config(&self, id: &str) -> Result<Option<JobConfig>, StoreError> {
            self.inner.get_config(id)
        }
        fn update_status(
            &self,
            id: &str,
            status: JobStatus,
            error_message: Option<&str>,
        ) -> Result<Job, StoreError> {
            self.inner.update_status(id, status, error_message)
        }
        fn save_result(&self, r: &NewMatchResult) -> Result<MatchResult, StoreError> {
            self.save_calls.fetch_add(1, Ordering::SeqCst);
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(StoreError::Database(DatabaseError::LockPoisoned));
            }
            self.inner.save_result(r)
        }
        fn list_results(&self, id: &str, p: PageRequest) -> Result<Page<MatchResult>, StoreError> {
            self.inner.list_results(id, p)
        }
        fn keyword_counts(&self, id: &str) -> Result<Vec<KeywordCount>, StoreError> {
            self.inner.keyword_counts(id)
        }
        fn list_jobs(&self, f: &JobFilter) -> Result<Page<Job>, StoreError> {
            self.inner.list_jobs(f)
        }
        fn active_keywords(&self, client_id: &str) -> Result<Vec<Keyword>, StoreError> {
            self.inner.active_keywords(client_id)
        }
        fn reconnect(&self) -> Result<(), StoreError> {
            self.reconnects.fetch_add(1, Ordering::SeqCst);
            self.inner.reconnect()
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(4),
        }
    }

    fn seeded(store: &FlakyStore) -> NewMatchResult {
        let config = store.create_config(&NewJobConfig::default()).unwrap();
        let job = store
            .create_job(&NewJob {
                client_id: "c1".to_string(),
                config_id: config.id,
                created_by: "admin".to_string(),
            })
            .unwrap();
        let keyword = store.inner.add_keyword("c1", "zoning").unwrap();
        NewMatchResult {
            job_id: job.id,
            pdf_filename: "a.pdf".to_string(),
            page_number: 1,
            keyword_id: keyword.id,
            snippet: "zoning".to_string(),
            entities: String::new(),
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(350),
        };
        assert_eq!(policy.backoff_for(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(200));
        assert_eq!(policy.backoff_for(3), Duration::from_millis(350));
        assert_eq!(policy.backoff_for(40), Duration::from_millis(350));
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failures() {
        let store = FlakyStore::new(2);
        let result = seeded(&store);

        let saved = fast_policy(3)
            .run(&store, "save_result", |s| s.save_result(&result))
            .await
            .unwrap();
        assert_eq!(saved.keyword, "zoning");
        assert_eq!(store.save_calls.load(Ordering::SeqCst), 3);
        assert_eq!(store.reconnects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let store = FlakyStore::new(10);
        let result = seeded(&store);

        let err = fast_policy(3)
            .run(&store, "save_result", |s| s.save_result(&result))
            .await
            .unwrap_err();
        assert!(err.is_transient());
        assert_eq!(store.save_calls.load(Ordering::SeqCst), 3);
        assert_eq!(store.reconnects.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_permanent_errors_are_not_retried() {
        let store = FlakyStore::new(0);
        let mut calls = 0;
        let err = fast_policy(5)
            .run(&store, "update_status", |s| {
                calls += 1;
                s.update_status("missing", JobStatus::Running, None)
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
        assert_eq!(calls, 1);
        assert_eq!(store.reconnects.load(Ordering::SeqCst), 0);
    }
}
