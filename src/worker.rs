use crate::db::DBConnection;
use crate::executor::ExecuteError;
use crate::models::jobs::{JobStatus, JobStatusUpdate};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use uuid::Uuid;

const POLL_INTERVAL: Duration = Duration::from_millis(500);
const RECLAIM_INTERVAL: Duration = Duration::from_secs(60);

/// A `running` job whose `started_at` is older than this is assumed
/// orphaned by a crashed worker and is put back up for claiming.
const STALE_RUNNING_MINUTES: i64 = 10;

/// Executes a single claimed job by type and payload. Implemented by the
/// executor registry; stubbed in tests.
#[async_trait]
pub trait JobExecutor: Send + Sync {
    async fn execute_job(
        &self,
        job_id: Uuid,
        tenant_id: Uuid,
        job_type: &str,
        payload: &serde_json::Value,
    ) -> Result<(), ExecuteError>;
}

/// Polls the database for pending jobs and executes them concurrently.
///
/// Workers share nothing but the persistence handle; the single-claim
/// guarantee of `claim_next_job` is the only synchronization between them.
pub struct Worker {
    db: Arc<dyn DBConnection>,
    executor: Arc<dyn JobExecutor>,
    concurrency: usize,
}

impl Worker {
    pub fn new(
        db: Arc<dyn DBConnection>,
        executor: Arc<dyn JobExecutor>,
        concurrency: usize,
    ) -> Self {
        Worker {
            db,
            executor,
            concurrency,
        }
    }

    /// Spawns `concurrency` poll loops plus one reclaim sweep, then blocks
    /// until the cancellation token fires and every loop has exited. In-flight
    /// job executions are allowed to finish.
    pub async fn start(&self, cancel: CancellationToken) {
        info!(concurrency = self.concurrency, "worker pool starting");

        let mut handles = Vec::with_capacity(self.concurrency + 1);
        for worker_id in 0..self.concurrency {
            handles.push(tokio::spawn(poll_loop(
                self.db.clone(),
                self.executor.clone(),
                cancel.clone(),
                worker_id,
            )));
        }
        handles.push(tokio::spawn(reclaim_loop(self.db.clone(), cancel.clone())));

        for handle in handles {
            let _ = handle.await;
        }
        info!("worker pool stopped");
    }
}

async fn poll_loop(
    db: Arc<dyn DBConnection>,
    executor: Arc<dyn JobExecutor>,
    cancel: CancellationToken,
    worker_id: usize,
) {
    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(worker_id, "worker loop shutting down");
                return;
            }
            _ = ticker.tick() => {
                process_next(&db, &executor).await;
            }
        }
    }
}

async fn reclaim_loop(db: Arc<dyn DBConnection>, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(RECLAIM_INTERVAL);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {
                let stuck_since = Utc::now() - ChronoDuration::minutes(STALE_RUNNING_MINUTES);
                match db.reclaim_stale_jobs(stuck_since) {
                    Ok(0) => {}
                    Ok(count) => info!(count, "reclaimed stale running jobs"),
                    Err(e) => error!(error = %e, "stale job reclaim failed"),
                }
            }
        }
    }
}

/// One poll cycle: claim at most one job, execute it, and record the outcome.
async fn process_next(db: &Arc<dyn DBConnection>, executor: &Arc<dyn JobExecutor>) {
    let job = match db.claim_next_job() {
        Ok(Some(job)) => job,
        Ok(None) => return,
        Err(e) => {
            error!(error = %e, "job claim failed");
            return;
        }
    };

    debug!(job_id = %job.id, job_type = %job.job_type, attempt = job.attempt, "job claimed");

    let result = executor
        .execute_job(job.id, job.tenant_id, &job.job_type, &job.payload)
        .await;

    let now = Utc::now();
    let update = match result {
        Ok(()) => JobStatusUpdate {
            id: job.id,
            status: JobStatus::Completed,
            error: None,
            run_at: job.run_at,
            completed_at: Some(now),
        },
        Err(e) if job.attempt < job.max_attempts => {
            let backoff = retry_backoff(job.attempt);
            info!(
                job_id = %job.id,
                attempt = job.attempt,
                backoff_secs = backoff.num_seconds(),
                error = %e,
                "job failed, scheduling retry"
            );
            JobStatusUpdate {
                id: job.id,
                status: JobStatus::Pending,
                error: Some(e.to_string()),
                run_at: now + backoff,
                completed_at: None,
            }
        }
        Err(e) => {
            error!(job_id = %job.id, attempt = job.attempt, error = %e, "job failed permanently");
            JobStatusUpdate {
                id: job.id,
                status: JobStatus::Failed,
                error: Some(e.to_string()),
                run_at: job.run_at,
                completed_at: None,
            }
        }
    };

    if let Err(e) = db.update_job_status(&update) {
        error!(job_id = %job.id, error = %e, "job status update failed");
    }
}

// The attempt counter was already incremented at claim time, so the first
// retry waits 20s, then 40s, then 80s.
fn retry_backoff(attempt: i32) -> ChronoDuration {
    ChronoDuration::seconds(10 * (1i64 << attempt))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::jobs::Job;
    use crate::providers::BuildError;
    use crate::test_support::{make_job, StubDB};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct StubExecutor {
        results: Mutex<VecDeque<Result<(), ExecuteError>>>,
        calls: Mutex<Vec<(Uuid, Uuid, String)>>,
    }

    impl StubExecutor {
        fn new(results: Vec<Result<(), ExecuteError>>) -> Self {
            StubExecutor {
                results: Mutex::new(results.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn always_ok() -> Self {
            Self::new(Vec::new())
        }
    }

    #[async_trait]
    impl JobExecutor for StubExecutor {
        async fn execute_job(
            &self,
            job_id: Uuid,
            tenant_id: Uuid,
            job_type: &str,
            _payload: &serde_json::Value,
        ) -> Result<(), ExecuteError> {
            self.calls
                .lock()
                .unwrap()
                .push((job_id, tenant_id, job_type.to_string()));
            self.results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(()))
        }
    }

    fn provider_error() -> ExecuteError {
        ExecuteError::Build(BuildError::ConfigNotFound("smtp".to_string()))
    }

    async fn run_one(db: &Arc<StubDB>, executor: StubExecutor) -> (Arc<StubExecutor>, Vec<JobStatusUpdate>) {
        let db_dyn: Arc<dyn DBConnection> = db.clone();
        let executor = Arc::new(executor);
        let executor_dyn: Arc<dyn JobExecutor> = executor.clone();
        process_next(&db_dyn, &executor_dyn).await;
        let updates = db.status_updates.lock().unwrap().clone();
        (executor, updates)
    }

    #[tokio::test]
    async fn no_pending_jobs_means_no_updates() {
        let db = Arc::new(StubDB::new());
        let (executor, updates) = run_one(&db, StubExecutor::always_ok()).await;

        assert!(executor.calls.lock().unwrap().is_empty());
        assert!(updates.is_empty());
    }

    #[tokio::test]
    async fn successful_job_is_marked_completed() {
        let db = Arc::new(StubDB::new());
        let job = make_job(1, 3);
        db.push_claimable(job.clone());

        let (executor, updates) = run_one(&db, StubExecutor::always_ok()).await;

        let calls = executor.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], (job.id, job.tenant_id, "email.send".to_string()));

        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].status, JobStatus::Completed);
        assert!(updates[0].completed_at.is_some());
        assert!(updates[0].error.is_none());
    }

    #[tokio::test]
    async fn failed_job_is_rescheduled_with_backoff() {
        let db = Arc::new(StubDB::new());
        db.push_claimable(make_job(1, 3));

        let before = Utc::now();
        let (_, updates) = run_one(&db, StubExecutor::new(vec![Err(provider_error())])).await;

        assert_eq!(updates.len(), 1);
        let update = &updates[0];
        assert_eq!(update.status, JobStatus::Pending);
        assert_eq!(
            update.error.as_deref(),
            Some("provider config not found for smtp")
        );
        assert!(update.completed_at.is_none());
        // attempt=1 → 10s * 2^1 = 20s minimum delay.
        assert!(update.run_at >= before + ChronoDuration::seconds(20));
    }

    #[tokio::test]
    async fn exhausted_job_is_marked_failed() {
        let db = Arc::new(StubDB::new());
        db.push_claimable(make_job(3, 3));

        let (_, updates) = run_one(&db, StubExecutor::new(vec![Err(provider_error())])).await;

        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].status, JobStatus::Failed);
        assert_eq!(
            updates[0].error.as_deref(),
            Some("provider config not found for smtp")
        );
    }

    #[tokio::test]
    async fn backoff_doubles_with_each_attempt() {
        for (attempt, min_secs) in [(1, 20), (2, 40), (3, 80)] {
            let db = Arc::new(StubDB::new());
            db.push_claimable(make_job(attempt, 10));

            let before = Utc::now();
            let (_, updates) = run_one(&db, StubExecutor::new(vec![Err(provider_error())])).await;

            assert_eq!(updates.len(), 1, "attempt {}", attempt);
            assert!(
                updates[0].run_at >= before + ChronoDuration::seconds(min_secs),
                "attempt {}: run_at not pushed out by {}s",
                attempt,
                min_secs
            );
        }
    }

    #[tokio::test]
    async fn run_at_does_not_move_backwards_on_terminal_states() {
        let db = Arc::new(StubDB::new());
        let job = make_job(3, 3);
        let original_run_at = job.run_at;
        db.push_claimable(job);

        let (_, updates) = run_one(&db, StubExecutor::new(vec![Err(provider_error())])).await;
        assert_eq!(updates[0].run_at, original_run_at);
    }

    #[tokio::test]
    async fn pool_processes_jobs_and_stops_on_cancel() {
        let db = Arc::new(StubDB::new());
        let job: Job = make_job(1, 3);
        db.push_claimable(job.clone());

        let executor = Arc::new(StubExecutor::always_ok());
        let worker = Worker::new(db.clone(), executor.clone(), 2);
        let cancel = CancellationToken::new();

        let pool = {
            let cancel = cancel.clone();
            tokio::spawn(async move { worker.start(cancel).await })
        };

        // Wait for the job to be picked up on a poll tick.
        for _ in 0..50 {
            if !db.status_updates.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }

        cancel.cancel();
        pool.await.unwrap();

        let updates = db.status_updates.lock().unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].id, job.id);
        assert_eq!(updates[0].status, JobStatus::Completed);

        // The reclaim sweep ticks once immediately on startup.
        assert!(*db.reclaim_calls.lock().unwrap() >= 1);
    }
}
