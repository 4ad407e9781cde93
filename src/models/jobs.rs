use crate::models::schema::jobs;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// How many executions a job gets before it is marked failed for good.
pub const DEFAULT_MAX_ATTEMPTS: i32 = 3;

#[derive(Error, Debug)]
pub enum JobError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] diesel::result::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted unit of deferred work. `attempt` counts executions already
/// claimed; `run_at` is the earliest eligible execution time and never moves
/// backwards across retries.
#[derive(Queryable, Identifiable, Serialize, Deserialize, Clone, Debug)]
#[diesel(table_name = jobs)]
pub struct Job {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub job_type: String,
    pub payload: serde_json::Value,
    pub status: String,
    pub attempt: i32,
    pub max_attempts: i32,
    pub error: Option<String>,
    pub run_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// The bookkeeping written back after an execution attempt.
#[derive(Debug, Clone)]
pub struct JobStatusUpdate {
    pub id: Uuid,
    pub status: JobStatus,
    pub error: Option<String>,
    pub run_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn get(
        conn: &mut PgConnection,
        lookup_id: Uuid,
        lookup_tenant_id: Uuid,
    ) -> Result<Option<Job>, JobError> {
        jobs::table
            .filter(jobs::id.eq(lookup_id))
            .filter(jobs::tenant_id.eq(lookup_tenant_id))
            .first::<Job>(conn)
            .optional()
            .map_err(JobError::DatabaseError)
    }

    /// Atomically claims the single oldest eligible pending job: marks it
    /// running, increments `attempt`, and stamps `started_at`.
    ///
    /// The row is selected with `FOR UPDATE SKIP LOCKED` and updated in the
    /// same transaction, so two concurrent callers can never claim the same
    /// job. Returns `Ok(None)` when nothing is eligible.
    pub fn claim_next(conn: &mut PgConnection) -> Result<Option<Job>, JobError> {
        conn.transaction::<_, diesel::result::Error, _>(|conn| {
            let candidate = jobs::table
                .filter(jobs::status.eq(JobStatus::Pending.as_str()))
                .filter(jobs::run_at.le(Utc::now()))
                .order(jobs::run_at.asc())
                .limit(1)
                .for_update()
                .skip_locked()
                .first::<Job>(conn)
                .optional()?;

            let Some(job) = candidate else {
                return Ok(None);
            };

            diesel::update(jobs::table.filter(jobs::id.eq(job.id)))
                .set((
                    jobs::status.eq(JobStatus::Running.as_str()),
                    jobs::attempt.eq(job.attempt + 1),
                    jobs::started_at.eq(Some(Utc::now())),
                ))
                .get_result::<Job>(conn)
                .map(Some)
        })
        .map_err(JobError::DatabaseError)
    }

    pub fn update_status(
        conn: &mut PgConnection,
        update: &JobStatusUpdate,
    ) -> Result<Job, JobError> {
        diesel::update(jobs::table.filter(jobs::id.eq(update.id)))
            .set((
                jobs::status.eq(update.status.as_str()),
                jobs::error.eq(update.error.clone()),
                jobs::run_at.eq(update.run_at),
                jobs::completed_at.eq(update.completed_at),
            ))
            .get_result::<Job>(conn)
            .map_err(JobError::DatabaseError)
    }

    /// Flips `running` jobs whose `started_at` predates `stuck_since` back to
    /// `pending` so another worker can pick them up. The attempt consumed by
    /// the crashed run still counts toward `max_attempts`.
    pub fn reclaim_stale(
        conn: &mut PgConnection,
        stuck_since: DateTime<Utc>,
    ) -> Result<usize, JobError> {
        diesel::update(
            jobs::table
                .filter(jobs::status.eq(JobStatus::Running.as_str()))
                .filter(jobs::started_at.lt(stuck_since)),
        )
        .set(jobs::status.eq(JobStatus::Pending.as_str()))
        .execute(conn)
        .map_err(JobError::DatabaseError)
    }
}

#[derive(Insertable)]
#[diesel(table_name = jobs)]
pub struct NewJob {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub job_type: String,
    pub payload: serde_json::Value,
    pub status: String,
    pub attempt: i32,
    pub max_attempts: i32,
    pub run_at: DateTime<Utc>,
}

impl NewJob {
    pub fn new(tenant_id: Uuid, job_type: &str, payload: serde_json::Value) -> Self {
        NewJob {
            id: Uuid::new_v4(),
            tenant_id,
            job_type: job_type.to_string(),
            payload,
            status: JobStatus::Pending.as_str().to_string(),
            attempt: 0,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            run_at: Utc::now(),
        }
    }

    pub fn insert(&self, conn: &mut PgConnection) -> Result<Job, JobError> {
        diesel::insert_into(jobs::table)
            .values(self)
            .get_result::<Job>(conn)
            .map_err(JobError::DatabaseError)
    }
}
