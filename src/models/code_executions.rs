use crate::models::schema::code_executions;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum CodeExecutionError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] diesel::result::Error),
}

/// The captured output of a completed `code.execute` job, written exactly
/// once per job and keyed by the job id.
#[derive(Queryable, Identifiable, Serialize, Deserialize, Clone, Debug)]
#[diesel(table_name = code_executions)]
#[diesel(primary_key(job_id))]
pub struct CodeExecution {
    pub job_id: Uuid,
    pub tenant_id: Uuid,
    pub stdout: String,
    pub stderr: String,
    pub compile_output: String,
    pub status: String,
    pub exec_time: String,
    pub memory: i32,
    pub created_at: DateTime<Utc>,
}

impl CodeExecution {
    pub fn get(
        conn: &mut PgConnection,
        lookup_job_id: Uuid,
        lookup_tenant_id: Uuid,
    ) -> Result<Option<CodeExecution>, CodeExecutionError> {
        code_executions::table
            .filter(code_executions::job_id.eq(lookup_job_id))
            .filter(code_executions::tenant_id.eq(lookup_tenant_id))
            .first::<CodeExecution>(conn)
            .optional()
            .map_err(CodeExecutionError::DatabaseError)
    }
}

#[derive(Insertable)]
#[diesel(table_name = code_executions)]
pub struct NewCodeExecution {
    pub job_id: Uuid,
    pub tenant_id: Uuid,
    pub stdout: String,
    pub stderr: String,
    pub compile_output: String,
    pub status: String,
    pub exec_time: String,
    pub memory: i32,
}

impl NewCodeExecution {
    pub fn insert(&self, conn: &mut PgConnection) -> Result<CodeExecution, CodeExecutionError> {
        diesel::insert_into(code_executions::table)
            .values(self)
            .get_result::<CodeExecution>(conn)
            .map_err(CodeExecutionError::DatabaseError)
    }
}
