use crate::models::code_executions::{CodeExecution, CodeExecutionError, NewCodeExecution};
use crate::models::email_templates::{EmailTemplate, EmailTemplateError, NewEmailTemplate};
use crate::models::jobs::{Job, JobError, JobStatusUpdate, NewJob};
use crate::models::oauth::{
    NewOauthProviderConfig, NewOauthToken, OAuthError, OauthProviderConfig, OauthToken,
};
use crate::models::provider_configs::{
    CodeProviderConfig, EmailProviderConfig, NewCodeProviderConfig, NewEmailProviderConfig,
    ProviderConfigError,
};
use crate::models::tenants::{NewTenant, Tenant, TenantError};
use chrono::{DateTime, Utc};
use diesel::{
    pg::PgConnection,
    r2d2::{ConnectionManager, Pool},
};
use std::sync::Arc;
use tracing::{debug, error, info};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum DBError {
    #[error("Database connection error")]
    ConnectionError,
    #[error("Tenant error: {0}")]
    TenantError(#[from] TenantError),
    #[error("Tenant not found")]
    TenantNotFound,
    #[error("OAuth error: {0}")]
    OAuthError(#[from] OAuthError),
    #[error("Provider config error: {0}")]
    ProviderConfigError(#[from] ProviderConfigError),
    #[error("Email template error: {0}")]
    EmailTemplateError(#[from] EmailTemplateError),
    #[error("Job error: {0}")]
    JobError(#[from] JobError),
    #[error("Code execution error: {0}")]
    CodeExecutionError(#[from] CodeExecutionError),
}

/// Typed persistence operations. Everything row-level is tenant-scoped; the
/// trait is the seam test code stubs out in place of Postgres.
pub trait DBConnection: Send + Sync {
    fn create_tenant(&self, new_tenant: NewTenant) -> Result<Tenant, DBError>;
    fn get_tenant_by_id(&self, id: Uuid) -> Result<Tenant, DBError>;
    fn get_tenant_by_api_key_hash(&self, hash: &str) -> Result<Tenant, DBError>;

    fn upsert_oauth_config(
        &self,
        config: NewOauthProviderConfig,
    ) -> Result<OauthProviderConfig, DBError>;
    fn get_oauth_config(
        &self,
        tenant_id: Uuid,
        provider: &str,
    ) -> Result<Option<OauthProviderConfig>, DBError>;

    fn upsert_oauth_token(&self, token: NewOauthToken) -> Result<OauthToken, DBError>;
    fn get_oauth_token(
        &self,
        tenant_id: Uuid,
        provider: &str,
        user_id: &str,
    ) -> Result<Option<OauthToken>, DBError>;
    fn delete_oauth_token(
        &self,
        tenant_id: Uuid,
        provider: &str,
        user_id: &str,
    ) -> Result<(), DBError>;

    fn upsert_email_config(
        &self,
        config: NewEmailProviderConfig,
    ) -> Result<EmailProviderConfig, DBError>;
    fn get_email_config(
        &self,
        tenant_id: Uuid,
        provider: &str,
    ) -> Result<Option<EmailProviderConfig>, DBError>;

    fn upsert_code_config(
        &self,
        config: NewCodeProviderConfig,
    ) -> Result<CodeProviderConfig, DBError>;
    fn get_code_config(
        &self,
        tenant_id: Uuid,
        provider: &str,
    ) -> Result<Option<CodeProviderConfig>, DBError>;

    fn upsert_email_template(&self, template: NewEmailTemplate) -> Result<EmailTemplate, DBError>;
    fn get_email_template(
        &self,
        tenant_id: Uuid,
        name: &str,
    ) -> Result<Option<EmailTemplate>, DBError>;
    fn list_email_templates(&self, tenant_id: Uuid) -> Result<Vec<EmailTemplate>, DBError>;
    fn delete_email_template(&self, tenant_id: Uuid, name: &str) -> Result<(), DBError>;

    fn create_job(&self, new_job: NewJob) -> Result<Job, DBError>;
    fn get_job(&self, id: Uuid, tenant_id: Uuid) -> Result<Option<Job>, DBError>;
    /// Claims the next eligible pending job, or `None`. See [`Job::claim_next`]
    /// for the single-claim guarantee.
    fn claim_next_job(&self) -> Result<Option<Job>, DBError>;
    fn update_job_status(&self, update: &JobStatusUpdate) -> Result<Job, DBError>;
    /// Resets `running` jobs stuck since before `stuck_since` back to
    /// `pending`. Returns how many rows were reclaimed.
    fn reclaim_stale_jobs(&self, stuck_since: DateTime<Utc>) -> Result<usize, DBError>;

    fn insert_code_execution(&self, execution: NewCodeExecution) -> Result<CodeExecution, DBError>;
    fn get_code_execution(
        &self,
        job_id: Uuid,
        tenant_id: Uuid,
    ) -> Result<Option<CodeExecution>, DBError>;
}

pub(crate) struct PostgresConnection {
    db: Pool<ConnectionManager<PgConnection>>,
}

impl DBConnection for PostgresConnection {
    fn create_tenant(&self, new_tenant: NewTenant) -> Result<Tenant, DBError> {
        debug!("Creating new tenant");
        let conn = &mut self.db.get().map_err(|_| DBError::ConnectionError)?;
        let result = new_tenant.insert(conn).map_err(DBError::from);
        if let Err(ref e) = result {
            error!("Failed to create tenant: {:?}", e);
        }
        result
    }

    fn get_tenant_by_id(&self, id: Uuid) -> Result<Tenant, DBError> {
        let conn = &mut self.db.get().map_err(|_| DBError::ConnectionError)?;
        Tenant::get_by_id(conn, id)?.ok_or(DBError::TenantNotFound)
    }

    fn get_tenant_by_api_key_hash(&self, hash: &str) -> Result<Tenant, DBError> {
        let conn = &mut self.db.get().map_err(|_| DBError::ConnectionError)?;
        Tenant::get_by_api_key_hash(conn, hash)?.ok_or(DBError::TenantNotFound)
    }

    fn upsert_oauth_config(
        &self,
        config: NewOauthProviderConfig,
    ) -> Result<OauthProviderConfig, DBError> {
        let conn = &mut self.db.get().map_err(|_| DBError::ConnectionError)?;
        config.upsert(conn).map_err(DBError::from)
    }

    fn get_oauth_config(
        &self,
        tenant_id: Uuid,
        provider: &str,
    ) -> Result<Option<OauthProviderConfig>, DBError> {
        let conn = &mut self.db.get().map_err(|_| DBError::ConnectionError)?;
        OauthProviderConfig::get(conn, tenant_id, provider).map_err(DBError::from)
    }

    fn upsert_oauth_token(&self, token: NewOauthToken) -> Result<OauthToken, DBError> {
        let conn = &mut self.db.get().map_err(|_| DBError::ConnectionError)?;
        token.upsert(conn).map_err(DBError::from)
    }

    fn get_oauth_token(
        &self,
        tenant_id: Uuid,
        provider: &str,
        user_id: &str,
    ) -> Result<Option<OauthToken>, DBError> {
        let conn = &mut self.db.get().map_err(|_| DBError::ConnectionError)?;
        OauthToken::get(conn, tenant_id, provider, user_id).map_err(DBError::from)
    }

    fn delete_oauth_token(
        &self,
        tenant_id: Uuid,
        provider: &str,
        user_id: &str,
    ) -> Result<(), DBError> {
        let conn = &mut self.db.get().map_err(|_| DBError::ConnectionError)?;
        OauthToken::delete(conn, tenant_id, provider, user_id).map_err(DBError::from)
    }

    fn upsert_email_config(
        &self,
        config: NewEmailProviderConfig,
    ) -> Result<EmailProviderConfig, DBError> {
        let conn = &mut self.db.get().map_err(|_| DBError::ConnectionError)?;
        config.upsert(conn).map_err(DBError::from)
    }

    fn get_email_config(
        &self,
        tenant_id: Uuid,
        provider: &str,
    ) -> Result<Option<EmailProviderConfig>, DBError> {
        let conn = &mut self.db.get().map_err(|_| DBError::ConnectionError)?;
        EmailProviderConfig::get(conn, tenant_id, provider).map_err(DBError::from)
    }

    fn upsert_code_config(
        &self,
        config: NewCodeProviderConfig,
    ) -> Result<CodeProviderConfig, DBError> {
        let conn = &mut self.db.get().map_err(|_| DBError::ConnectionError)?;
        config.upsert(conn).map_err(DBError::from)
    }

    fn get_code_config(
        &self,
        tenant_id: Uuid,
        provider: &str,
    ) -> Result<Option<CodeProviderConfig>, DBError> {
        let conn = &mut self.db.get().map_err(|_| DBError::ConnectionError)?;
        CodeProviderConfig::get(conn, tenant_id, provider).map_err(DBError::from)
    }

    fn upsert_email_template(&self, template: NewEmailTemplate) -> Result<EmailTemplate, DBError> {
        let conn = &mut self.db.get().map_err(|_| DBError::ConnectionError)?;
        template.upsert(conn).map_err(DBError::from)
    }

    fn get_email_template(
        &self,
        tenant_id: Uuid,
        name: &str,
    ) -> Result<Option<EmailTemplate>, DBError> {
        let conn = &mut self.db.get().map_err(|_| DBError::ConnectionError)?;
        EmailTemplate::get_by_name(conn, tenant_id, name).map_err(DBError::from)
    }

    fn list_email_templates(&self, tenant_id: Uuid) -> Result<Vec<EmailTemplate>, DBError> {
        let conn = &mut self.db.get().map_err(|_| DBError::ConnectionError)?;
        EmailTemplate::list(conn, tenant_id).map_err(DBError::from)
    }

    fn delete_email_template(&self, tenant_id: Uuid, name: &str) -> Result<(), DBError> {
        let conn = &mut self.db.get().map_err(|_| DBError::ConnectionError)?;
        EmailTemplate::delete(conn, tenant_id, name).map_err(DBError::from)
    }

    fn create_job(&self, new_job: NewJob) -> Result<Job, DBError> {
        let conn = &mut self.db.get().map_err(|_| DBError::ConnectionError)?;
        let result = new_job.insert(conn).map_err(DBError::from);
        if let Err(ref e) = result {
            error!("Failed to create job: {:?}", e);
        }
        result
    }

    fn get_job(&self, id: Uuid, tenant_id: Uuid) -> Result<Option<Job>, DBError> {
        let conn = &mut self.db.get().map_err(|_| DBError::ConnectionError)?;
        Job::get(conn, id, tenant_id).map_err(DBError::from)
    }

    fn claim_next_job(&self) -> Result<Option<Job>, DBError> {
        let conn = &mut self.db.get().map_err(|_| DBError::ConnectionError)?;
        Job::claim_next(conn).map_err(DBError::from)
    }

    fn update_job_status(&self, update: &JobStatusUpdate) -> Result<Job, DBError> {
        let conn = &mut self.db.get().map_err(|_| DBError::ConnectionError)?;
        Job::update_status(conn, update).map_err(DBError::from)
    }

    fn reclaim_stale_jobs(&self, stuck_since: DateTime<Utc>) -> Result<usize, DBError> {
        let conn = &mut self.db.get().map_err(|_| DBError::ConnectionError)?;
        Job::reclaim_stale(conn, stuck_since).map_err(DBError::from)
    }

    fn insert_code_execution(&self, execution: NewCodeExecution) -> Result<CodeExecution, DBError> {
        let conn = &mut self.db.get().map_err(|_| DBError::ConnectionError)?;
        execution.insert(conn).map_err(DBError::from)
    }

    fn get_code_execution(
        &self,
        job_id: Uuid,
        tenant_id: Uuid,
    ) -> Result<Option<CodeExecution>, DBError> {
        let conn = &mut self.db.get().map_err(|_| DBError::ConnectionError)?;
        CodeExecution::get(conn, job_id, tenant_id).map_err(DBError::from)
    }
}

pub(crate) fn setup_db(url: String) -> Arc<dyn DBConnection> {
    info!("Connecting to database...");
    let manager = ConnectionManager::<PgConnection>::new(url);
    let pool = Pool::builder()
        .max_size(10)
        .test_on_check_out(true)
        .build(manager)
        .expect("Unable to build DB connection pool");
    info!("Connected to database");
    Arc::new(PostgresConnection { db: pool })
}
