//! In-memory `DBConnection` stub shared by unit tests.

use crate::db::{DBConnection, DBError};
use crate::models::code_executions::{CodeExecution, NewCodeExecution};
use crate::models::email_templates::{EmailTemplate, NewEmailTemplate};
use crate::models::jobs::{Job, JobStatus, JobStatusUpdate, NewJob};
use crate::models::oauth::{
    NewOauthProviderConfig, NewOauthToken, OauthProviderConfig, OauthToken,
};
use crate::models::provider_configs::{
    CodeProviderConfig, EmailProviderConfig, NewCodeProviderConfig, NewEmailProviderConfig,
};
use crate::models::tenants::{NewTenant, Tenant};
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
pub struct StubDB {
    pub tenants: Mutex<Vec<Tenant>>,
    pub oauth_configs: Mutex<Vec<OauthProviderConfig>>,
    pub oauth_tokens: Mutex<Vec<OauthToken>>,
    pub email_configs: Mutex<Vec<EmailProviderConfig>>,
    pub code_configs: Mutex<Vec<CodeProviderConfig>>,
    pub templates: Mutex<Vec<EmailTemplate>>,
    pub jobs: Mutex<Vec<Job>>,
    pub code_executions: Mutex<Vec<CodeExecution>>,
    /// Jobs handed out by `claim_next_job`, in order.
    pub claim_queue: Mutex<VecDeque<Job>>,
    pub status_updates: Mutex<Vec<JobStatusUpdate>>,
    pub reclaim_calls: Mutex<u32>,
}

impl StubDB {
    pub fn new() -> Self {
        StubDB::default()
    }

    /// Queues a job for the next `claim_next_job` call.
    pub fn push_claimable(&self, job: Job) {
        self.claim_queue.lock().unwrap().push_back(job);
    }
}

/// Builds a claimed job the way `claim_next_job` would return it.
pub fn make_job(attempt: i32, max_attempts: i32) -> Job {
    Job {
        id: Uuid::new_v4(),
        tenant_id: Uuid::new_v4(),
        job_type: "email.send".to_string(),
        payload: serde_json::json!({}),
        status: JobStatus::Running.as_str().to_string(),
        attempt,
        max_attempts,
        error: None,
        run_at: Utc::now(),
        started_at: Some(Utc::now()),
        completed_at: None,
        created_at: Utc::now(),
    }
}

impl DBConnection for StubDB {
    fn create_tenant(&self, new_tenant: NewTenant) -> Result<Tenant, DBError> {
        let tenant = Tenant {
            id: new_tenant.id,
            api_key_hash: new_tenant.api_key_hash,
            encrypted_data_key: new_tenant.encrypted_data_key,
            created_at: Utc::now(),
        };
        self.tenants.lock().unwrap().push(tenant.clone());
        Ok(tenant)
    }

    fn get_tenant_by_id(&self, id: Uuid) -> Result<Tenant, DBError> {
        self.tenants
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or(DBError::TenantNotFound)
    }

    fn get_tenant_by_api_key_hash(&self, hash: &str) -> Result<Tenant, DBError> {
        self.tenants
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.api_key_hash == hash)
            .cloned()
            .ok_or(DBError::TenantNotFound)
    }

    fn upsert_oauth_config(
        &self,
        config: NewOauthProviderConfig,
    ) -> Result<OauthProviderConfig, DBError> {
        let row = OauthProviderConfig {
            tenant_id: config.tenant_id,
            provider: config.provider,
            client_id: config.client_id,
            encrypted_client_secret: config.encrypted_client_secret,
            updated_at: Utc::now(),
        };
        let mut configs = self.oauth_configs.lock().unwrap();
        configs.retain(|c| !(c.tenant_id == row.tenant_id && c.provider == row.provider));
        configs.push(row.clone());
        Ok(row)
    }

    fn get_oauth_config(
        &self,
        tenant_id: Uuid,
        provider: &str,
    ) -> Result<Option<OauthProviderConfig>, DBError> {
        Ok(self
            .oauth_configs
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.tenant_id == tenant_id && c.provider == provider)
            .cloned())
    }

    fn upsert_oauth_token(&self, token: NewOauthToken) -> Result<OauthToken, DBError> {
        let row = OauthToken {
            tenant_id: token.tenant_id,
            provider: token.provider,
            user_id: token.user_id,
            encrypted_access_token: token.encrypted_access_token,
            encrypted_refresh_token: token.encrypted_refresh_token,
            expires_at: token.expires_at,
            updated_at: Utc::now(),
        };
        let mut tokens = self.oauth_tokens.lock().unwrap();
        tokens.retain(|t| {
            !(t.tenant_id == row.tenant_id
                && t.provider == row.provider
                && t.user_id == row.user_id)
        });
        tokens.push(row.clone());
        Ok(row)
    }

    fn get_oauth_token(
        &self,
        tenant_id: Uuid,
        provider: &str,
        user_id: &str,
    ) -> Result<Option<OauthToken>, DBError> {
        Ok(self
            .oauth_tokens
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.tenant_id == tenant_id && t.provider == provider && t.user_id == user_id)
            .cloned())
    }

    fn delete_oauth_token(
        &self,
        tenant_id: Uuid,
        provider: &str,
        user_id: &str,
    ) -> Result<(), DBError> {
        self.oauth_tokens.lock().unwrap().retain(|t| {
            !(t.tenant_id == tenant_id && t.provider == provider && t.user_id == user_id)
        });
        Ok(())
    }

    fn upsert_email_config(
        &self,
        config: NewEmailProviderConfig,
    ) -> Result<EmailProviderConfig, DBError> {
        let row = EmailProviderConfig {
            tenant_id: config.tenant_id,
            provider: config.provider,
            encrypted_config: config.encrypted_config,
            updated_at: Utc::now(),
        };
        let mut configs = self.email_configs.lock().unwrap();
        configs.retain(|c| !(c.tenant_id == row.tenant_id && c.provider == row.provider));
        configs.push(row.clone());
        Ok(row)
    }

    fn get_email_config(
        &self,
        tenant_id: Uuid,
        provider: &str,
    ) -> Result<Option<EmailProviderConfig>, DBError> {
        Ok(self
            .email_configs
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.tenant_id == tenant_id && c.provider == provider)
            .cloned())
    }

    fn upsert_code_config(
        &self,
        config: NewCodeProviderConfig,
    ) -> Result<CodeProviderConfig, DBError> {
        let row = CodeProviderConfig {
            tenant_id: config.tenant_id,
            provider: config.provider,
            encrypted_config: config.encrypted_config,
            updated_at: Utc::now(),
        };
        let mut configs = self.code_configs.lock().unwrap();
        configs.retain(|c| !(c.tenant_id == row.tenant_id && c.provider == row.provider));
        configs.push(row.clone());
        Ok(row)
    }

    fn get_code_config(
        &self,
        tenant_id: Uuid,
        provider: &str,
    ) -> Result<Option<CodeProviderConfig>, DBError> {
        Ok(self
            .code_configs
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.tenant_id == tenant_id && c.provider == provider)
            .cloned())
    }

    fn upsert_email_template(&self, template: NewEmailTemplate) -> Result<EmailTemplate, DBError> {
        let row = EmailTemplate {
            tenant_id: template.tenant_id,
            name: template.name,
            subject: template.subject,
            body: template.body,
            html: template.html,
            updated_at: Utc::now(),
        };
        let mut templates = self.templates.lock().unwrap();
        templates.retain(|t| !(t.tenant_id == row.tenant_id && t.name == row.name));
        templates.push(row.clone());
        Ok(row)
    }

    fn get_email_template(
        &self,
        tenant_id: Uuid,
        name: &str,
    ) -> Result<Option<EmailTemplate>, DBError> {
        Ok(self
            .templates
            .lock()
            .unwrap()
            .iter()
            .find(|t| t.tenant_id == tenant_id && t.name == name)
            .cloned())
    }

    fn list_email_templates(&self, tenant_id: Uuid) -> Result<Vec<EmailTemplate>, DBError> {
        Ok(self
            .templates
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.tenant_id == tenant_id)
            .cloned()
            .collect())
    }

    fn delete_email_template(&self, tenant_id: Uuid, name: &str) -> Result<(), DBError> {
        self.templates
            .lock()
            .unwrap()
            .retain(|t| !(t.tenant_id == tenant_id && t.name == name));
        Ok(())
    }

    fn create_job(&self, new_job: NewJob) -> Result<Job, DBError> {
        let job = Job {
            id: new_job.id,
            tenant_id: new_job.tenant_id,
            job_type: new_job.job_type,
            payload: new_job.payload,
            status: new_job.status,
            attempt: new_job.attempt,
            max_attempts: new_job.max_attempts,
            error: None,
            run_at: new_job.run_at,
            started_at: None,
            completed_at: None,
            created_at: Utc::now(),
        };
        self.jobs.lock().unwrap().push(job.clone());
        Ok(job)
    }

    fn get_job(&self, id: Uuid, tenant_id: Uuid) -> Result<Option<Job>, DBError> {
        Ok(self
            .jobs
            .lock()
            .unwrap()
            .iter()
            .find(|j| j.id == id && j.tenant_id == tenant_id)
            .cloned())
    }

    fn claim_next_job(&self) -> Result<Option<Job>, DBError> {
        Ok(self.claim_queue.lock().unwrap().pop_front())
    }

    fn update_job_status(&self, update: &JobStatusUpdate) -> Result<Job, DBError> {
        self.status_updates.lock().unwrap().push(update.clone());

        let mut jobs = self.jobs.lock().unwrap();
        if let Some(job) = jobs.iter_mut().find(|j| j.id == update.id) {
            job.status = update.status.as_str().to_string();
            job.error = update.error.clone();
            job.run_at = update.run_at;
            job.completed_at = update.completed_at;
            return Ok(job.clone());
        }

        Ok(Job {
            id: update.id,
            tenant_id: Uuid::nil(),
            job_type: String::new(),
            payload: serde_json::json!({}),
            status: update.status.as_str().to_string(),
            attempt: 0,
            max_attempts: 0,
            error: update.error.clone(),
            run_at: update.run_at,
            started_at: None,
            completed_at: update.completed_at,
            created_at: Utc::now(),
        })
    }

    fn reclaim_stale_jobs(&self, _stuck_since: DateTime<Utc>) -> Result<usize, DBError> {
        *self.reclaim_calls.lock().unwrap() += 1;
        Ok(0)
    }

    fn insert_code_execution(&self, execution: NewCodeExecution) -> Result<CodeExecution, DBError> {
        let row = CodeExecution {
            job_id: execution.job_id,
            tenant_id: execution.tenant_id,
            stdout: execution.stdout,
            stderr: execution.stderr,
            compile_output: execution.compile_output,
            status: execution.status,
            exec_time: execution.exec_time,
            memory: execution.memory,
            created_at: Utc::now(),
        };
        self.code_executions.lock().unwrap().push(row.clone());
        Ok(row)
    }

    fn get_code_execution(
        &self,
        job_id: Uuid,
        tenant_id: Uuid,
    ) -> Result<Option<CodeExecution>, DBError> {
        Ok(self
            .code_executions
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.job_id == job_id && e.tenant_id == tenant_id)
            .cloned())
    }
}
