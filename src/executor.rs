use crate::code::{self, CodeError};
use crate::db::{DBConnection, DBError};
use crate::email::{self, EmailError};
use crate::models::code_executions::NewCodeExecution;
use crate::models::tenants::Tenant;
use crate::providers::{BuildError, ProviderFactory};
use crate::sms::{self, SmsError};
use crate::worker::JobExecutor;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error("tenant not found: {0}")]
    TenantNotFound(Uuid),

    #[error("unknown job type: {0}")]
    UnknownJobType(String),

    #[error("invalid {0} job payload: {1}")]
    Payload(&'static str, serde_json::Error),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Email(#[from] EmailError),

    #[error(transparent)]
    Sms(#[from] SmsError),

    #[error(transparent)]
    Code(#[from] CodeError),

    #[error(transparent)]
    Db(#[from] DBError),
}

/// Handles async execution of one job type. Each executor owns its payload
/// schema; the queue treats payloads as opaque JSON.
///
/// To support a new async provider, implement `Executor` and add an instance
/// to [`Registry::new`].
#[async_trait]
pub trait Executor: Send + Sync {
    fn job_type(&self) -> &'static str;
    async fn execute(
        &self,
        job_id: Uuid,
        tenant: &Tenant,
        payload: &serde_json::Value,
    ) -> Result<(), ExecuteError>;
}

/// The job-type dispatch table, built once at startup.
pub struct Registry {
    db: Arc<dyn DBConnection>,
    executors: HashMap<&'static str, Box<dyn Executor>>,
}

impl Registry {
    pub fn new(db: Arc<dyn DBConnection>, providers: Arc<ProviderFactory>) -> Self {
        let all: Vec<Box<dyn Executor>> = vec![
            Box::new(EmailExecutor {
                providers: providers.clone(),
            }),
            Box::new(SmsExecutor {
                providers: providers.clone(),
            }),
            Box::new(CodeExecutor {
                providers,
                db: db.clone(),
            }),
        ];

        let mut executors = HashMap::with_capacity(all.len());
        for executor in all {
            executors.insert(executor.job_type(), executor);
        }

        Registry { db, executors }
    }
}

#[async_trait]
impl JobExecutor for Registry {
    async fn execute_job(
        &self,
        job_id: Uuid,
        tenant_id: Uuid,
        job_type: &str,
        payload: &serde_json::Value,
    ) -> Result<(), ExecuteError> {
        let tenant = self
            .db
            .get_tenant_by_id(tenant_id)
            .map_err(|_| ExecuteError::TenantNotFound(tenant_id))?;

        let executor = self
            .executors
            .get(job_type)
            .ok_or_else(|| ExecuteError::UnknownJobType(job_type.to_string()))?;

        executor.execute(job_id, &tenant, payload).await
    }
}

/// Handles `email.send` jobs.
struct EmailExecutor {
    providers: Arc<ProviderFactory>,
}

#[async_trait]
impl Executor for EmailExecutor {
    fn job_type(&self) -> &'static str {
        "email.send"
    }

    async fn execute(
        &self,
        _job_id: Uuid,
        tenant: &Tenant,
        payload: &serde_json::Value,
    ) -> Result<(), ExecuteError> {
        let payload: email::JobPayload = serde_json::from_value(payload.clone())
            .map_err(|e| ExecuteError::Payload("email", e))?;
        let provider = self.providers.email_provider(tenant, &payload.provider)?;
        provider.send(&payload.message).await?;
        Ok(())
    }
}

/// Handles `sms.send` jobs.
struct SmsExecutor {
    providers: Arc<ProviderFactory>,
}

#[async_trait]
impl Executor for SmsExecutor {
    fn job_type(&self) -> &'static str {
        "sms.send"
    }

    async fn execute(
        &self,
        _job_id: Uuid,
        tenant: &Tenant,
        payload: &serde_json::Value,
    ) -> Result<(), ExecuteError> {
        let payload: sms::JobPayload = serde_json::from_value(payload.clone())
            .map_err(|e| ExecuteError::Payload("sms", e))?;
        let provider = self.providers.sms_provider(tenant, &payload.provider)?;
        provider
            .send(&payload.from, &payload.to, &payload.body)
            .await?;
        Ok(())
    }
}

/// Handles `code.execute` jobs and records the output keyed by the job id.
struct CodeExecutor {
    providers: Arc<ProviderFactory>,
    db: Arc<dyn DBConnection>,
}

#[async_trait]
impl Executor for CodeExecutor {
    fn job_type(&self) -> &'static str {
        "code.execute"
    }

    async fn execute(
        &self,
        job_id: Uuid,
        tenant: &Tenant,
        payload: &serde_json::Value,
    ) -> Result<(), ExecuteError> {
        let payload: code::JobPayload = serde_json::from_value(payload.clone())
            .map_err(|e| ExecuteError::Payload("code", e))?;
        let provider = self.providers.code_provider(tenant, &payload.provider)?;

        let result = provider
            .execute(&payload.source_code, payload.language_id, &payload.stdin)
            .await?;

        self.db.insert_code_execution(NewCodeExecution {
            job_id,
            tenant_id: tenant.id,
            stdout: result.stdout,
            stderr: result.stderr,
            compile_output: result.compile_output,
            status: result.status,
            exec_time: result.time,
            memory: result.memory,
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::crypto::Encryptor;
    use crate::models::tenants::NewTenant;
    use crate::tenant::TenantService;
    use crate::test_support::StubDB;
    use serde_json::json;

    const TEST_ROOT_KEY: &str =
        "0505050505050505050505050505050505050505050505050505050505050505";

    fn registry_with_tenant(db: Arc<StubDB>) -> (Registry, Uuid) {
        let enc = Arc::new(Encryptor::new(TEST_ROOT_KEY).unwrap());
        let (_, wrapped) = enc.generate_data_key().unwrap();
        let tenant = db
            .create_tenant(NewTenant::new("hash".to_string(), wrapped))
            .unwrap();

        let tenants = Arc::new(TenantService::new(db.clone(), enc));
        let config = Config {
            database_url: String::new(),
            root_encryption_key: TEST_ROOT_KEY.to_string(),
            base_url: "http://localhost:8080".to_string(),
            port: 8080,
            mode: crate::config::Mode::Both,
            judge0_url: "http://judge0:2358".to_string(),
            worker_concurrency: 1,
        };
        let providers = Arc::new(ProviderFactory::new(db.clone(), tenants, &config));
        (Registry::new(db, providers), tenant.id)
    }

    #[tokio::test]
    async fn unknown_job_type_is_an_error() {
        let db = Arc::new(StubDB::new());
        let (registry, tenant_id) = registry_with_tenant(db);

        let err = registry
            .execute_job(Uuid::new_v4(), tenant_id, "video.render", &json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "unknown job type: video.render");
    }

    #[tokio::test]
    async fn missing_tenant_is_an_error() {
        let db = Arc::new(StubDB::new());
        let (registry, _) = registry_with_tenant(db);

        let missing = Uuid::new_v4();
        let err = registry
            .execute_job(Uuid::new_v4(), missing, "email.send", &json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecuteError::TenantNotFound(id) if id == missing));
    }

    #[tokio::test]
    async fn malformed_payload_is_an_error() {
        let db = Arc::new(StubDB::new());
        let (registry, tenant_id) = registry_with_tenant(db);

        let err = registry
            .execute_job(
                Uuid::new_v4(),
                tenant_id,
                "email.send",
                &json!({"provider": 42}),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ExecuteError::Payload("email", _)));
    }

    #[tokio::test]
    async fn email_job_without_config_fails_with_config_not_found() {
        let db = Arc::new(StubDB::new());
        let (registry, tenant_id) = registry_with_tenant(db);

        let payload = json!({
            "provider": "smtp",
            "message": {
                "to": ["b@x"],
                "from": "a@x",
                "subject": "s",
                "body": "b"
            }
        });
        let err = registry
            .execute_job(Uuid::new_v4(), tenant_id, "email.send", &payload)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "provider config not found for smtp");
    }
}
