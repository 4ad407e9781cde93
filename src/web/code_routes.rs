use crate::code;
use crate::crypto;
use crate::models::code_executions::CodeExecution;
use crate::models::jobs::NewJob;
use crate::models::provider_configs::NewCodeProviderConfig;
use crate::models::tenants::Tenant;
use crate::web::email_routes::SyncQuery;
use crate::web::{ApiError, AppState, QueuedResponse, StatusResponse};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

/// Stores a tenant's code execution provider config (encrypted). For Judge0
/// the body is `{"url": "http://...", "auth_token": "optional"}`; without a
/// stored config the server falls back to the JUDGE0_URL environment default.
pub async fn set_config(
    State(state): State<AppState>,
    Extension(tenant): Extension<Tenant>,
    Path(provider): Path<String>,
    body: Bytes,
) -> Result<Json<StatusResponse>, ApiError> {
    if serde_json::from_slice::<serde_json::Value>(&body).is_err() {
        return Err(ApiError::BadRequest("invalid JSON".to_string()));
    }

    let data_key = state
        .tenants
        .data_key(&tenant)
        .map_err(|_| ApiError::Encryption)?;
    let encrypted_config =
        crypto::encrypt_with_data_key(&data_key, &body).map_err(|_| ApiError::Encryption)?;

    state.db.upsert_code_config(NewCodeProviderConfig {
        tenant_id: tenant.id,
        provider,
        encrypted_config,
    })?;

    Ok(StatusResponse::ok())
}

#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    source_code: String,
    language_id: i32,
    #[serde(default)]
    stdin: String,
}

/// Queues a code execution job (async by default) or runs it immediately with
/// `?sync=true`. Async results are retrieved via GET /code/executions/:job_id
/// once GET /jobs/:id reports the job completed.
pub async fn execute(
    State(state): State<AppState>,
    Extension(tenant): Extension<Tenant>,
    Path(provider): Path<String>,
    Query(query): Query<SyncQuery>,
    Json(body): Json<ExecuteRequest>,
) -> Result<Response, ApiError> {
    if body.source_code.is_empty() || body.language_id == 0 {
        return Err(ApiError::BadRequest(
            "source_code and language_id are required".to_string(),
        ));
    }

    if !query.is_sync() {
        let payload = serde_json::to_value(code::JobPayload {
            provider,
            source_code: body.source_code,
            language_id: body.language_id,
            stdin: body.stdin,
        })
        .map_err(|_| ApiError::Internal)?;

        let job = state
            .db
            .create_job(NewJob::new(tenant.id, "code.execute", payload))?;
        return Ok(QueuedResponse::new(job.id).into_response());
    }

    let code_provider = state.providers.code_provider(&tenant, &provider)?;
    let result = code_provider
        .execute(&body.source_code, body.language_id, &body.stdin)
        .await
        .map_err(|e| ApiError::BadGateway(e.to_string()))?;

    Ok(Json(result).into_response())
}

/// Returns the stored output of a completed code.execute job, scoped to the
/// calling tenant.
pub async fn get_execution(
    State(state): State<AppState>,
    Extension(tenant): Extension<Tenant>,
    Path(job_id): Path<String>,
) -> Result<Json<CodeExecution>, ApiError> {
    let job_id = Uuid::parse_str(&job_id)
        .map_err(|_| ApiError::BadRequest("invalid job id".to_string()))?;

    let execution = state
        .db
        .get_code_execution(job_id, tenant.id)?
        .ok_or_else(|| ApiError::NotFound("execution result not found".to_string()))?;

    Ok(Json(execution))
}
