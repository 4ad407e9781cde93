use crate::crypto;
use crate::models::jobs::NewJob;
use crate::models::oauth::NewOauthProviderConfig;
use crate::models::tenants::Tenant;
use crate::sms;
use crate::web::email_routes::SyncQuery;
use crate::web::{ApiError, AppState, QueuedResponse, StatusResponse};
use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct SetConfigRequest {
    account_sid: String,
    auth_token: String,
}

/// Stores a tenant's SMS provider credentials. For Twilio the account SID
/// maps to client_id and the auth token to the encrypted secret in the shared
/// oauth_provider_configs table.
pub async fn set_config(
    State(state): State<AppState>,
    Extension(tenant): Extension<Tenant>,
    Path(provider): Path<String>,
    Json(body): Json<SetConfigRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    if body.account_sid.is_empty() || body.auth_token.is_empty() {
        return Err(ApiError::BadRequest(
            "account_sid and auth_token are required".to_string(),
        ));
    }

    let data_key = state
        .tenants
        .data_key(&tenant)
        .map_err(|_| ApiError::Encryption)?;
    let encrypted_client_secret =
        crypto::encrypt_with_data_key(&data_key, body.auth_token.as_bytes())
            .map_err(|_| ApiError::Encryption)?;

    state.db.upsert_oauth_config(NewOauthProviderConfig {
        tenant_id: tenant.id,
        provider,
        client_id: body.account_sid,
        encrypted_client_secret,
    })?;

    Ok(StatusResponse::ok())
}

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    from: String,
    to: String,
    body: String,
}

#[derive(Debug, Serialize)]
pub struct SendResponse {
    message_sid: String,
    status: String,
    from: String,
    to: String,
}

/// Queues an SMS job (async by default) or sends immediately with
/// `?sync=true`.
pub async fn send(
    State(state): State<AppState>,
    Extension(tenant): Extension<Tenant>,
    Path(provider): Path<String>,
    Query(query): Query<SyncQuery>,
    Json(body): Json<SendRequest>,
) -> Result<Response, ApiError> {
    if body.from.is_empty() || body.to.is_empty() || body.body.is_empty() {
        return Err(ApiError::BadRequest(
            "from, to and body are required".to_string(),
        ));
    }

    if !query.is_sync() {
        let payload = serde_json::to_value(sms::JobPayload {
            provider,
            from: body.from,
            to: body.to,
            body: body.body,
        })
        .map_err(|_| ApiError::Internal)?;

        let job = state
            .db
            .create_job(NewJob::new(tenant.id, "sms.send", payload))?;
        return Ok(QueuedResponse::new(job.id).into_response());
    }

    let sms_provider = state.providers.sms_provider(&tenant, &provider)?;
    let result = sms_provider
        .send(&body.from, &body.to, &body.body)
        .await
        .map_err(|e| ApiError::BadGateway(format!("send failed: {}", e)))?;

    Ok(Json(SendResponse {
        message_sid: result.sid,
        status: result.status,
        from: body.from,
        to: body.to,
    })
    .into_response())
}
