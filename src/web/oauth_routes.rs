use crate::crypto;
use crate::models::oauth::{NewOauthToken, OauthToken};
use crate::models::tenants::Tenant;
use crate::oauth::state::{decode_state, encode_state};
use crate::web::{found, ApiError, AppState, StatusResponse};
use axum::{
    extract::{Path, Query, State},
    response::Response,
    Extension, Json,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

/// Tokens within this window of expiry (or already past it) are refreshed
/// before being returned.
const REFRESH_WINDOW_SECONDS: i64 = 30;

#[derive(Debug, Deserialize)]
pub struct SetConfigRequest {
    client_id: String,
    client_secret: String,
}

/// Stores a tenant's OAuth client credentials for a provider. The client
/// secret is encrypted with the tenant data key before it touches the
/// database.
pub async fn set_config(
    State(state): State<AppState>,
    Extension(tenant): Extension<Tenant>,
    Path(provider): Path<String>,
    Json(body): Json<SetConfigRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    if body.client_id.is_empty() || body.client_secret.is_empty() {
        return Err(ApiError::BadRequest(
            "client_id and client_secret are required".to_string(),
        ));
    }

    let data_key = state
        .tenants
        .data_key(&tenant)
        .map_err(|_| ApiError::Encryption)?;
    let encrypted_client_secret =
        crypto::encrypt_with_data_key(&data_key, body.client_secret.as_bytes())
            .map_err(|_| ApiError::Encryption)?;

    state
        .db
        .upsert_oauth_config(crate::models::oauth::NewOauthProviderConfig {
            tenant_id: tenant.id,
            provider,
            client_id: body.client_id,
            encrypted_client_secret,
        })?;

    Ok(StatusResponse::ok())
}

#[derive(Debug, Deserialize)]
pub struct AuthorizeQuery {
    redirect_uri: Option<String>,
}

/// Initiates the OAuth flow by redirecting to the provider with a sealed
/// state parameter carrying the tenant id and final redirect target.
pub async fn authorize(
    State(state): State<AppState>,
    Extension(tenant): Extension<Tenant>,
    Path(provider): Path<String>,
    Query(query): Query<AuthorizeQuery>,
) -> Result<Response, ApiError> {
    let redirect_uri = query
        .redirect_uri
        .filter(|uri| !uri.is_empty())
        .ok_or_else(|| ApiError::BadRequest("redirect_uri is required".to_string()))?;

    let oauth_provider = state.providers.oauth_provider(&tenant, &provider)?;

    let oauth_state = encode_state(state.tenants.encryptor(), tenant.id, &redirect_uri)
        .map_err(|e| {
            error!(error = %e, "state encoding failed");
            ApiError::Internal
        })?;

    Ok(found(&oauth_provider.auth_url(&oauth_state)))
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
}

/// Handles the provider redirect after user authorization. The tenant is
/// recovered from the state parameter; this is the one route without bearer
/// auth.
pub async fn callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(query): Query<CallbackQuery>,
) -> Result<Response, ApiError> {
    let (code, state_param) = match (query.code, query.state) {
        (Some(code), Some(state_param)) if !code.is_empty() && !state_param.is_empty() => {
            (code, state_param)
        }
        _ => return Err(ApiError::BadRequest("missing code or state".to_string())),
    };

    let payload = decode_state(state.tenants.encryptor(), &state_param)
        .map_err(|_| ApiError::BadRequest("invalid state".to_string()))?;

    let tenant = state
        .db
        .get_tenant_by_id(payload.tenant_id)
        .map_err(|_| ApiError::BadRequest("unknown tenant".to_string()))?;

    let oauth_provider = state
        .providers
        .oauth_provider(&tenant, &provider)
        .map_err(|e| {
            error!(error = %e, "provider build failed in callback");
            ApiError::Internal
        })?;

    let token = oauth_provider
        .exchange(&code)
        .await
        .map_err(|_| ApiError::BadGateway("token exchange failed".to_string()))?;

    let user_info = oauth_provider
        .user_info(&token.access_token)
        .await
        .map_err(|_| ApiError::BadGateway("failed to fetch user info".to_string()))?;

    let data_key = state
        .tenants
        .data_key(&tenant)
        .map_err(|_| ApiError::Encryption)?;

    let encrypted_access_token =
        crypto::encrypt_with_data_key(&data_key, token.access_token.as_bytes())
            .map_err(|_| ApiError::Encryption)?;
    let encrypted_refresh_token = match token.refresh_token.as_deref() {
        Some(refresh) if !refresh.is_empty() => {
            crypto::encrypt_with_data_key(&data_key, refresh.as_bytes())
                .map_err(|_| ApiError::Encryption)?
        }
        _ => Vec::new(),
    };

    state.db.upsert_oauth_token(NewOauthToken {
        tenant_id: tenant.id,
        provider,
        user_id: user_info.id.clone(),
        encrypted_access_token,
        encrypted_refresh_token,
        expires_at: token.expires_at,
    })?;

    Ok(found(&format!(
        "{}?user_id={}",
        payload.redirect_uri, user_info.id
    )))
}

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    user_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    access_token: String,
    provider: String,
    user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
}

/// Returns the decrypted access token for a provider/user, transparently
/// refreshing it first when it is expired or about to expire.
pub async fn get_token(
    State(state): State<AppState>,
    Extension(tenant): Extension<Tenant>,
    Path(provider): Path<String>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<TokenResponse>, ApiError> {
    let user_id = query.user_id.unwrap_or_else(|| "default".to_string());

    let mut row = state
        .db
        .get_oauth_token(tenant.id, &provider, &user_id)?
        .ok_or_else(|| ApiError::NotFound("token not found".to_string()))?;

    let data_key = state
        .tenants
        .data_key(&tenant)
        .map_err(|_| ApiError::Encryption)?;

    let needs_refresh = row
        .expires_at
        .map(|expires_at| expires_at - Utc::now() < Duration::seconds(REFRESH_WINDOW_SECONDS))
        .unwrap_or(false);

    if needs_refresh {
        debug!(provider = %provider, user_id = %user_id, "token near expiry, refreshing");
        row = refresh_and_store(&state, &tenant, &provider, &user_id, row, &data_key)
            .await
            .map_err(|e| {
                error!(error = %e, "token refresh failed");
                ApiError::BadGateway("token refresh failed".to_string())
            })?;
    }

    let access_token = crypto::decrypt_with_data_key(&data_key, &row.encrypted_access_token)
        .map_err(|_| ApiError::Decryption)?;
    let access_token = String::from_utf8(access_token).map_err(|_| ApiError::Decryption)?;

    Ok(Json(TokenResponse {
        access_token,
        provider,
        user_id,
        expires_at: row.expires_at,
    }))
}

#[derive(Debug, thiserror::Error)]
enum RefreshError {
    #[error("no refresh token available")]
    NoRefreshToken,

    #[error("decrypt refresh token failed")]
    Decrypt,

    #[error("encrypt token failed")]
    Encrypt,

    #[error("provider build failed: {0}")]
    Build(String),

    #[error("provider refresh failed: {0}")]
    Provider(String),

    #[error("store refreshed token failed: {0}")]
    Store(String),
}

/// Uses the stored refresh token to obtain a new access token, persists the
/// re-encrypted result, and returns the updated row. A provider that returns
/// an empty refresh token means "keep using the existing one".
async fn refresh_and_store(
    state: &AppState,
    tenant: &Tenant,
    provider: &str,
    user_id: &str,
    row: OauthToken,
    data_key: &[u8],
) -> Result<OauthToken, RefreshError> {
    if row.encrypted_refresh_token.is_empty() {
        return Err(RefreshError::NoRefreshToken);
    }

    let refresh_token = crypto::decrypt_with_data_key(data_key, &row.encrypted_refresh_token)
        .map_err(|_| RefreshError::Decrypt)?;
    let refresh_token = String::from_utf8(refresh_token).map_err(|_| RefreshError::Decrypt)?;

    let oauth_provider = state
        .providers
        .oauth_provider(tenant, provider)
        .map_err(|e| RefreshError::Build(e.to_string()))?;

    let new_token = oauth_provider
        .refresh(&refresh_token)
        .await
        .map_err(|e| RefreshError::Provider(e.to_string()))?;

    let encrypted_access_token =
        crypto::encrypt_with_data_key(data_key, new_token.access_token.as_bytes())
            .map_err(|_| RefreshError::Encrypt)?;

    let encrypted_refresh_token = match new_token.refresh_token.as_deref() {
        Some(refresh) if !refresh.is_empty() => {
            crypto::encrypt_with_data_key(data_key, refresh.as_bytes())
                .map_err(|_| RefreshError::Encrypt)?
        }
        _ => row.encrypted_refresh_token.clone(),
    };

    state
        .db
        .upsert_oauth_token(NewOauthToken {
            tenant_id: tenant.id,
            provider: provider.to_string(),
            user_id: user_id.to_string(),
            encrypted_access_token,
            encrypted_refresh_token,
            expires_at: new_token.expires_at,
        })
        .map_err(|e| RefreshError::Store(e.to_string()))
}

/// Revokes a stored OAuth token.
pub async fn delete_token(
    State(state): State<AppState>,
    Extension(tenant): Extension<Tenant>,
    Path(provider): Path<String>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<StatusResponse>, ApiError> {
    let user_id = query.user_id.unwrap_or_else(|| "default".to_string());
    state.db.delete_oauth_token(tenant.id, &provider, &user_id)?;
    Ok(StatusResponse::deleted())
}
