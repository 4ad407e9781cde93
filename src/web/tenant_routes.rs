use crate::web::{ApiError, AppState};
use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use tracing::error;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct CreateTenantResponse {
    tenant_id: Uuid,
    api_key: String,
    note: &'static str,
}

/// Provisions a new tenant and returns the API key. The raw key is shown
/// exactly once; only its hash is persisted.
pub async fn create_tenant(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<CreateTenantResponse>), ApiError> {
    let (api_key, tenant_id) = state.tenants.create().map_err(|e| {
        error!(error = %e, "tenant creation failed");
        ApiError::Internal
    })?;

    Ok((
        StatusCode::CREATED,
        Json(CreateTenantResponse {
            tenant_id,
            api_key,
            note: "Store this API key — it will not be shown again.",
        }),
    ))
}
