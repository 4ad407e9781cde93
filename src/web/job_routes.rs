use crate::models::jobs::Job;
use crate::models::tenants::Tenant;
use crate::web::{ApiError, AppState};
use axum::{
    extract::{Path, State},
    Extension, Json,
};
use uuid::Uuid;

/// Returns a background job's status. Jobs belonging to another tenant
/// return 404, not 403, so their existence is not leaked.
pub async fn get_job(
    State(state): State<AppState>,
    Extension(tenant): Extension<Tenant>,
    Path(id): Path<String>,
) -> Result<Json<Job>, ApiError> {
    let job_id =
        Uuid::parse_str(&id).map_err(|_| ApiError::BadRequest("invalid job id".to_string()))?;

    let job = state
        .db
        .get_job(job_id, tenant.id)?
        .ok_or_else(|| ApiError::NotFound("job not found".to_string()))?;

    Ok(Json(job))
}
