use crate::config::Config;
use crate::db::{DBConnection, DBError};
use crate::providers::{BuildError, ProviderFactory};
use crate::tenant::TenantService;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

mod code_routes;
mod email_routes;
mod job_routes;
mod oauth_routes;
mod sms_routes;
mod tenant_routes;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DBConnection>,
    pub tenants: Arc<TenantService>,
    pub providers: Arc<ProviderFactory>,
    pub config: Arc<Config>,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("missing API key")]
    MissingApiKey,

    #[error("invalid API key")]
    InvalidApiKey,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("encryption error")]
    Encryption,

    #[error("decryption error")]
    Decryption,

    #[error("{0}")]
    BadGateway(String),

    #[error("internal server error")]
    Internal,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    status: u16,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::MissingApiKey | ApiError::InvalidApiKey => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Encryption | ApiError::Decryption | ApiError::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ApiError::BadGateway(_) => StatusCode::BAD_GATEWAY,
        };
        (
            status,
            Json(ErrorResponse {
                status: status.as_u16(),
                message: self.to_string(),
            }),
        )
            .into_response()
    }
}

impl From<DBError> for ApiError {
    fn from(e: DBError) -> Self {
        tracing::error!(error = %e, "database operation failed");
        ApiError::Internal
    }
}

impl From<BuildError> for ApiError {
    fn from(e: BuildError) -> Self {
        match e {
            BuildError::ConfigNotFound(_)
            | BuildError::Unsupported(_)
            | BuildError::InvalidConfig(_) => ApiError::BadRequest(e.to_string()),
            BuildError::Encryption => ApiError::Encryption,
            BuildError::OAuth(_) => ApiError::BadRequest(e.to_string()),
            BuildError::Db(db) => db.into(),
        }
    }
}

/// Small fixed-status responses shared across handlers.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    status: &'static str,
}

impl StatusResponse {
    pub fn ok() -> Json<Self> {
        Json(StatusResponse { status: "ok" })
    }

    pub fn sent() -> Json<Self> {
        Json(StatusResponse { status: "sent" })
    }

    pub fn deleted() -> Json<Self> {
        Json(StatusResponse { status: "deleted" })
    }
}

/// Returned by the async send/execute endpoints.
#[derive(Debug, Serialize)]
pub struct QueuedResponse {
    pub job_id: Uuid,
    pub status: &'static str,
}

impl QueuedResponse {
    pub fn new(job_id: Uuid) -> (StatusCode, Json<Self>) {
        (
            StatusCode::ACCEPTED,
            Json(QueuedResponse {
                job_id,
                status: "queued",
            }),
        )
    }
}

/// A plain 302 Found redirect (axum's `Redirect` helpers emit 303/307/308).
pub fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

/// Validates the Bearer API key and attaches the tenant to the request.
/// Every route except tenant provisioning and the OAuth callback runs
/// behind this.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header_value = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let Some(raw_key) = header_value.strip_prefix("Bearer ") else {
        return Err(ApiError::MissingApiKey);
    };

    let tenant = state
        .tenants
        .get_by_api_key(raw_key)
        .map_err(|_| ApiError::InvalidApiKey)?;

    request.extensions_mut().insert(tenant);
    Ok(next.run(request).await)
}

pub fn router(state: AppState) -> Router {
    let authed = Router::new()
        .route("/oauth/:provider/config", post(oauth_routes::set_config))
        .route("/oauth/:provider/authorize", get(oauth_routes::authorize))
        .route("/oauth/:provider/token", get(oauth_routes::get_token))
        .route("/oauth/:provider/token", delete(oauth_routes::delete_token))
        .route("/email/:provider/config", post(email_routes::set_config))
        .route("/email/:provider/send", post(email_routes::send))
        .route(
            "/email/:provider/send-template",
            post(email_routes::send_template),
        )
        .route("/email/templates", post(email_routes::upsert_template))
        .route("/email/templates", get(email_routes::list_templates))
        .route(
            "/email/templates/:name",
            delete(email_routes::delete_template),
        )
        .route("/sms/:provider/config", post(sms_routes::set_config))
        .route("/sms/:provider/send", post(sms_routes::send))
        .route("/code/:provider/config", post(code_routes::set_config))
        .route("/code/:provider/execute", post(code_routes::execute))
        .route("/code/executions/:job_id", get(code_routes::get_execution))
        .route("/jobs/:id", get(job_routes::get_job))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_headers(Any)
        .allow_origin(Any);

    Router::new()
        .route("/tenants", post(tenant_routes::create_tenant))
        // Called by the provider, not the tenant: identity comes from the
        // state parameter instead of a bearer key.
        .route("/oauth/:provider/callback", get(oauth_routes::callback))
        .merge(authed)
        .layer(cors)
        .with_state(state)
}
