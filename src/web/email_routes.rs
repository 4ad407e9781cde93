use crate::crypto;
use crate::email::{self, template, Message};
use crate::models::email_templates::{EmailTemplate, NewEmailTemplate};
use crate::models::jobs::NewJob;
use crate::models::provider_configs::NewEmailProviderConfig;
use crate::models::tenants::Tenant;
use crate::web::{ApiError, AppState, QueuedResponse, StatusResponse};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Stores a tenant's email provider credentials. The body is the raw
/// provider-specific JSON config (SMTP host/port/credentials or a SendGrid
/// API key), encrypted wholesale with the tenant data key.
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

    state.db.upsert_email_config(NewEmailProviderConfig {
        tenant_id: tenant.id,
        provider,
        encrypted_config,
    })?;

    Ok(StatusResponse::ok())
}

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    to: Vec<String>,
    from: String,
    subject: String,
    body: String,
    #[serde(default)]
    html: bool,
}

#[derive(Debug, Deserialize)]
pub struct SyncQuery {
    sync: Option<String>,
}

impl SyncQuery {
    pub fn is_sync(&self) -> bool {
        self.sync.as_deref() == Some("true")
    }
}

/// Queues an email job (async by default) or sends immediately with
/// `?sync=true`.
pub async fn send(
    State(state): State<AppState>,
    Extension(tenant): Extension<Tenant>,
    Path(provider): Path<String>,
    Query(query): Query<SyncQuery>,
    Json(body): Json<SendRequest>,
) -> Result<Response, ApiError> {
    if body.to.is_empty() || body.from.is_empty() || body.subject.is_empty() || body.body.is_empty()
    {
        return Err(ApiError::BadRequest(
            "to, from, subject and body are required".to_string(),
        ));
    }

    let message = Message {
        to: body.to,
        from: body.from,
        subject: body.subject,
        body: body.body,
        html: body.html,
    };

    if !query.is_sync() {
        let payload = serde_json::to_value(email::JobPayload {
            provider,
            message,
        })
        .map_err(|_| ApiError::Internal)?;

        let job = state
            .db
            .create_job(NewJob::new(tenant.id, "email.send", payload))?;
        return Ok(QueuedResponse::new(job.id).into_response());
    }

    let email_provider = state.providers.email_provider(&tenant, &provider)?;
    email_provider
        .send(&message)
        .await
        .map_err(|_| ApiError::BadGateway("failed to send email".to_string()))?;

    Ok(StatusResponse::sent().into_response())
}

#[derive(Debug, Deserialize)]
pub struct UpsertTemplateRequest {
    name: String,
    subject: String,
    body: String,
    #[serde(default)]
    html: String,
}

/// Creates or replaces a named email template for the tenant.
pub async fn upsert_template(
    State(state): State<AppState>,
    Extension(tenant): Extension<Tenant>,
    Json(body): Json<UpsertTemplateRequest>,
) -> Result<Json<EmailTemplate>, ApiError> {
    if body.name.is_empty() || body.subject.is_empty() || body.body.is_empty() {
        return Err(ApiError::BadRequest(
            "name, subject and body are required".to_string(),
        ));
    }

    let row = state.db.upsert_email_template(NewEmailTemplate {
        tenant_id: tenant.id,
        name: body.name,
        subject: body.subject,
        body: body.body,
        html: body.html,
    })?;

    Ok(Json(row))
}

#[derive(Debug, Serialize)]
pub struct TemplateEntry {
    name: String,
    subject: String,
    body: String,
    html: String,
    custom: bool,
}

/// Lists all templates visible to the tenant: built-in defaults merged with
/// custom rows, each flagged with `custom`.
pub async fn list_templates(
    State(state): State<AppState>,
    Extension(tenant): Extension<Tenant>,
) -> Result<Json<Vec<TemplateEntry>>, ApiError> {
    let rows = state.db.list_email_templates(tenant.id)?;

    let mut custom_by_name: HashMap<&str, &EmailTemplate> = HashMap::new();
    for row in &rows {
        custom_by_name.insert(row.name.as_str(), row);
    }

    // Defaults first, then custom-only names, overrides folded in.
    let mut names: Vec<&str> = template::DEFAULT_TEMPLATE_NAMES.to_vec();
    for row in &rows {
        if !names.contains(&row.name.as_str()) {
            names.push(row.name.as_str());
        }
    }

    let mut result = Vec::with_capacity(names.len());
    for name in names {
        if let Some(row) = custom_by_name.get(name) {
            result.push(TemplateEntry {
                name: row.name.clone(),
                subject: row.subject.clone(),
                body: row.body.clone(),
                html: row.html.clone(),
                custom: true,
            });
        } else if let Some(def) = template::default_template(name) {
            result.push(TemplateEntry {
                name: name.to_string(),
                subject: def.subject,
                body: def.body,
                html: def.html,
                custom: false,
            });
        }
    }

    Ok(Json(result))
}

/// Removes a custom template, reverting the name to the built-in default if
/// one exists.
pub async fn delete_template(
    State(state): State<AppState>,
    Extension(tenant): Extension<Tenant>,
    Path(name): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    state.db.delete_email_template(tenant.id, &name)?;
    Ok(StatusResponse::deleted())
}

#[derive(Debug, Deserialize)]
pub struct SendTemplateRequest {
    template: String,
    to: Vec<String>,
    from: String,
    #[serde(default)]
    variables: HashMap<String, serde_json::Value>,
}

/// Resolves a named template (custom row first, then built-in default),
/// renders it with the provided variables, and sends it synchronously.
pub async fn send_template(
    State(state): State<AppState>,
    Extension(tenant): Extension<Tenant>,
    Path(provider): Path<String>,
    Json(body): Json<SendTemplateRequest>,
) -> Result<(StatusCode, Json<StatusResponse>), ApiError> {
    if body.template.is_empty() || body.to.is_empty() || body.from.is_empty() {
        return Err(ApiError::BadRequest(
            "template, to and from are required".to_string(),
        ));
    }

    let definition = resolve_template(&state, &tenant, &body.template)?
        .ok_or_else(|| ApiError::NotFound(format!("template not found: {}", body.template)))?;

    let rendered = template::render(&definition, &body.variables);

    let email_provider = state.providers.email_provider(&tenant, &provider)?;

    // Prefer the HTML rendering when the template defines one.
    let message = if rendered.html.is_empty() {
        Message {
            to: body.to,
            from: body.from,
            subject: rendered.subject,
            body: rendered.body,
            html: false,
        }
    } else {
        Message {
            to: body.to,
            from: body.from,
            subject: rendered.subject,
            body: rendered.html,
            html: true,
        }
    };

    email_provider
        .send(&message)
        .await
        .map_err(|_| ApiError::BadGateway("failed to send email".to_string()))?;

    Ok((StatusCode::OK, StatusResponse::sent()))
}

/// Template lookup order: the tenant's custom row, then built-in defaults.
fn resolve_template(
    state: &AppState,
    tenant: &Tenant,
    name: &str,
) -> Result<Option<template::TemplateDefinition>, ApiError> {
    if let Some(row) = state.db.get_email_template(tenant.id, name)? {
        return Ok(Some(template::TemplateDefinition {
            subject: row.subject,
            body: row.body,
            html: row.html,
        }));
    }
    Ok(template::default_template(name))
}
