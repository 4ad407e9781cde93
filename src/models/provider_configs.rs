use crate::models::schema::{code_provider_configs, email_provider_configs};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum ProviderConfigError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] diesel::result::Error),
}

/// A tenant's email provider credentials, stored as an encrypted JSON blob
/// whose shape is owned by the provider (SMTP host/port/credentials, a
/// SendGrid API key, ...).
#[derive(Queryable, Identifiable, Serialize, Deserialize, Clone, Debug)]
#[diesel(table_name = email_provider_configs)]
#[diesel(primary_key(tenant_id, provider))]
pub struct EmailProviderConfig {
    pub tenant_id: Uuid,
    pub provider: String,
    #[serde(skip_serializing)]
    pub encrypted_config: Vec<u8>,
    pub updated_at: DateTime<Utc>,
}

impl EmailProviderConfig {
    pub fn get(
        conn: &mut PgConnection,
        lookup_tenant_id: Uuid,
        lookup_provider: &str,
    ) -> Result<Option<EmailProviderConfig>, ProviderConfigError> {
        email_provider_configs::table
            .filter(email_provider_configs::tenant_id.eq(lookup_tenant_id))
            .filter(email_provider_configs::provider.eq(lookup_provider))
            .first::<EmailProviderConfig>(conn)
            .optional()
            .map_err(ProviderConfigError::DatabaseError)
    }
}

#[derive(Insertable)]
#[diesel(table_name = email_provider_configs)]
pub struct NewEmailProviderConfig {
    pub tenant_id: Uuid,
    pub provider: String,
    pub encrypted_config: Vec<u8>,
}

impl NewEmailProviderConfig {
    pub fn upsert(&self, conn: &mut PgConnection) -> Result<EmailProviderConfig, ProviderConfigError> {
        diesel::insert_into(email_provider_configs::table)
            .values(self)
            .on_conflict((
                email_provider_configs::tenant_id,
                email_provider_configs::provider,
            ))
            .do_update()
            .set((
                email_provider_configs::encrypted_config.eq(self.encrypted_config.clone()),
                email_provider_configs::updated_at.eq(diesel::dsl::now),
            ))
            .get_result::<EmailProviderConfig>(conn)
            .map_err(ProviderConfigError::DatabaseError)
    }
}

/// A tenant's code-execution provider override (e.g. a self-hosted Judge0
/// URL plus auth token), encrypted like the email configs.
#[derive(Queryable, Identifiable, Serialize, Deserialize, Clone, Debug)]
#[diesel(table_name = code_provider_configs)]
#[diesel(primary_key(tenant_id, provider))]
pub struct CodeProviderConfig {
    pub tenant_id: Uuid,
    pub provider: String,
    #[serde(skip_serializing)]
    pub encrypted_config: Vec<u8>,
    pub updated_at: DateTime<Utc>,
}

impl CodeProviderConfig {
    pub fn get(
        conn: &mut PgConnection,
        lookup_tenant_id: Uuid,
        lookup_provider: &str,
    ) -> Result<Option<CodeProviderConfig>, ProviderConfigError> {
        code_provider_configs::table
            .filter(code_provider_configs::tenant_id.eq(lookup_tenant_id))
            .filter(code_provider_configs::provider.eq(lookup_provider))
            .first::<CodeProviderConfig>(conn)
            .optional()
            .map_err(ProviderConfigError::DatabaseError)
    }
}

#[derive(Insertable)]
#[diesel(table_name = code_provider_configs)]
pub struct NewCodeProviderConfig {
    pub tenant_id: Uuid,
    pub provider: String,
    pub encrypted_config: Vec<u8>,
}

impl NewCodeProviderConfig {
    pub fn upsert(&self, conn: &mut PgConnection) -> Result<CodeProviderConfig, ProviderConfigError> {
        diesel::insert_into(code_provider_configs::table)
            .values(self)
            .on_conflict((
                code_provider_configs::tenant_id,
                code_provider_configs::provider,
            ))
            .do_update()
            .set((
                code_provider_configs::encrypted_config.eq(self.encrypted_config.clone()),
                code_provider_configs::updated_at.eq(diesel::dsl::now),
            ))
            .get_result::<CodeProviderConfig>(conn)
            .map_err(ProviderConfigError::DatabaseError)
    }
}
