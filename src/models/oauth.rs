use crate::models::schema::{oauth_provider_configs, oauth_tokens};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum OAuthError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] diesel::result::Error),
}

/// A tenant's client credentials for one OAuth provider. The Twilio SMS
/// credentials share this table: account_sid maps to `client_id` and the auth
/// token to `encrypted_client_secret`.
#[derive(Queryable, Identifiable, Serialize, Deserialize, Clone, Debug)]
#[diesel(table_name = oauth_provider_configs)]
#[diesel(primary_key(tenant_id, provider))]
pub struct OauthProviderConfig {
    pub tenant_id: Uuid,
    pub provider: String,
    pub client_id: String,
    #[serde(skip_serializing)]
    pub encrypted_client_secret: Vec<u8>,
    pub updated_at: DateTime<Utc>,
}

impl OauthProviderConfig {
    pub fn get(
        conn: &mut PgConnection,
        lookup_tenant_id: Uuid,
        lookup_provider: &str,
    ) -> Result<Option<OauthProviderConfig>, OAuthError> {
        oauth_provider_configs::table
            .filter(oauth_provider_configs::tenant_id.eq(lookup_tenant_id))
            .filter(oauth_provider_configs::provider.eq(lookup_provider))
            .first::<OauthProviderConfig>(conn)
            .optional()
            .map_err(OAuthError::DatabaseError)
    }
}

#[derive(Insertable)]
#[diesel(table_name = oauth_provider_configs)]
pub struct NewOauthProviderConfig {
    pub tenant_id: Uuid,
    pub provider: String,
    pub client_id: String,
    pub encrypted_client_secret: Vec<u8>,
}

impl NewOauthProviderConfig {
    pub fn upsert(&self, conn: &mut PgConnection) -> Result<OauthProviderConfig, OAuthError> {
        diesel::insert_into(oauth_provider_configs::table)
            .values(self)
            .on_conflict((
                oauth_provider_configs::tenant_id,
                oauth_provider_configs::provider,
            ))
            .do_update()
            .set((
                oauth_provider_configs::client_id.eq(self.client_id.clone()),
                oauth_provider_configs::encrypted_client_secret
                    .eq(self.encrypted_client_secret.clone()),
                oauth_provider_configs::updated_at.eq(diesel::dsl::now),
            ))
            .get_result::<OauthProviderConfig>(conn)
            .map_err(OAuthError::DatabaseError)
    }
}

/// Encrypted OAuth tokens for one (tenant, provider, user) triple. An empty
/// `encrypted_refresh_token` means the provider issued no refresh token.
#[derive(Queryable, Identifiable, Serialize, Deserialize, Clone, Debug)]
#[diesel(table_name = oauth_tokens)]
#[diesel(primary_key(tenant_id, provider, user_id))]
pub struct OauthToken {
    pub tenant_id: Uuid,
    pub provider: String,
    pub user_id: String,
    #[serde(skip_serializing)]
    pub encrypted_access_token: Vec<u8>,
    #[serde(skip_serializing)]
    pub encrypted_refresh_token: Vec<u8>,
    pub expires_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl OauthToken {
    pub fn get(
        conn: &mut PgConnection,
        lookup_tenant_id: Uuid,
        lookup_provider: &str,
        lookup_user_id: &str,
    ) -> Result<Option<OauthToken>, OAuthError> {
        oauth_tokens::table
            .filter(oauth_tokens::tenant_id.eq(lookup_tenant_id))
            .filter(oauth_tokens::provider.eq(lookup_provider))
            .filter(oauth_tokens::user_id.eq(lookup_user_id))
            .first::<OauthToken>(conn)
            .optional()
            .map_err(OAuthError::DatabaseError)
    }

    pub fn delete(
        conn: &mut PgConnection,
        lookup_tenant_id: Uuid,
        lookup_provider: &str,
        lookup_user_id: &str,
    ) -> Result<(), OAuthError> {
        diesel::delete(
            oauth_tokens::table
                .filter(oauth_tokens::tenant_id.eq(lookup_tenant_id))
                .filter(oauth_tokens::provider.eq(lookup_provider))
                .filter(oauth_tokens::user_id.eq(lookup_user_id)),
        )
        .execute(conn)
        .map(|_| ())
        .map_err(OAuthError::DatabaseError)
    }
}

#[derive(Insertable)]
#[diesel(table_name = oauth_tokens)]
pub struct NewOauthToken {
    pub tenant_id: Uuid,
    pub provider: String,
    pub user_id: String,
    pub encrypted_access_token: Vec<u8>,
    pub encrypted_refresh_token: Vec<u8>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl NewOauthToken {
    pub fn upsert(&self, conn: &mut PgConnection) -> Result<OauthToken, OAuthError> {
        diesel::insert_into(oauth_tokens::table)
            .values(self)
            .on_conflict((
                oauth_tokens::tenant_id,
                oauth_tokens::provider,
                oauth_tokens::user_id,
            ))
            .do_update()
            .set((
                oauth_tokens::encrypted_access_token.eq(self.encrypted_access_token.clone()),
                oauth_tokens::encrypted_refresh_token.eq(self.encrypted_refresh_token.clone()),
                oauth_tokens::expires_at.eq(self.expires_at),
                oauth_tokens::updated_at.eq(diesel::dsl::now),
            ))
            .get_result::<OauthToken>(conn)
            .map_err(OAuthError::DatabaseError)
    }
}
