use crate::code::{self, Judge0Config, Judge0Provider};
use crate::config::Config;
use crate::crypto;
use crate::db::{DBConnection, DBError};
use crate::email::{self, SendGridConfig, SendGridProvider, SmtpConfig, SmtpProvider};
use crate::models::tenants::Tenant;
use crate::oauth::{self, GoogleProvider, OAuthError, SlackProvider};
use crate::sms::{self, TwilioProvider};
use crate::tenant::TenantService;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("provider config not found for {0}")]
    ConfigNotFound(String),

    #[error("unsupported provider: {0}")]
    Unsupported(String),

    #[error("invalid {0} config")]
    InvalidConfig(&'static str),

    #[error("encryption error")]
    Encryption,

    #[error(transparent)]
    Db(#[from] DBError),

    #[error(transparent)]
    OAuth(#[from] OAuthError),
}

/// Builds provider adapters from a tenant's stored (encrypted) credentials.
///
/// Both the synchronous HTTP handlers and the async job executors construct
/// providers through this factory, so the two paths cannot drift apart.
pub struct ProviderFactory {
    db: Arc<dyn DBConnection>,
    tenants: Arc<TenantService>,
    base_url: String,
    judge0_url: String,
}

impl ProviderFactory {
    pub fn new(db: Arc<dyn DBConnection>, tenants: Arc<TenantService>, config: &Config) -> Self {
        ProviderFactory {
            db,
            tenants,
            base_url: config.base_url.clone(),
            judge0_url: config.judge0_url.clone(),
        }
    }

    /// Loads and decrypts the tenant's OAuth client credentials and constructs
    /// the named provider with this gateway's callback URL.
    pub fn oauth_provider(
        &self,
        tenant: &Tenant,
        provider_name: &str,
    ) -> Result<Box<dyn oauth::Provider>, BuildError> {
        let config = self
            .db
            .get_oauth_config(tenant.id, provider_name)?
            .ok_or_else(|| BuildError::ConfigNotFound(provider_name.to_string()))?;

        let client_secret = self.decrypt_string(tenant, &config.encrypted_client_secret)?;
        let callback_url = format!("{}/oauth/{}/callback", self.base_url, provider_name);

        match provider_name {
            "google" => Ok(Box::new(GoogleProvider::new(
                config.client_id,
                client_secret,
                callback_url,
            )?)),
            "slack" => Ok(Box::new(SlackProvider::new(
                config.client_id,
                client_secret,
                callback_url,
            )?)),
            other => Err(BuildError::Unsupported(other.to_string())),
        }
    }

    pub fn email_provider(
        &self,
        tenant: &Tenant,
        provider_name: &str,
    ) -> Result<Box<dyn email::Provider>, BuildError> {
        let config = self
            .db
            .get_email_config(tenant.id, provider_name)?
            .ok_or_else(|| BuildError::ConfigNotFound(provider_name.to_string()))?;

        let config_json = self.decrypt_bytes(tenant, &config.encrypted_config)?;

        match provider_name {
            "smtp" => {
                let smtp_config: SmtpConfig = serde_json::from_slice(&config_json)
                    .map_err(|_| BuildError::InvalidConfig("smtp"))?;
                Ok(Box::new(SmtpProvider::new(smtp_config)))
            }
            "sendgrid" => {
                let sendgrid_config: SendGridConfig = serde_json::from_slice(&config_json)
                    .map_err(|_| BuildError::InvalidConfig("sendgrid"))?;
                Ok(Box::new(SendGridProvider::new(sendgrid_config)))
            }
            other => Err(BuildError::Unsupported(other.to_string())),
        }
    }

    /// SMS credentials share the OAuth config table: the Twilio account SID
    /// is stored as client_id and the auth token as the encrypted secret.
    pub fn sms_provider(
        &self,
        tenant: &Tenant,
        provider_name: &str,
    ) -> Result<Box<dyn sms::Provider>, BuildError> {
        let config = self
            .db
            .get_oauth_config(tenant.id, provider_name)?
            .ok_or_else(|| BuildError::ConfigNotFound(provider_name.to_string()))?;

        let auth_token = self.decrypt_string(tenant, &config.encrypted_client_secret)?;

        match provider_name {
            "twilio" => Ok(Box::new(TwilioProvider::new(config.client_id, auth_token))),
            other => Err(BuildError::Unsupported(other.to_string())),
        }
    }

    /// Builds the named code provider. Tenants may override the environment
    /// default URL and set an auth token; if any step of loading the override
    /// fails, the environment default is used silently.
    pub fn code_provider(
        &self,
        tenant: &Tenant,
        provider_name: &str,
    ) -> Result<Box<dyn code::Provider>, BuildError> {
        match provider_name {
            "judge0" => {
                let mut config = Judge0Config {
                    url: self.judge0_url.clone(),
                    auth_token: String::new(),
                };

                if let Ok(Some(row)) = self.db.get_code_config(tenant.id, provider_name) {
                    if let Ok(config_json) = self.decrypt_bytes(tenant, &row.encrypted_config) {
                        if let Ok(override_config) =
                            serde_json::from_slice::<Judge0Config>(&config_json)
                        {
                            if !override_config.url.is_empty() {
                                config.url = override_config.url;
                            }
                            config.auth_token = override_config.auth_token;
                        }
                    }
                }

                Ok(Box::new(Judge0Provider::new(config)))
            }
            other => Err(BuildError::Unsupported(other.to_string())),
        }
    }

    fn decrypt_bytes(&self, tenant: &Tenant, ciphertext: &[u8]) -> Result<Vec<u8>, BuildError> {
        let data_key = self
            .tenants
            .data_key(tenant)
            .map_err(|_| BuildError::Encryption)?;
        crypto::decrypt_with_data_key(&data_key, ciphertext).map_err(|_| BuildError::Encryption)
    }

    fn decrypt_string(&self, tenant: &Tenant, ciphertext: &[u8]) -> Result<String, BuildError> {
        let bytes = self.decrypt_bytes(tenant, ciphertext)?;
        String::from_utf8(bytes).map_err(|_| BuildError::Encryption)
    }
}
