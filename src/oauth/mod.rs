use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use oauth2::basic::BasicTokenResponse;
use oauth2::TokenResponse;
use thiserror::Error;

mod google;
mod slack;
pub mod state;

pub use google::GoogleProvider;
pub use slack::SlackProvider;

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("invalid provider endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("token exchange failed: {0}")]
    Exchange(String),

    #[error("token refresh failed: {0}")]
    Refresh(String),

    #[error("userinfo request failed: {0}")]
    UserInfo(String),
}

/// OAuth credentials for a user, as issued by the provider.
#[derive(Debug, Clone)]
pub struct Token {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// The provider-assigned identity behind an access token. `id` becomes the
/// tenant-scoped user id under which tokens are stored.
#[derive(Debug, Clone)]
pub struct UserInfo {
    pub id: String,
    pub email: String,
}

/// The interface each OAuth provider must implement. Providers are built per
/// request from a specific tenant's decrypted credentials.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Returns the URL to redirect the user to for authorization.
    fn auth_url(&self, state: &str) -> String;
    /// Converts an authorization code into a [`Token`].
    async fn exchange(&self, code: &str) -> Result<Token, OAuthError>;
    /// Obtains a new access token using the refresh token.
    async fn refresh(&self, refresh_token: &str) -> Result<Token, OAuthError>;
    /// Fetches the identity behind an access token.
    async fn user_info(&self, access_token: &str) -> Result<UserInfo, OAuthError>;
}

pub(crate) fn token_from_response(resp: &BasicTokenResponse) -> Token {
    Token {
        access_token: resp.access_token().secret().clone(),
        refresh_token: resp.refresh_token().map(|r| r.secret().clone()),
        expires_at: resp
            .expires_in()
            .map(|d| Utc::now() + Duration::seconds(d.as_secs() as i64)),
    }
}
