use crate::oauth::{token_from_response, OAuthError, Provider, Token, UserInfo};
use async_trait::async_trait;
use oauth2::{
    basic::BasicClient, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken,
    RedirectUrl, RefreshToken, Scope, TokenUrl,
};
use serde::Deserialize;

// Sign in with Slack (OpenID Connect) endpoints.
const AUTH_URL: &str = "https://slack.com/openid/connect/authorize";
const TOKEN_URL: &str = "https://slack.com/api/openid.connect.token";
const USER_INFO_URL: &str = "https://slack.com/api/openid.connect.userInfo";

pub struct SlackProvider {
    client: BasicClient,
    http: reqwest::Client,
}

impl SlackProvider {
    pub fn new(
        client_id: String,
        client_secret: String,
        redirect_url: String,
    ) -> Result<Self, OAuthError> {
        let auth_url = AuthUrl::new(AUTH_URL.to_string())
            .map_err(|e| OAuthError::InvalidEndpoint(e.to_string()))?;
        let token_url = TokenUrl::new(TOKEN_URL.to_string())
            .map_err(|e| OAuthError::InvalidEndpoint(e.to_string()))?;
        let redirect_url = RedirectUrl::new(redirect_url)
            .map_err(|e| OAuthError::InvalidEndpoint(e.to_string()))?;

        let client = BasicClient::new(
            ClientId::new(client_id),
            Some(ClientSecret::new(client_secret)),
            auth_url,
            Some(token_url),
        )
        .set_redirect_uri(redirect_url);

        Ok(SlackProvider {
            client,
            http: reqwest::Client::new(),
        })
    }
}

#[async_trait]
impl Provider for SlackProvider {
    fn auth_url(&self, state: &str) -> String {
        let (url, _) = self
            .client
            .authorize_url(|| CsrfToken::new(state.to_string()))
            .add_scope(Scope::new("openid".to_string()))
            .add_scope(Scope::new("email".to_string()))
            .add_scope(Scope::new("profile".to_string()))
            .url();
        url.to_string()
    }

    async fn exchange(&self, code: &str) -> Result<Token, OAuthError> {
        let resp = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(oauth2::reqwest::async_http_client)
            .await
            .map_err(|e| OAuthError::Exchange(e.to_string()))?;
        Ok(token_from_response(&resp))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Token, OAuthError> {
        let resp = self
            .client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(oauth2::reqwest::async_http_client)
            .await
            .map_err(|e| OAuthError::Refresh(e.to_string()))?;
        Ok(token_from_response(&resp))
    }

    async fn user_info(&self, access_token: &str) -> Result<UserInfo, OAuthError> {
        #[derive(Deserialize)]
        struct SlackUser {
            #[serde(default)]
            ok: bool,
            #[serde(default)]
            sub: String,
            #[serde(default)]
            email: String,
        }

        let resp = self
            .http
            .get(USER_INFO_URL)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| OAuthError::UserInfo(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(OAuthError::UserInfo(format!(
                "slack userinfo returned {}",
                resp.status().as_u16()
            )));
        }

        let body: SlackUser = resp
            .json()
            .await
            .map_err(|e| OAuthError::UserInfo(e.to_string()))?;
        if !body.ok || body.sub.is_empty() {
            return Err(OAuthError::UserInfo("empty user ID".to_string()));
        }

        Ok(UserInfo {
            id: body.sub,
            email: body.email,
        })
    }
}
