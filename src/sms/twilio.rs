use crate::sms::{Provider, SmsError, SmsResult};
use async_trait::async_trait;
use serde::Deserialize;

/// Sends SMS messages via the Twilio REST API using a tenant's account SID
/// and auth token.
pub struct TwilioProvider {
    account_sid: String,
    auth_token: String,
    client: reqwest::Client,
}

impl TwilioProvider {
    pub fn new(account_sid: String, auth_token: String) -> Self {
        TwilioProvider {
            account_sid,
            auth_token,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Provider for TwilioProvider {
    async fn send(&self, from: &str, to: &str, body: &str) -> Result<SmsResult, SmsError> {
        #[derive(Deserialize)]
        struct TwilioResponse {
            #[serde(default)]
            sid: String,
            #[serde(default)]
            status: String,
            // Present on error responses.
            #[serde(default)]
            message: String,
            #[serde(default)]
            code: i64,
        }

        let endpoint = format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}/Messages.json",
            self.account_sid
        );

        let resp = self
            .client
            .post(&endpoint)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[("From", from), ("To", to), ("Body", body)])
            .send()
            .await?;

        let http_status = resp.status();
        let result: TwilioResponse = resp.json().await?;

        if !http_status.is_success() {
            return Err(SmsError::Api {
                status: http_status.as_u16(),
                code: result.code,
                message: result.message,
            });
        }

        Ok(SmsResult {
            sid: result.sid,
            status: result.status,
        })
    }
}
