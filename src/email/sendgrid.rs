use crate::email::{EmailError, Message, Provider};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

const MAIL_SEND_URL: &str = "https://api.sendgrid.com/v3/mail/send";

/// Credentials for the SendGrid v3 Mail Send API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendGridConfig {
    pub api_key: String,
}

pub struct SendGridProvider {
    config: SendGridConfig,
    client: reqwest::Client,
}

impl SendGridProvider {
    pub fn new(config: SendGridConfig) -> Self {
        SendGridProvider {
            config,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Provider for SendGridProvider {
    async fn send(&self, message: &Message) -> Result<(), EmailError> {
        let to_list: Vec<_> = message.to.iter().map(|addr| json!({ "email": addr })).collect();
        let content_type = if message.html { "text/html" } else { "text/plain" };

        let payload = json!({
            "personalizations": [{ "to": to_list }],
            "from": { "email": message.from },
            "subject": message.subject,
            "content": [{ "type": content_type, "value": message.body }],
        });

        let resp = self
            .client
            .post(MAIL_SEND_URL)
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(EmailError::UpstreamStatus(resp.status().as_u16()));
        }
        Ok(())
    }
}
