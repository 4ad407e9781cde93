use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod twilio;

pub use twilio::TwilioProvider;

#[derive(Debug, Error)]
pub enum SmsError {
    #[error("sms request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("sms API error {status} (code {code}): {message}")]
    Api {
        status: u16,
        code: i64,
        message: String,
    },
}

/// The provider's receipt for a sent SMS.
#[derive(Debug, Clone)]
pub struct SmsResult {
    pub sid: String,
    pub status: String,
}

/// The serialized form of an `sms.send` job stored in the jobs table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobPayload {
    pub provider: String,
    pub from: String,
    pub to: String,
    pub body: String,
}

/// The interface each SMS provider must implement.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Delivers an SMS from the given number to the recipient.
    async fn send(&self, from: &str, to: &str, body: &str) -> Result<SmsResult, SmsError>;
}
