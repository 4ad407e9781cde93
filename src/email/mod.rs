use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod sendgrid;
mod smtp;
pub mod template;

pub use sendgrid::{SendGridConfig, SendGridProvider};
pub use smtp::{SmtpConfig, SmtpProvider};

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("smtp transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    #[error("invalid email address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("failed to build message: {0}")]
    Build(String),

    #[error("email request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("email provider returned status {0}")]
    UpstreamStatus(u16),
}

/// The fields needed to send an email. When `html` is set the body is sent
/// as text/html.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub to: Vec<String>,
    pub from: String,
    pub subject: String,
    pub body: String,
    #[serde(default)]
    pub html: bool,
}

/// The serialized form of an `email.send` job stored in the jobs table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobPayload {
    pub provider: String,
    pub message: Message,
}

/// The interface each email provider must implement.
#[async_trait]
pub trait Provider: Send + Sync {
    async fn send(&self, message: &Message) -> Result<(), EmailError>;
}
