use crate::email::{EmailError, Message, Provider};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message as LettreMessage, Tokio1Executor,
};
use serde::{Deserialize, Serialize};

fn default_port() -> u16 {
    587
}

/// Credentials for an SMTP server (STARTTLS on port 587 by default).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

pub struct SmtpProvider {
    config: SmtpConfig,
}

impl SmtpProvider {
    pub fn new(config: SmtpConfig) -> Self {
        SmtpProvider { config }
    }
}

#[async_trait]
impl Provider for SmtpProvider {
    async fn send(&self, message: &Message) -> Result<(), EmailError> {
        let mut builder = LettreMessage::builder()
            .from(message.from.parse::<Mailbox>()?)
            .subject(message.subject.clone());
        for to in &message.to {
            builder = builder.to(to.parse::<Mailbox>()?);
        }

        let content_type = if message.html {
            ContentType::TEXT_HTML
        } else {
            ContentType::TEXT_PLAIN
        };
        let email = builder
            .header(content_type)
            .body(message.body.clone())
            .map_err(|e| EmailError::Build(e.to_string()))?;

        let mut transport =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.host)?
                .port(self.config.port);
        if !self.config.username.is_empty() {
            transport = transport.credentials(Credentials::new(
                self.config.username.clone(),
                self.config.password.clone(),
            ));
        }

        let mailer: AsyncSmtpTransport<Tokio1Executor> = transport.build();
        mailer.send(email).await?;
        Ok(())
    }
}
