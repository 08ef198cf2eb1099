//! Outbound email.
//!
//! Production sends through an HTTP relay (`EMAIL_API_URL`); without credentials the message is
//! only written to the log so password resets stay usable in development.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::config::EmailConfig;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: EmailMessage) -> anyhow::Result<()>;

    /// Whether messages actually leave the process.
    fn is_delivering(&self) -> bool {
        true
    }
}

pub fn password_reset_email(frontend_url: &str, to: &str, token: &str) -> EmailMessage {
    let reset_url = format!(
        "{}/reset-password?token={}",
        frontend_url.trim_end_matches('/'),
        token
    );
    EmailMessage {
        to: to.to_string(),
        subject: "Password Reset Request".to_string(),
        text: format!(
            "You requested to reset your password. Open the link below to choose a new one:\n\
             {reset_url}\n\nThis link will expire in 1 hour.\n\n\
             If you didn't request this, please ignore this email."
        ),
        html: format!(
            "<p>You requested to reset your password.</p>\
             <p><a href=\"{reset_url}\">Reset Password</a></p>\
             <p>This link will expire in 1 hour.</p>\
             <p>If you didn't request this, please ignore this email.</p>"
        ),
    }
}

/// Log sink for environments without email credentials.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: EmailMessage) -> anyhow::Result<()> {
        tracing::info!(to = %message.to, subject = %message.subject, body = %message.text, "email not configured, logging message");
        Ok(())
    }

    fn is_delivering(&self) -> bool {
        false
    }
}

pub struct HttpMailer {
    client: Client,
    config: EmailConfig,
}

#[derive(Serialize)]
struct RelayPayload<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
    html: &'a str,
}

impl HttpMailer {
    pub fn new(config: EmailConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self { client, config }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, message: EmailMessage) -> anyhow::Result<()> {
        let payload = RelayPayload {
            from: &self.config.from,
            to: &message.to,
            subject: &message.subject,
            text: &message.text,
            html: &message.html,
        };
        self.client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;
        tracing::debug!(to = %message.to, "email dispatched");
        Ok(())
    }
}
