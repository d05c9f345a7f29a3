use crate::error::{RentalError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Writes messages to the log instead of delivering them
#[derive(Debug, Default)]
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        info!(
            to = %message.to,
            subject = %message.subject,
            "Email (not delivered):\n{}",
            message.body
        );
        Ok(())
    }
}

/// Posts each message as JSON (`to`, `subject`, `body`) to a mail relay
pub struct WebhookEmailSender {
    http_client: reqwest::Client,
    url: String,
}

impl WebhookEmailSender {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RentalError::Configuration {
                message: format!("failed to build webhook client: {}", e),
            })?;

        Ok(Self {
            http_client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl EmailSender for WebhookEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        let response = self
            .http_client
            .post(&self.url)
            .json(message)
            .send()
            .await
            .map_err(|e| RentalError::Notification {
                message: format!("webhook request failed: {}", e),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RentalError::Notification {
                message: format!("webhook returned {}: {}", status, body),
            });
        }
        Ok(())
    }
}

/// Keeps sent messages for inspection
#[derive(Debug, Default)]
pub struct RecordingEmailSender {
    sent: Mutex<Vec<EmailMessage>>,
}

impl RecordingEmailSender {
    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().clone()
    }
}

#[async_trait]
impl EmailSender for RecordingEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        self.sent.lock().push(message.clone());
        Ok(())
    }
}
