//! Delivery of password reset emails.

use crate::email_templates::PasswordResetEmailTemplate;
use async_trait::async_trait;
use lettre::message::{MultiPart, SinglePart, header};
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
    #[error("Invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("Message build error: {0}")]
    Build(#[from] lettre::error::Error),
    #[error("SMTP error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
    #[error("Mail delivery failed: {0}")]
    Other(String),
}

/// A reset email about to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetEmail {
    pub to: String,
    pub reset_url: String,
    pub expires_in: String,
}

#[async_trait]
pub trait ResetMailer: Send + Sync {
    async fn send_reset(&self, email: &ResetEmail) -> Result<(), MailError>;
}

/// SMTP delivery through lettre.
pub struct SmtpResetMailer {
    transport: Arc<AsyncSmtpTransport<Tokio1Executor>>,
    from: String,
}

impl SmtpResetMailer {
    pub fn new(transport: Arc<AsyncSmtpTransport<Tokio1Executor>>, from: String) -> Self {
        Self { transport, from }
    }
}

#[async_trait]
impl ResetMailer for SmtpResetMailer {
    #[tracing::instrument(skip(self, email))]
    async fn send_reset(&self, email: &ResetEmail) -> Result<(), MailError> {
        let template = PasswordResetEmailTemplate {
            login: email.to.clone(),
            reset_url: email.reset_url.clone(),
            expires_in: email.expires_in.clone(),
        };
        let html_body = template.render_html()?;
        let text_body = template.render_text();

        let message = lettre::Message::builder()
            .from(self.from.parse()?)
            .to(email.to.parse()?)
            .subject("Reset your password")
            .header(header::MIME_VERSION_1_0)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(header::ContentType::TEXT_PLAIN)
                            .body(text_body),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(header::ContentType::TEXT_HTML)
                            .body(html_body),
                    ),
            )?;

        self.transport.send(message).await?;
        Ok(())
    }
}

/// Mailer that keeps every email in memory instead of sending it.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<ResetEmail>>,
    fail: bool,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// A mailer whose deliveries always fail.
    pub fn failing() -> Self {
        Self {
            sent: Mutex::default(),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<ResetEmail> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// `hash` query parameter of the most recent reset link.
    pub fn last_reset_hash(&self) -> Option<String> {
        let last = self.sent().pop()?;
        let url = url::Url::parse(&last.reset_url).ok()?;
        url.query_pairs()
            .find(|(key, _)| key == "hash")
            .map(|(_, value)| value.into_owned())
    }
}

#[async_trait]
impl ResetMailer for RecordingMailer {
    async fn send_reset(&self, email: &ResetEmail) -> Result<(), MailError> {
        if self.fail {
            return Err(MailError::Other("recording mailer set to fail".to_string()));
        }
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(email.clone());
        Ok(())
    }
}
