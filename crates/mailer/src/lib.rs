use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

mod graph;
pub mod templates;

pub use graph::{GraphConfig, GraphMailer};

#[derive(Debug, Error)]
pub enum MailError {
    #[error("no valid recipients")]
    NoRecipients,
    #[error("mail transport failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("token request rejected with status {status}: {body}")]
    Auth { status: u16, body: String },
    #[error("sendMail rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEmail {
    /// Comma-separated recipient list as typed by the operator.
    pub to: String,
    pub subject: String,
    pub html: String,
}

impl OutboundEmail {
    pub fn recipients(&self) -> Vec<String> {
        parse_recipients(&self.to)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// No mail transport is configured; the message was only logged.
    Skipped,
}

pub fn parse_recipients(to: &str) -> Vec<String> {
    to.split(',')
        .map(str::trim)
        .filter(|address| !address.is_empty())
        .map(str::to_string)
        .collect()
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &OutboundEmail) -> Result<Delivery, MailError>;
}

/// Used when no mail credentials are configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &OutboundEmail) -> Result<Delivery, MailError> {
        let recipients = email.recipients();
        if recipients.is_empty() {
            return Err(MailError::NoRecipients);
        }
        info!(
            recipients = %recipients.join(", "),
            subject = %email.subject,
            "mail transport not configured; skipping delivery"
        );
        Ok(Delivery::Skipped)
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
