use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::{Delivery, MailError, Mailer, OutboundEmail};

const AUTHORITY_URL: &str = "https://login.microsoftonline.com";
const GRAPH_URL: &str = "https://graph.microsoft.com/v1.0";
const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";
// refresh a little early so a token never expires mid-request
const TOKEN_EXPIRY_SLACK: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphConfig {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub from_address: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendMailRequest<'a> {
    message: GraphMessage<'a>,
    save_to_sent_items: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GraphMessage<'a> {
    subject: &'a str,
    body: GraphBody<'a>,
    to_recipients: Vec<GraphRecipient>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GraphBody<'a> {
    content_type: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GraphRecipient {
    email_address: GraphAddress,
}

#[derive(Debug, Serialize)]
struct GraphAddress {
    address: String,
}

/// Sends mail through Microsoft Graph using the app-only client-credentials flow.
pub struct GraphMailer {
    http: Client,
    config: GraphConfig,
    authority_url: String,
    graph_url: String,
    token: Mutex<Option<CachedToken>>,
}

impl GraphMailer {
    pub fn new(config: GraphConfig) -> Self {
        Self::with_endpoints(config, AUTHORITY_URL, GRAPH_URL)
    }

    pub fn with_endpoints(
        config: GraphConfig,
        authority_url: impl Into<String>,
        graph_url: impl Into<String>,
    ) -> Self {
        Self {
            http: Client::new(),
            config,
            authority_url: authority_url.into(),
            graph_url: graph_url.into(),
            token: Mutex::new(None),
        }
    }

    async fn access_token(&self) -> Result<String, MailError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() {
                return Ok(token.value.clone());
            }
        }

        let url = format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority_url, self.config.tenant_id
        );
        let res = self
            .http
            .post(url)
            .form(&[
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("scope", GRAPH_SCOPE),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(MailError::Auth {
                status: status.as_u16(),
                body,
            });
        }
        let token: TokenResponse = res.json().await?;
        debug!(expires_in = token.expires_in, "acquired graph access token");

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_EXPIRY_SLACK);
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });
        Ok(token.access_token)
    }
}

#[async_trait]
impl Mailer for GraphMailer {
    async fn send(&self, email: &OutboundEmail) -> Result<Delivery, MailError> {
        let recipients = email.recipients();
        if recipients.is_empty() {
            return Err(MailError::NoRecipients);
        }

        let token = self.access_token().await?;
        let request = SendMailRequest {
            message: GraphMessage {
                subject: &email.subject,
                body: GraphBody {
                    content_type: "HTML",
                    content: &email.html,
                },
                to_recipients: recipients
                    .iter()
                    .map(|address| GraphRecipient {
                        email_address: GraphAddress {
                            address: address.clone(),
                        },
                    })
                    .collect(),
            },
            save_to_sent_items: true,
        };

        let url = format!(
            "{}/users/{}/sendMail",
            self.graph_url, self.config.from_address
        );
        let res = self
            .http
            .post(url)
            .bearer_auth(token)
            .json(&request)
            .send()
            .await?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(MailError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        info!(
            recipients = %recipients.join(", "),
            subject = %email.subject,
            "email sent"
        );
        Ok(Delivery::Sent)
    }
}

#[cfg(test)]
#[path = "tests/graph_tests.rs"]
mod tests;
