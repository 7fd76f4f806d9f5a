//! services/api/src/adapters/email.rs
//!
//! Outbound email. `LogEmailAdapter` only records the message in the log and is
//! the default when no relay is configured; `HttpEmailAdapter` hands each
//! message to an HTTP mail relay as JSON.

use async_trait::async_trait;
use client_portal_core::ports::{EmailMessage, EmailService, PortError, PortResult};
use serde::Serialize;
use std::time::Duration;
use tracing::{error, info};

/// Logs recipients and subjects. Bodies carry OTPs and reset links, so they are not logged.
#[derive(Clone, Default)]
pub struct LogEmailAdapter;

#[async_trait]
impl EmailService for LogEmailAdapter {
    async fn send(&self, message: EmailMessage) -> PortResult<()> {
        info!(to = %message.to, subject = %message.subject, "Email dispatched (log only)");
        Ok(())
    }
}

#[derive(Serialize)]
struct RelayPayload<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    html: Option<&'a str>,
}

#[derive(Clone)]
pub struct HttpEmailAdapter {
    client: reqwest::Client,
    endpoint: String,
    from: String,
}

impl HttpEmailAdapter {
    pub fn new(endpoint: String, from: String) -> PortResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| PortError::Unexpected(format!("mail client: {e}")))?;
        Ok(Self {
            client,
            endpoint,
            from,
        })
    }
}

#[async_trait]
impl EmailService for HttpEmailAdapter {
    async fn send(&self, message: EmailMessage) -> PortResult<()> {
        let payload = RelayPayload {
            from: &self.from,
            to: &message.to,
            subject: &message.subject,
            text: &message.text,
            html: message.html.as_deref(),
        };
        let response = self
            .client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                error!("Mail relay unreachable: {}", e);
                PortError::Unexpected(format!("mail relay: {e}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            error!("Mail relay rejected message to {}: {}", message.to, status);
            return Err(PortError::Unexpected(format!("mail relay returned {status}")));
        }
        info!(to = %message.to, subject = %message.subject, "Email sent via relay");
        Ok(())
    }
}
