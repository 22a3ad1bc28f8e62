use crate::core::config::EmailConfig;
use crate::core::error::NotifyError;
use crate::models::cylinder::Cylinder;
use crate::notify::sink::{compose_low_gas_email, EmailSink};
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::info;

/// Hands low-gas emails to an HTTP mail relay
pub struct RelayMailer {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    from_address: String,
}

#[derive(Debug, Serialize)]
pub struct RelayMessage<'a> {
    pub from: &'a str,
    pub to: &'a str,
    pub subject: &'a str,
    pub text: &'a str,
    pub html: &'a str,
}

impl RelayMailer {
    pub fn new(config: &EmailConfig) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.relay_timeout_seconds))
            .build()
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.relay_endpoint.clone(),
            api_key: config.relay_api_key.clone(),
            from_address: config.from_address.clone(),
        })
    }
}

#[async_trait]
impl EmailSink for RelayMailer {
    async fn send_low_gas_email(&self, recipient: &str, low_cylinders: &[Cylinder]) -> Result<(), NotifyError> {
        if !recipient.contains('@') {
            return Err(NotifyError::InvalidAddress(recipient.to_string()));
        }

        let email = compose_low_gas_email(low_cylinders);
        let body = RelayMessage {
            from: &self.from_address,
            to: recipient,
            subject: &email.subject,
            text: &email.text,
            html: &email.html,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("api_key", &self.api_key)])
            .json(&body)
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(NotifyError::Rejected(response.status().as_u16()));
        }

        info!(to = %recipient, low_cylinders = low_cylinders.len(), "Low gas email handed to relay");
        Ok(())
    }
}
