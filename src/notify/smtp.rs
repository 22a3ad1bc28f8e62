//! SMTP delivery for low-gas emails.

use crate::core::config::EmailConfig;
use crate::core::error::NotifyError;
use crate::models::cylinder::Cylinder;
use crate::notify::sink::{compose_low_gas_email, EmailSink};
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::info;

#[derive(Clone)]
pub struct SmtpMailer {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl SmtpMailer {
    pub fn new(config: &EmailConfig) -> Result<Self, NotifyError> {
        let credentials = Credentials::new(config.smtp_username.clone(), config.smtp_password.clone());

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| NotifyError::Transport(e.to_string()))?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
        })
    }

    fn build_message(&self, to: &str, low_cylinders: &[Cylinder]) -> Result<Message, NotifyError> {
        let email = compose_low_gas_email(low_cylinders);

        Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| NotifyError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| NotifyError::InvalidAddress(to.to_string()))?)
            .subject(email.subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(email.text),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(email.html),
                    ),
            )
            .map_err(|e| NotifyError::MessageBuild(e.to_string()))
    }
}

#[async_trait]
impl EmailSink for SmtpMailer {
    async fn send_low_gas_email(&self, recipient: &str, low_cylinders: &[Cylinder]) -> Result<(), NotifyError> {
        let message = self.build_message(recipient, low_cylinders)?;

        self.mailer
            .send(message)
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        info!(to = %recipient, low_cylinders = low_cylinders.len(), "Low gas email sent via SMTP");
        Ok(())
    }
}
