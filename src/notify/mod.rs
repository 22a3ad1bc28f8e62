pub mod relay;
pub mod sink;
pub mod smtp;

use crate::core::config::EmailConfig;
use crate::core::error::NotifyError;
use sink::{EmailSink, LogMailer};
use std::sync::Arc;

/// Build the mail transport named by `config.transport`
pub fn build_mailer(config: &EmailConfig) -> Result<Arc<dyn EmailSink>, NotifyError> {
    match config.transport.as_str() {
        "smtp" => Ok(Arc::new(smtp::SmtpMailer::new(config)?)),
        "relay" => Ok(Arc::new(relay::RelayMailer::new(config)?)),
        _ => Ok(Arc::new(LogMailer)),
    }
}
