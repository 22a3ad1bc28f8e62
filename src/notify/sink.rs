use crate::core::error::NotifyError;
use crate::models::cylinder::Cylinder;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info};

pub const LOW_GAS_SUBJECT: &str = "Low Gas Level Alert";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A message for the user's open session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    pub message: String,
    pub level: NoticeLevel,
}

/// In-session delivery target
pub trait NotificationSink: Send + Sync {
    fn notify(&self, message: &str, level: NoticeLevel);
}

/// Server-triggered low-gas email channel
#[async_trait]
pub trait EmailSink: Send + Sync {
    async fn send_low_gas_email(&self, recipient: &str, low_cylinders: &[Cylinder]) -> Result<(), NotifyError>;
}

/// Forwards notices into a live session's outbound channel
pub struct ChannelNotifier {
    tx: UnboundedSender<Notice>,
}

impl ChannelNotifier {
    pub fn new(tx: UnboundedSender<Notice>) -> Self {
        Self { tx }
    }
}

impl NotificationSink for ChannelNotifier {
    fn notify(&self, message: &str, level: NoticeLevel) {
        let notice = Notice {
            message: message.to_string(),
            level,
        };
        if self.tx.send(notice).is_err() {
            debug!("Session closed, dropping notice");
        }
    }
}

/// Rendered low-gas email, shared by every mail transport
#[derive(Debug, Clone, PartialEq)]
pub struct LowGasEmail {
    pub subject: String,
    pub text: String,
    pub html: String,
}

pub fn compose_low_gas_email(low_cylinders: &[Cylinder]) -> LowGasEmail {
    let lines: Vec<String> = low_cylinders
        .iter()
        .map(|c| format!("{}KG cylinder - Current weight: {}KG", c.size, c.current_weight))
        .collect();

    let mut text = String::from("The following gas cylinders are running low:\n\n");
    for line in &lines {
        text.push_str("- ");
        text.push_str(line);
        text.push('\n');
    }

    let items: String = lines.iter().map(|line| format!("<li>{}</li>", line)).collect();
    let html = format!(
        "<h2>{}</h2><p>The following gas cylinders are running low:</p><ul>{}</ul>",
        LOW_GAS_SUBJECT, items
    );

    LowGasEmail {
        subject: LOW_GAS_SUBJECT.to_string(),
        text,
        html,
    }
}

/// Mailer used when no transport is configured; writes the alert to the log
pub struct LogMailer;

#[async_trait]
impl EmailSink for LogMailer {
    async fn send_low_gas_email(&self, recipient: &str, low_cylinders: &[Cylinder]) -> Result<(), NotifyError> {
        let email = compose_low_gas_email(low_cylinders);
        info!(
            to = %recipient,
            subject = %email.subject,
            low_cylinders = low_cylinders.len(),
            body = %email.text,
            "Low gas email (log transport)"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tokio::sync::mpsc::unbounded_channel;

    fn low(size: f64, weight: f64) -> Cylinder {
        Cylinder {
            id: format!("{}-{}", size, weight),
            size,
            current_weight: weight,
            last_updated: Utc::now(),
        }
    }

    #[test]
    fn test_compose_lists_every_cylinder_once() {
        let email = compose_low_gas_email(&[low(6.0, 2.0), low(13.0, 0.5)]);

        assert_eq!(email.subject, "Low Gas Level Alert");
        assert!(email.text.contains("6KG cylinder - Current weight: 2KG"));
        assert!(email.text.contains("13KG cylinder - Current weight: 0.5KG"));
        assert_eq!(email.html.matches("<li>").count(), 2);
    }

    #[test]
    fn test_channel_notifier_forwards() {
        let (tx, mut rx) = unbounded_channel();
        let notifier = ChannelNotifier::new(tx);

        notifier.notify("Gas weight updated successfully", NoticeLevel::Success);

        let notice = rx.try_recv().unwrap();
        assert_eq!(notice.message, "Gas weight updated successfully");
        assert_eq!(notice.level, NoticeLevel::Success);
    }

    #[test]
    fn test_channel_notifier_tolerates_closed_session() {
        let (tx, rx) = unbounded_channel();
        drop(rx);
        let notifier = ChannelNotifier::new(tx);

        notifier.notify("ignored", NoticeLevel::Info);
    }

    #[tokio::test]
    async fn test_log_mailer_always_succeeds() {
        let result = LogMailer.send_low_gas_email("a@example.com", &[low(3.0, 1.0)]).await;
        assert!(result.is_ok());
    }
}
