//! Background task turning committed profile changes into low-gas emails.

use crate::alerts::evaluator::evaluate_email;
use crate::metrics::collector::Metrics;
use crate::notify::sink::EmailSink;
use crate::stores::profile_store::ProfileChange;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Consume the store's change feed until every sender is gone.
///
/// Delivery failures are logged and counted, never propagated back to the
/// write that triggered them.
pub fn spawn_alert_dispatcher(
    mut changes: UnboundedReceiver<ProfileChange>,
    mailer: Arc<dyn EmailSink>,
    default_threshold: f64,
    metrics: Arc<Metrics>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(change) = changes.recv().await {
            dispatch(&change, mailer.as_ref(), default_threshold, &metrics).await;
        }
        debug!("Change feed closed, alert dispatcher exiting");
    })
}

async fn dispatch(change: &ProfileChange, mailer: &dyn EmailSink, default_threshold: f64, metrics: &Metrics) {
    let Some(alert) = evaluate_email(Some(change.before.as_ref()), &change.after, default_threshold) else {
        return;
    };

    match mailer
        .send_low_gas_email(&alert.recipient, &alert.low_cylinders)
        .await
    {
        Ok(()) => {
            metrics.increment_emails_sent();
            info!(
                user_id = %change.user_id,
                version = change.version,
                low_cylinders = alert.low_cylinders.len(),
                "Low gas email sent"
            );
        }
        Err(e) => {
            metrics.increment_emails_failed();
            error!(
                user_id = %change.user_id,
                version = change.version,
                error = %e,
                "Failed to send low gas email"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::NotifyError;
    use crate::models::cylinder::Cylinder;
    use crate::models::profile::{Settings, UserProfile};
    use crate::ops::mutations::Mutation;
    use crate::stores::profile_store::CylinderStore;
    use crate::wal::wal::Wal;
    use async_trait::async_trait;
    use std::sync::atomic::Ordering;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<(String, Vec<String>)>>,
        fail: bool,
    }

    #[async_trait]
    impl EmailSink for RecordingMailer {
        async fn send_low_gas_email(&self, recipient: &str, low_cylinders: &[Cylinder]) -> Result<(), NotifyError> {
            if self.fail {
                return Err(NotifyError::Transport("connection refused".to_string()));
            }
            let ids = low_cylinders.iter().map(|c| c.id.clone()).collect();
            self.sent.lock().unwrap().push((recipient.to_string(), ids));
            Ok(())
        }
    }

    fn setup(fail: bool) -> (TempDir, Arc<CylinderStore>, Arc<RecordingMailer>, Arc<Metrics>, JoinHandle<()>) {
        let dir = TempDir::new().unwrap();
        let wal = Arc::new(Wal::new(dir.path().join("test.wal")).unwrap());
        let metrics = Arc::new(Metrics::new());
        let store = Arc::new(CylinderStore::new(wal, Arc::clone(&metrics)));
        let mailer = Arc::new(RecordingMailer {
            fail,
            ..Default::default()
        });

        let feed = store.take_change_feed().unwrap();
        let handle = spawn_alert_dispatcher(feed, mailer.clone(), 3.0, Arc::clone(&metrics));

        let settings = Settings {
            email_notifications: true,
            ..Settings::default()
        };
        store
            .create_profile("u1", UserProfile::new("Amina".to_string(), "amina@example.com".to_string(), settings))
            .unwrap();

        (dir, store, mailer, metrics, handle)
    }

    fn weigh(id: &str, weight: f64) -> Mutation {
        Mutation::UpdateWeight {
            cylinder_id: id.to_string(),
            weight,
        }
    }

    fn add(id: &str) -> Mutation {
        Mutation::AddCylinder {
            id: id.to_string(),
            size: 6.0,
        }
    }

    #[tokio::test]
    async fn test_email_sent_once_on_crossing() {
        let (_dir, store, mailer, metrics, handle) = setup(false);

        store.apply("u1", &add("a")).unwrap();
        store.apply("u1", &weigh("a", 2.0)).unwrap();
        store.apply("u1", &weigh("a", 1.5)).unwrap();

        drop(store);
        handle.await.unwrap();

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0], ("amina@example.com".to_string(), vec!["a".to_string()]));
        assert_eq!(metrics.emails_sent.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_second_cylinder_crossing_lists_all_low() {
        let (_dir, store, mailer, _metrics, handle) = setup(false);

        store.apply("u1", &add("a")).unwrap();
        store.apply("u1", &add("b")).unwrap();
        store.apply("u1", &weigh("a", 2.0)).unwrap();
        store.apply("u1", &weigh("b", 1.0)).unwrap();

        drop(store);
        handle.await.unwrap();

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].1, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn test_delivery_failure_is_counted_not_propagated() {
        let (_dir, store, mailer, metrics, handle) = setup(true);

        store.apply("u1", &add("a")).unwrap();
        assert!(store.apply("u1", &weigh("a", 1.0)).is_ok());

        drop(store);
        handle.await.unwrap();

        assert!(mailer.sent.lock().unwrap().is_empty());
        assert_eq!(metrics.emails_failed.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.emails_sent.load(Ordering::Relaxed), 0);
    }
}
