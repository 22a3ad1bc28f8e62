use crate::stores::profile_store::CylinderStore;
use crate::utils::time::current_timestamp;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Service-wide counters, shared by the store, the dispatcher and the handlers
pub struct Metrics {
    pub writes_committed: AtomicU64,
    pub writes_rejected: AtomicU64,
    pub persistence_failures: AtomicU64,
    pub persistence_retries: AtomicU64,
    pub emails_sent: AtomicU64,
    pub emails_failed: AtomicU64,
    pub start_time: i64,
}

#[derive(Debug, Clone, Serialize, serde::Deserialize)]
pub struct MetricsSnapshot {
    pub writes_committed: u64,
    pub writes_rejected: u64,
    pub persistence_failures: u64,
    pub persistence_retries: u64,
    pub emails_sent: u64,
    pub emails_failed: u64,
    pub profiles: usize,
    pub cylinders: usize,
    pub active_subscriptions: usize,
    pub uptime_seconds: i64,
    pub writes_per_second: f64,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            writes_committed: AtomicU64::new(0),
            writes_rejected: AtomicU64::new(0),
            persistence_failures: AtomicU64::new(0),
            persistence_retries: AtomicU64::new(0),
            emails_sent: AtomicU64::new(0),
            emails_failed: AtomicU64::new(0),
            start_time: current_timestamp(),
        }
    }

    pub fn increment_committed(&self) {
        self.writes_committed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rejected(&self) {
        self.writes_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_persistence_failures(&self) {
        self.persistence_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_persistence_retries(&self) {
        self.persistence_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_emails_sent(&self) {
        self.emails_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_emails_failed(&self) {
        self.emails_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Combine the counters with the store's current size
    pub fn get_snapshot(&self, store: &CylinderStore) -> MetricsSnapshot {
        let writes_committed = self.writes_committed.load(Ordering::Relaxed);
        let uptime_seconds = current_timestamp() - self.start_time;

        let writes_per_second = if uptime_seconds > 0 {
            writes_committed as f64 / uptime_seconds as f64
        } else {
            0.0
        };

        MetricsSnapshot {
            writes_committed,
            writes_rejected: self.writes_rejected.load(Ordering::Relaxed),
            persistence_failures: self.persistence_failures.load(Ordering::Relaxed),
            persistence_retries: self.persistence_retries.load(Ordering::Relaxed),
            emails_sent: self.emails_sent.load(Ordering::Relaxed),
            emails_failed: self.emails_failed.load(Ordering::Relaxed),
            profiles: store.len(),
            cylinders: store.total_cylinders(),
            active_subscriptions: store.active_subscriptions(),
            uptime_seconds,
            writes_per_second,
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
