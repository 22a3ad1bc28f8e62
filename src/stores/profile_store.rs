//! Canonical per-user profile store.
//!
//! Each profile lives in one `DashMap` entry. A write holds that entry
//! exclusively from read through WAL append, in-memory replace and subscriber
//! fan-out, so writes to the same profile are serialized and every subscriber
//! sees snapshots in commit order.

use crate::core::error::StoreError;
use crate::metrics::collector::Metrics;
use crate::models::profile::UserProfile;
use crate::ops::mutations::Mutation;
use crate::utils::time::now;
use crate::wal::wal::{Wal, WalOperation};
use anyhow::Result;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::{self, unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info, warn};

/// Snapshots a subscriber may fall behind by before it is disconnected
pub const SUBSCRIBER_BUFFER: usize = 64;

/// Result of a committed write
#[derive(Debug, Clone)]
pub struct Commit {
    pub profile: Arc<UserProfile>,
    pub version: u64,
}

/// Before/after pair emitted for every committed update of an existing profile
#[derive(Debug, Clone)]
pub struct ProfileChange {
    pub user_id: String,
    pub version: u64,
    pub before: Arc<UserProfile>,
    pub after: Arc<UserProfile>,
}

struct ProfileSlot {
    profile: Arc<UserProfile>,
    version: u64,
    subscribers: Vec<(u64, mpsc::Sender<Arc<UserProfile>>)>,
}

impl ProfileSlot {
    fn new(profile: Arc<UserProfile>, version: u64) -> Self {
        Self {
            profile,
            version,
            subscribers: Vec::new(),
        }
    }

    /// Push `snapshot` to every live subscriber. Closed subscribers and
    /// ones whose buffer is full are dropped; a dropped subscriber's feed
    /// ends after the snapshots it already holds.
    fn publish(&mut self, user_id: &str, snapshot: &Arc<UserProfile>) {
        self.subscribers
            .retain(|(id, tx)| match tx.try_send(Arc::clone(snapshot)) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    warn!(
                        user_id = %user_id,
                        subscription_id = id,
                        buffer = SUBSCRIBER_BUFFER,
                        "Subscriber not keeping up, disconnecting"
                    );
                    false
                }
                Err(TrySendError::Closed(_)) => false,
            });
    }
}

pub struct CylinderStore {
    profiles: DashMap<String, ProfileSlot>,
    wal: Arc<Wal>,
    metrics: Arc<Metrics>,
    changes_tx: UnboundedSender<ProfileChange>,
    changes_rx: Mutex<Option<UnboundedReceiver<ProfileChange>>>,
    next_subscription: AtomicU64,
}

impl CylinderStore {
    pub fn new(wal: Arc<Wal>, metrics: Arc<Metrics>) -> Self {
        let (changes_tx, changes_rx) = unbounded_channel();

        Self {
            profiles: DashMap::new(),
            wal,
            metrics,
            changes_tx,
            changes_rx: Mutex::new(Some(changes_rx)),
            next_subscription: AtomicU64::new(1),
        }
    }

    /// Hand out the change feed; only the first caller gets it
    pub fn take_change_feed(&self) -> Option<UnboundedReceiver<ProfileChange>> {
        self.changes_rx.lock().ok().and_then(|mut rx| rx.take())
    }

    pub fn create_profile(&self, user_id: &str, profile: UserProfile) -> Result<Commit, StoreError> {
        if user_id.is_empty() {
            return Err(crate::core::error::ValidationError::MissingField("user_id".to_string()).into());
        }
        profile.validate()?;

        match self.profiles.entry(user_id.to_string()) {
            Entry::Occupied(_) => Err(StoreError::AlreadyExists(user_id.to_string())),
            Entry::Vacant(vacant) => {
                let version = 1;
                self.persist(&WalOperation::PutProfile {
                    user_id: user_id.to_string(),
                    version,
                    profile: profile.clone(),
                })?;

                let profile = Arc::new(profile);
                vacant.insert(ProfileSlot::new(Arc::clone(&profile), version));
                self.metrics.increment_committed();

                info!(user_id = %user_id, "Profile created");
                Ok(Commit { profile, version })
            }
        }
    }

    pub fn get(&self, user_id: &str) -> Result<Arc<UserProfile>, StoreError> {
        self.get_with_version(user_id).map(|commit| commit.profile)
    }

    pub fn get_with_version(&self, user_id: &str) -> Result<Commit, StoreError> {
        self.profiles
            .get(user_id)
            .map(|slot| Commit {
                profile: Arc::clone(&slot.profile),
                version: slot.version,
            })
            .ok_or_else(|| StoreError::ProfileNotFound(user_id.to_string()))
    }

    pub fn version(&self, user_id: &str) -> Result<u64, StoreError> {
        self.profiles
            .get(user_id)
            .map(|slot| slot.version)
            .ok_or_else(|| StoreError::ProfileNotFound(user_id.to_string()))
    }

    /// Read-modify-write under the profile's entry lock
    pub fn write<F>(&self, user_id: &str, mutation: F) -> Result<Commit, StoreError>
    where
        F: FnOnce(&UserProfile) -> Result<UserProfile, StoreError>,
    {
        self.write_inner(user_id, None, mutation)
    }

    /// Like [`write`](Self::write) but fails with `Conflict` if the profile
    /// is no longer at `expected_version`
    pub fn write_if_version<F>(&self, user_id: &str, expected_version: u64, mutation: F) -> Result<Commit, StoreError>
    where
        F: FnOnce(&UserProfile) -> Result<UserProfile, StoreError>,
    {
        self.write_inner(user_id, Some(expected_version), mutation)
    }

    pub fn apply(&self, user_id: &str, mutation: &Mutation) -> Result<Commit, StoreError> {
        let result = self.write(user_id, |profile| {
            mutation.apply(profile, now()).map_err(StoreError::from)
        });
        log_outcome(user_id, mutation, &result);
        result
    }

    /// Apply `mutation` only if the profile is still at `expected_version`
    pub fn apply_if_version(&self, user_id: &str, expected_version: u64, mutation: &Mutation) -> Result<Commit, StoreError> {
        let result = self.write_if_version(user_id, expected_version, |profile| {
            mutation.apply(profile, now()).map_err(StoreError::from)
        });
        log_outcome(user_id, mutation, &result);
        result
    }

    fn write_inner<F>(&self, user_id: &str, expected_version: Option<u64>, mutation: F) -> Result<Commit, StoreError>
    where
        F: FnOnce(&UserProfile) -> Result<UserProfile, StoreError>,
    {
        let mut slot = self
            .profiles
            .get_mut(user_id)
            .ok_or_else(|| StoreError::ProfileNotFound(user_id.to_string()))?;

        if let Some(expected) = expected_version {
            if slot.version != expected {
                self.metrics.increment_rejected();
                return Err(StoreError::Conflict {
                    expected,
                    actual: slot.version,
                });
            }
        }

        let next = match mutation(slot.profile.as_ref()).and_then(|next| {
            next.validate()?;
            Ok(next)
        }) {
            Ok(next) => next,
            Err(e) => {
                self.metrics.increment_rejected();
                return Err(e);
            }
        };

        let version = slot.version + 1;
        self.persist(&WalOperation::PutProfile {
            user_id: user_id.to_string(),
            version,
            profile: next.clone(),
        })?;

        let after = Arc::new(next);
        let before = std::mem::replace(&mut slot.profile, Arc::clone(&after));
        slot.version = version;
        slot.publish(user_id, &after);
        self.metrics.increment_committed();

        let change = ProfileChange {
            user_id: user_id.to_string(),
            version,
            before,
            after: Arc::clone(&after),
        };
        if self.changes_tx.send(change).is_err() {
            debug!(user_id = %user_id, "No change feed consumer");
        }

        Ok(Commit {
            profile: after,
            version,
        })
    }

    /// Append to the WAL, retrying once before giving up
    fn persist(&self, op: &WalOperation) -> Result<(), StoreError> {
        if let Err(first) = self.wal.log_operation(op) {
            warn!(error = %first, "WAL append failed, retrying once");
            self.metrics.increment_persistence_retries();

            if let Err(second) = self.wal.log_operation(op) {
                error!(error = %second, "WAL append failed after retry");
                self.metrics.increment_persistence_failures();
                return Err(StoreError::Persistence(second.to_string()));
            }
        }
        Ok(())
    }

    /// Open a live feed of snapshots for `user_id`, starting with the current one
    pub fn subscribe(self: &Arc<Self>, user_id: &str) -> Result<Subscription, StoreError> {
        let mut slot = self
            .profiles
            .get_mut(user_id)
            .ok_or_else(|| StoreError::ProfileNotFound(user_id.to_string()))?;

        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        // Fresh channel with a live receiver, the initial send cannot fail
        let _ = tx.try_send(Arc::clone(&slot.profile));

        let id = self.next_subscription.fetch_add(1, Ordering::Relaxed);
        slot.subscribers.push((id, tx));

        debug!(user_id = %user_id, subscription_id = id, "Subscription opened");

        Ok(Subscription {
            user_id: user_id.to_string(),
            id,
            rx,
            store: Arc::downgrade(self),
            active: true,
        })
    }

    fn unsubscribe(&self, user_id: &str, subscription_id: u64) {
        if let Some(mut slot) = self.profiles.get_mut(user_id) {
            slot.subscribers.retain(|(id, _)| *id != subscription_id);
        }
        debug!(user_id = %user_id, subscription_id, "Subscription closed");
    }

    /// Load a profile recovered from the WAL, bypassing persistence
    pub fn restore(&self, user_id: &str, version: u64, profile: UserProfile) {
        let profile = Arc::new(profile);
        match self.profiles.entry(user_id.to_string()) {
            Entry::Occupied(mut occupied) => {
                let slot = occupied.get_mut();
                slot.profile = profile;
                slot.version = version;
            }
            Entry::Vacant(vacant) => {
                vacant.insert(ProfileSlot::new(profile, version));
            }
        }
    }

    /// Rewrite the WAL with exactly one record per profile
    pub fn compact(&self) -> Result<usize> {
        let operations: Vec<WalOperation> = self
            .profiles
            .iter()
            .map(|entry| WalOperation::PutProfile {
                user_id: entry.key().clone(),
                version: entry.value().version,
                profile: (*entry.value().profile).clone(),
            })
            .collect();

        self.wal.compact(&operations)?;
        Ok(operations.len())
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn total_cylinders(&self) -> usize {
        self.profiles
            .iter()
            .map(|entry| entry.value().profile.gas_cylinders.len())
            .sum()
    }

    pub fn active_subscriptions(&self) -> usize {
        self.profiles
            .iter()
            .map(|entry| entry.value().subscribers.len())
            .sum()
    }
}

fn log_outcome(user_id: &str, mutation: &Mutation, result: &Result<Commit, StoreError>) {
    match result {
        Ok(commit) => debug!(
            user_id = %user_id,
            mutation = mutation.kind(),
            version = commit.version,
            "Mutation committed"
        ),
        Err(e) => debug!(
            user_id = %user_id,
            mutation = mutation.kind(),
            error = %e,
            "Mutation not applied"
        ),
    }
}

/// Live feed of one profile's snapshots
///
/// Dropping the subscription deregisters it from the store.
pub struct Subscription {
    user_id: String,
    id: u64,
    rx: mpsc::Receiver<Arc<UserProfile>>,
    store: Weak<CylinderStore>,
    active: bool,
}

impl Subscription {
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Wait for the next snapshot; `None` once cancelled
    pub async fn next(&mut self) -> Option<Arc<UserProfile>> {
        if !self.active {
            return None;
        }
        self.rx.recv().await
    }

    pub fn try_next(&mut self) -> Option<Arc<UserProfile>> {
        if !self.active {
            return None;
        }
        self.rx.try_recv().ok()
    }

    /// Stop delivery; safe to call more than once
    pub fn cancel(&mut self) {
        if !self.active {
            return;
        }
        self.active = false;
        self.rx.close();
        if let Some(store) = self.store.upgrade() {
            store.unsubscribe(&self.user_id, self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}
