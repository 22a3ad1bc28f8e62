//! Live profile feed over Server-Sent Events.
//!
//! Every committed snapshot is sent as a `snapshot` event, followed by one
//! `notice` event per low cylinder when the user has in-session alerts on.

use crate::alerts::evaluator::{evaluate_session, session_notices};
use crate::core::error::ApiError;
use crate::core::state::AppState;
use crate::models::profile::UserProfile;
use crate::notify::sink::{ChannelNotifier, Notice, NotificationSink};
use crate::stores::profile_store::Subscription;
use axum::{
    extract::{Path, State},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
};
use futures::stream::{self, StreamExt};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tracing::{info, warn};

struct SessionFeed {
    subscription: Subscription,
    notifier: ChannelNotifier,
    notices: UnboundedReceiver<Notice>,
}

impl SessionFeed {
    fn new(subscription: Subscription) -> Self {
        let (tx, notices) = unbounded_channel();
        Self {
            subscription,
            notifier: ChannelNotifier::new(tx),
            notices,
        }
    }

    /// Events for the next committed snapshot, `None` once the feed ends
    async fn next_batch(&mut self) -> Option<Vec<Event>> {
        let Some(snapshot) = self.subscription.next().await else {
            info!(user_id = %self.subscription.user_id(), "Live stream ended");
            return None;
        };

        let mut events = Vec::new();
        if let Some(event) = snapshot_event(&snapshot) {
            events.push(event);
        }

        for notice in session_notices(&evaluate_session(&snapshot)) {
            self.notifier.notify(&notice.message, notice.level);
        }
        while let Ok(notice) = self.notices.try_recv() {
            match Event::default().event("notice").json_data(&notice) {
                Ok(event) => events.push(event),
                Err(e) => warn!(error = %e, "Failed to encode notice event"),
            }
        }

        Some(events)
    }
}

fn snapshot_event(profile: &UserProfile) -> Option<Event> {
    match Event::default().event("snapshot").json_data(profile) {
        Ok(event) => Some(event),
        Err(e) => {
            warn!(error = %e, "Failed to encode snapshot event");
            None
        }
    }
}

/// GET /users/{user_id}/stream
///
/// The subscription is released when the client disconnects.
pub async fn stream_handler(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Response, ApiError> {
    let subscription = state.store.subscribe(&user_id)?;

    info!(
        user_id = %user_id,
        active_subscriptions = state.store.active_subscriptions(),
        "Live stream opened"
    );

    let events = stream::unfold(SessionFeed::new(subscription), |mut feed| async move {
        let batch = feed.next_batch().await?;
        Some((stream::iter(batch.into_iter().map(Ok::<_, Infallible>)), feed))
    })
    .flatten();

    let interval = Duration::from_secs(state.config.alerts.stream_keep_alive_seconds);
    Ok(Sse::new(events)
        .keep_alive(KeepAlive::new().interval(interval))
        .into_response())
}
