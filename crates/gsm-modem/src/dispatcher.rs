//! Notification dispatcher task.
//!
//! Turns each `+CMTI:` line into a fetched [`Message`](crate::Message) and
//! fans it out to the subscribers interested in SMS events. Nothing here has a
//! caller to report to, so failures are logged and the notification dropped.

use std::sync::Arc;

use futures::future::join_all;
use gsm_at_protocol::NewMessageIndication;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::registry::{AsyncEvent, Delivery, EventKind};
use crate::session::SessionInner;
use crate::telemetry;

/// Run until the notification queue closes.
pub(crate) async fn run(inner: Arc<SessionInner>, mut notifications: mpsc::Receiver<String>) {
    while let Some(line) = notifications.recv().await {
        metrics::counter!(telemetry::NOTIFICATIONS_RECEIVED.name).increment(1);
        dispatch(&inner, &line).await;
    }
    debug!("notification queue closed, dispatcher exiting");
}

async fn dispatch(inner: &SessionInner, line: &str) {
    let indication = match NewMessageIndication::parse(line) {
        Ok(indication) => indication,
        Err(e) => {
            warn!(error = %e, "ignoring malformed notification");
            return;
        }
    };

    // Pruning happens here even when nobody is listening.
    let candidates = inner.registry.snapshot(EventKind::Sms);
    if candidates.is_empty() {
        debug!(index = indication.index, "no subscribers for new message");
        return;
    }

    let message = match inner.read_message(indication.index).await {
        Ok(message) => message,
        Err(e) => {
            warn!(index = indication.index, error = %e, "failed to fetch new message");
            return;
        }
    };

    let event = AsyncEvent {
        kind: EventKind::Sms,
        message,
    };
    let outcomes = join_all(
        candidates
            .iter()
            .map(|candidate| candidate.deliver(event.clone())),
    )
    .await;

    let delivered = outcomes
        .iter()
        .filter(|outcome| **outcome == Delivery::Delivered)
        .count();
    let skipped = outcomes.len() - delivered;
    metrics::counter!(telemetry::EVENTS_DELIVERED.name).increment(delivered as u64);
    if skipped > 0 {
        metrics::counter!(telemetry::EVENTS_SKIPPED.name).increment(skipped as u64);
    }
    debug!(index = indication.index, delivered, skipped, "dispatched new message");
}
