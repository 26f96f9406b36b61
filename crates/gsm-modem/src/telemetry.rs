//! Metric declarations for the session.
//!
//! Recording goes through the `metrics` facade; nothing is exported unless the
//! application installs a recorder.

use metrics::{describe_counter, Unit};

/// A counter declaration with its metadata.
#[derive(Debug, Clone, Copy)]
pub struct Metric {
    /// The metric name.
    pub name: &'static str,
    /// Human-readable description.
    pub description: &'static str,
}

impl Metric {
    const fn counter(name: &'static str, description: &'static str) -> Self {
        Metric { name, description }
    }

    /// Register this metric's description with the metrics recorder.
    pub fn describe(&self) {
        describe_counter!(self.name, Unit::Count, self.description);
    }
}

/// Response lines discarded by the overflow policy or as stale.
pub const LINES_DROPPED: Metric =
    Metric::counter("gsm.lines.dropped", "Response lines discarded without a waiting command");

/// Commands issued, labelled by `outcome`.
pub const COMMANDS_ISSUED: Metric =
    Metric::counter("gsm.commands.issued", "Commands written to the modem");

/// Unsolicited notification lines handed to the dispatcher.
pub const NOTIFICATIONS_RECEIVED: Metric =
    Metric::counter("gsm.notifications.received", "Notification lines received");

/// Events delivered to subscribers.
pub const EVENTS_DELIVERED: Metric =
    Metric::counter("gsm.events.delivered", "Events delivered to subscribers");

/// Events lost to cancellation or a dropped receiver.
pub const EVENTS_SKIPPED: Metric =
    Metric::counter("gsm.events.skipped", "Events not delivered because the subscriber went away");

/// All metrics declared by this crate.
pub const ALL: &[Metric] = &[
    LINES_DROPPED,
    COMMANDS_ISSUED,
    NOTIFICATIONS_RECEIVED,
    EVENTS_DELIVERED,
    EVENTS_SKIPPED,
];

/// Register descriptions for every metric. Call once after installing a recorder.
pub fn describe_metrics() {
    for metric in ALL {
        metric.describe();
    }
}
