//! Subscription registry.
//!
//! Subscribers register an event mask, a delivery channel and a cancellation
//! token. Canceled subscribers, and subscribers whose receiver is gone, are
//! removed the next time an event of any kind is dispatched.

use std::ops::BitOr;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::messages::Message;

/// Set of event kinds a subscriber is interested in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EventMask(u32);

impl EventMask {
    /// New SMS arrivals.
    pub const SMS: EventMask = EventMask(1 << 0);

    /// No events.
    pub const fn empty() -> Self {
        EventMask(0)
    }

    /// Raw bits.
    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// Check whether `other` is fully contained in this mask.
    pub const fn contains(&self, other: EventMask) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }
}

impl BitOr for EventMask {
    type Output = EventMask;

    fn bitor(self, rhs: EventMask) -> EventMask {
        EventMask(self.0 | rhs.0)
    }
}

/// Kind of an asynchronous event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A new SMS was stored.
    Sms,
}

impl EventKind {
    /// The mask bit for this kind.
    pub fn mask(&self) -> EventMask {
        match self {
            EventKind::Sms => EventMask::SMS,
        }
    }
}

/// An event delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsyncEvent {
    /// What happened.
    pub kind: EventKind,
    /// The message the event is about.
    pub message: Message,
}

struct Subscriber {
    mask: EventMask,
    sender: mpsc::Sender<AsyncEvent>,
    token: CancellationToken,
}

impl Subscriber {
    fn is_live(&self) -> bool {
        !self.token.is_cancelled() && !self.sender.is_closed()
    }
}

/// Registered subscribers.
#[derive(Default)]
pub struct SubscriptionRegistry {
    subscribers: Mutex<Vec<Subscriber>>,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber and hand back its event receiver.
    ///
    /// The channel holds a single event, so delivery waits on the receiver.
    pub fn register(&self, mask: EventMask, token: CancellationToken) -> mpsc::Receiver<AsyncEvent> {
        let (sender, receiver) = mpsc::channel(1);
        self.subscribers.lock().push(Subscriber {
            mask,
            sender,
            token,
        });
        receiver
    }

    /// Prune dead subscribers, then return the live ones matching `kind`.
    pub fn snapshot(&self, kind: EventKind) -> Vec<Candidate> {
        let mut subscribers = self.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(Subscriber::is_live);
        let pruned = before - subscribers.len();
        if pruned > 0 {
            tracing::debug!(pruned, "removed subscribers");
        }

        subscribers
            .iter()
            .filter(|s| s.mask.contains(kind.mask()))
            .map(|s| Candidate {
                sender: s.sender.clone(),
                token: s.token.clone(),
            })
            .collect()
    }

    /// Number of registered subscribers, including any not yet pruned.
    pub fn len(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Check if no subscribers are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Outcome of delivering to one subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// The receiver's channel took the event.
    Delivered,
    /// The token fired before the receiver took the event.
    Canceled,
    /// The receiver was dropped.
    Closed,
}

/// A subscriber picked for one event.
#[derive(Clone)]
pub struct Candidate {
    sender: mpsc::Sender<AsyncEvent>,
    token: CancellationToken,
}

impl Candidate {
    /// Hand `event` over, or give up when the subscriber cancels first.
    pub async fn deliver(&self, event: AsyncEvent) -> Delivery {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Delivery::Canceled,
            sent = self.sender.send(event) => match sent {
                Ok(()) => Delivery::Delivered,
                Err(_) => Delivery::Closed,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::MessageStatus;
    use gsm_pdu::Direction;

    fn event(index: u32) -> AsyncEvent {
        AsyncEvent {
            kind: EventKind::Sms,
            message: Message {
                index,
                status: MessageStatus::ReceivedUnread,
                direction: Direction::MobileTerminated,
                from: Some("+15550100".to_string()),
                to: None,
                timestamp: None,
                body: "hi".to_string(),
            },
        }
    }

    #[test]
    fn test_mask() {
        assert!(EventMask::SMS.contains(EventMask::SMS));
        assert!(!EventMask::empty().contains(EventMask::SMS));
        assert!((EventMask::empty() | EventMask::SMS).contains(EventKind::Sms.mask()));
        assert!(!EventMask::SMS.contains(EventMask::empty()));
    }

    #[test]
    fn test_snapshot_filters_by_mask() {
        let registry = SubscriptionRegistry::new();
        let _sms = registry.register(EventMask::SMS, CancellationToken::new());
        let _none = registry.register(EventMask::empty(), CancellationToken::new());

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.snapshot(EventKind::Sms).len(), 1);
    }

    #[test]
    fn test_snapshot_prunes_canceled_and_closed() {
        let registry = SubscriptionRegistry::new();
        let token = CancellationToken::new();
        let _canceled = registry.register(EventMask::SMS, token.clone());
        let dropped = registry.register(EventMask::SMS, CancellationToken::new());
        let _live = registry.register(EventMask::SMS, CancellationToken::new());

        token.cancel();
        drop(dropped);

        assert_eq!(registry.snapshot(EventKind::Sms).len(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_deliver_to_waiting_receiver() {
        let registry = SubscriptionRegistry::new();
        let mut rx = registry.register(EventMask::SMS, CancellationToken::new());
        let candidates = registry.snapshot(EventKind::Sms);

        assert_eq!(candidates[0].deliver(event(3)).await, Delivery::Delivered);
        assert_eq!(rx.recv().await.unwrap().message.index, 3);
    }

    #[tokio::test]
    async fn test_cancel_unblocks_pending_delivery() {
        let registry = SubscriptionRegistry::new();
        let token = CancellationToken::new();
        let _rx = registry.register(EventMask::SMS, token.clone());
        let candidate = registry.snapshot(EventKind::Sms).remove(0);

        // First event fills the slot, the second has to wait.
        assert_eq!(candidate.deliver(event(1)).await, Delivery::Delivered);
        let pending = tokio::spawn({
            let candidate = candidate.clone();
            async move { candidate.deliver(event(2)).await }
        });

        token.cancel();
        assert_eq!(pending.await.unwrap(), Delivery::Canceled);
    }

    #[tokio::test]
    async fn test_deliver_to_dropped_receiver() {
        let registry = SubscriptionRegistry::new();
        let rx = registry.register(EventMask::SMS, CancellationToken::new());
        let candidate = registry.snapshot(EventKind::Sms).remove(0);
        drop(rx);

        assert_eq!(candidate.deliver(event(1)).await, Delivery::Closed);
    }
}
