//! Typed publish/subscribe registry
//!
//! Views subscribe to the topics they care about instead of hooking into a
//! global notification hub. Each subscriber gets an id it uses to
//! unsubscribe when it is torn down.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::cursor::CursorPosition;

/// Event categories a subscriber can listen to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    DocumentChanged,
    CursorMoved,
    SurfaceStackChanged,
}

/// Notifications published by the document model and the views
#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    /// Lines in `first..=last` changed; `line_count` is the new total
    DocumentChanged {
        first: usize,
        last: usize,
        line_count: usize,
    },
    CursorMoved {
        view: u64,
        position: CursorPosition,
    },
    /// Back/forward history of a view changed
    SurfaceStackChanged {
        view: u64,
        can_go_back: bool,
        can_go_forward: bool,
    },
}

impl ViewEvent {
    pub fn topic(&self) -> Topic {
        match self {
            ViewEvent::DocumentChanged { .. } => Topic::DocumentChanged,
            ViewEvent::CursorMoved { .. } => Topic::CursorMoved,
            ViewEvent::SurfaceStackChanged { .. } => Topic::SurfaceStackChanged,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

type Callback = Arc<dyn Fn(&ViewEvent) + Send + Sync>;

struct Subscription {
    id: SubscriptionId,
    topic: Topic,
    callback: Callback,
}

/// Shared event registry, cheap to clone
#[derive(Clone, Default)]
pub struct EventBus {
    subscriptions: Arc<Mutex<Vec<Subscription>>>,
    next_id: Arc<AtomicU64>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for events of `topic`
    pub fn subscribe<F>(&self, topic: Topic, callback: F) -> SubscriptionId
    where
        F: Fn(&ViewEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push(Subscription {
            id,
            topic,
            callback: Arc::new(callback),
        });
        log::trace!("subscription {:?} added for {:?}", id, topic);
        id
    }

    /// Remove a subscription. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscriptions = self.lock();
        let before = subscriptions.len();
        subscriptions.retain(|s| s.id != id);
        before != subscriptions.len()
    }

    /// Deliver `event` to every subscriber of its topic, in subscription
    /// order. Returns how many callbacks ran.
    pub fn publish(&self, event: &ViewEvent) -> usize {
        let topic = event.topic();

        // Callbacks run without the lock so they may subscribe or publish
        let callbacks: Vec<Callback> = self
            .lock()
            .iter()
            .filter(|s| s.topic == topic)
            .map(|s| s.callback.clone())
            .collect();

        for callback in &callbacks {
            callback(event);
        }
        callbacks.len()
    }

    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.lock().iter().filter(|s| s.topic == topic).count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Subscription>> {
        self.subscriptions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_publish_reaches_only_matching_topic() {
        let bus = EventBus::new();
        let documents = Arc::new(AtomicUsize::new(0));
        let cursors = Arc::new(AtomicUsize::new(0));

        let d = documents.clone();
        bus.subscribe(Topic::DocumentChanged, move |_| {
            d.fetch_add(1, Ordering::SeqCst);
        });
        let c = cursors.clone();
        bus.subscribe(Topic::CursorMoved, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        let delivered = bus.publish(&ViewEvent::DocumentChanged {
            first: 0,
            last: 10,
            line_count: 11,
        });

        assert_eq!(delivered, 1);
        assert_eq!(documents.load(Ordering::SeqCst), 1);
        assert_eq!(cursors.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unsubscribe() {
        let bus = EventBus::new();
        let id = bus.subscribe(Topic::SurfaceStackChanged, |_| {});

        assert_eq!(bus.subscriber_count(Topic::SurfaceStackChanged), 1);
        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        assert_eq!(
            bus.publish(&ViewEvent::SurfaceStackChanged {
                view: 1,
                can_go_back: false,
                can_go_forward: false,
            }),
            0
        );
    }

    #[test]
    fn test_callback_may_publish() {
        let bus = EventBus::new();
        let seen = Arc::new(AtomicUsize::new(0));

        let inner_bus = bus.clone();
        bus.subscribe(Topic::DocumentChanged, move |_| {
            inner_bus.publish(&ViewEvent::CursorMoved {
                view: 7,
                position: CursorPosition::default(),
            });
        });
        let s = seen.clone();
        bus.subscribe(Topic::CursorMoved, move |event| {
            assert_eq!(event.topic(), Topic::CursorMoved);
            s.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish(&ViewEvent::DocumentChanged {
            first: 0,
            last: 0,
            line_count: 1,
        });
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
