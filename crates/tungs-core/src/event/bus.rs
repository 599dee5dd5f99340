//! Synchronous event bus for distributing `SessionEvent` to subscribers.
//!
//! Every subscriber registered at publish time receives each event exactly
//! once, in registration order, before `publish` returns. Publishing with no
//! subscribers is a no-op.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tungs_types::event::SessionEvent;

type Callback = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

/// Handle returned by [`EventBus::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
struct Registry {
    next_id: u64,
    subscribers: Vec<(SubscriptionId, Callback)>,
}

/// Multi-subscriber event bus for session state transitions.
///
/// Cloning the bus shares the subscriber registry, so an event published
/// through any clone reaches every subscriber.
#[derive(Clone, Default)]
pub struct EventBus {
    registry: Arc<Mutex<Registry>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a callback that will receive all future events.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&SessionEvent) + Send + Sync + 'static,
    {
        let mut registry = self.registry();
        registry.next_id += 1;
        let id = SubscriptionId(registry.next_id);
        registry.subscribers.push((id, Arc::new(callback)));
        id
    }

    /// Bridge events into an unbounded channel for async consumers.
    ///
    /// Once the receiver is dropped, further events for it are discarded.
    pub fn subscribe_channel(&self) -> (SubscriptionId, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.subscribe(move |event| {
            let _ = tx.send(event.clone());
        });
        (id, rx)
    }

    /// Remove a subscriber. Returns `false` if the id was unknown.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut registry = self.registry();
        let before = registry.subscribers.len();
        registry.subscribers.retain(|(sid, _)| *sid != id);
        registry.subscribers.len() != before
    }

    /// Deliver an event to every current subscriber.
    ///
    /// The registry lock is released before callbacks run, so a subscriber
    /// may subscribe or unsubscribe from inside its callback. Returns the
    /// number of subscribers notified.
    pub fn publish(&self, event: SessionEvent) -> usize {
        let snapshot: Vec<Callback> = self
            .registry()
            .subscribers
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();

        for callback in &snapshot {
            callback(&event);
        }
        snapshot.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry().subscribers.len()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}
