use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;
use uuid::Uuid;

use super::{RequestEvent, Subscription, SubscriptionId};
use crate::types::AiRequestRecord;

struct Entry {
    request_id: Uuid,
    sender: flume::Sender<RequestEvent>,
}

/// Fan-out of record changes to subscribers, keyed by record id.
///
/// Built on flume channels; cheap to clone. Dropping an entry drops its
/// sender, which disconnects the subscriber's receiver.
#[derive(Clone, Default)]
pub struct SubscriptionHub {
    inner: Arc<Mutex<HashMap<SubscriptionId, Entry>>>,
}

impl SubscriptionHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<SubscriptionId, Entry>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a subscriber for `request_id`.
    pub fn subscribe(&self, request_id: Uuid) -> Subscription {
        let (tx, rx) = flume::unbounded();
        let id = SubscriptionId::new();
        self.entries().insert(
            id,
            Entry {
                request_id,
                sender: tx,
            },
        );
        debug!(subscription = %id, request_id = %request_id, "subscription opened");
        Subscription {
            id,
            request_id,
            receiver: rx,
        }
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.entries().remove(&id).is_some();
        if removed {
            debug!(subscription = %id, "subscription closed");
        }
        removed
    }

    pub fn is_active(&self, id: SubscriptionId) -> bool {
        self.entries().contains_key(&id)
    }

    pub fn active_count(&self) -> usize {
        self.entries().len()
    }

    /// Publish a record change to every subscriber of that record.
    /// Subscribers whose receivers were dropped are pruned.
    pub fn publish(&self, record: &AiRequestRecord) {
        let mut entries = self.entries();
        entries.retain(|_, entry| {
            entry.request_id != record.id
                || entry
                    .sender
                    .send(RequestEvent::Updated(record.clone()))
                    .is_ok()
        });
    }

    /// Deliver an event to one subscription. Returns `false` when the
    /// subscription is gone or its receiver was dropped.
    pub fn send_to(&self, id: SubscriptionId, event: RequestEvent) -> bool {
        let entries = self.entries();
        match entries.get(&id) {
            Some(entry) => entry.sender.send(event).is_ok(),
            None => false,
        }
    }

    /// Report a channel failure to every subscriber of `request_id`.
    pub fn fail(&self, request_id: Uuid, message: &str) {
        let entries = self.entries();
        for entry in entries.values().filter(|e| e.request_id == request_id) {
            let _ = entry
                .sender
                .send(RequestEvent::ChannelError(message.to_string()));
        }
    }
}
