//! Durable AI request records and change subscriptions keyed by record id.
//!
//! The orchestrator only inserts records and reads their mutations. Status
//! transitions belong to the completion worker, which drives them through
//! [`RequestStore::update_status`].

mod hub;
mod memory;
mod sqlite;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{AiRequestRecord, NewAiRequest, RequestStatus};

pub use hub::SubscriptionHub;
pub use memory::InMemoryRequestStore;
pub use sqlite::SqliteRequestStore;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),
    #[error("request not found: {0}")]
    NotFound(Uuid),
    #[error("subscription channel error: {0}")]
    Channel(String),
}

impl From<tokio_rusqlite::Error> for StoreError {
    fn from(err: tokio_rusqlite::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(pub Uuid);

impl SubscriptionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a subscriber sees for its record.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestEvent {
    Updated(AiRequestRecord),
    /// The change feed failed; the record's real status is unknown.
    ChannelError(String),
}

/// An open change-subscription scoped to one request id. The receiver
/// disconnects once the subscription is removed from its store.
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub request_id: Uuid,
    pub receiver: flume::Receiver<RequestEvent>,
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

#[async_trait]
pub trait RequestStore: Send + Sync {
    /// Insert a new `pending` record. The store assigns id and timestamps.
    async fn insert(&self, request: NewAiRequest) -> Result<AiRequestRecord, StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<AiRequestRecord>, StoreError>;

    /// Worker-side mutation. Subscribers of `id` are notified.
    async fn update_status(
        &self,
        id: Uuid,
        status: RequestStatus,
        response: Option<String>,
        error_message: Option<String>,
    ) -> Result<AiRequestRecord, StoreError>;

    fn subscribe(&self, request_id: Uuid) -> Result<Subscription, StoreError>;

    /// Close a subscription. Returns `false` if it was not open.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;

    fn active_subscriptions(&self) -> usize;
}

pub(crate) fn apply_status(
    record: &mut AiRequestRecord,
    status: RequestStatus,
    response: Option<String>,
    error_message: Option<String>,
) {
    record.status = status;
    if response.is_some() {
        record.response = response;
    }
    if error_message.is_some() {
        record.error_message = error_message;
    }
    record.updated_at = chrono::Utc::now();
}
