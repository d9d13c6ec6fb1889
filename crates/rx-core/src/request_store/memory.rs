use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use super::{apply_status, RequestStore, StoreError, Subscription, SubscriptionHub, SubscriptionId};
use crate::types::{AiRequestRecord, NewAiRequest, RequestStatus};

/// Process-local request store. Updates are pushed to subscribers
/// synchronously from [`RequestStore::update_status`].
#[derive(Default)]
pub struct InMemoryRequestStore {
    records: Mutex<HashMap<Uuid, AiRequestRecord>>,
    hub: SubscriptionHub,
}

impl InMemoryRequestStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hub(&self) -> &SubscriptionHub {
        &self.hub
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RequestStore for InMemoryRequestStore {
    async fn insert(&self, request: NewAiRequest) -> Result<AiRequestRecord, StoreError> {
        let now = Utc::now();
        let record = AiRequestRecord {
            id: Uuid::new_v4(),
            prompt: request.prompt,
            user_id: request.user_id,
            status: RequestStatus::Pending,
            response: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        };
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(record.id, record.clone());
        debug!(request_id = %record.id, "request record inserted");
        Ok(record)
    }

    async fn get(&self, id: Uuid) -> Result<Option<AiRequestRecord>, StoreError> {
        Ok(self
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned())
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: RequestStatus,
        response: Option<String>,
        error_message: Option<String>,
    ) -> Result<AiRequestRecord, StoreError> {
        let updated = {
            let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
            let record = records.get_mut(&id).ok_or(StoreError::NotFound(id))?;
            apply_status(record, status, response, error_message);
            record.clone()
        };
        debug!(request_id = %id, status = %status, "request record updated");
        self.hub.publish(&updated);
        Ok(updated)
    }

    fn subscribe(&self, request_id: Uuid) -> Result<Subscription, StoreError> {
        Ok(self.hub.subscribe(request_id))
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.hub.unsubscribe(id)
    }

    fn active_subscriptions(&self) -> usize {
        self.hub.active_count()
    }
}
