//! Correlates a submitted AI request with its asynchronous result.
//!
//! Submission inserts a `pending` record; the completion worker mutates it
//! elsewhere. The tracked id drives exactly one change subscription at a
//! time: tracking a new id closes the previous subscription first.

use std::sync::{Arc, Mutex, PoisonError};

use rx_core::identity::IdentityProvider;
use rx_core::request_store::{RequestEvent, RequestStore, Subscription, SubscriptionId};
use rx_core::types::{AiRequestRecord, NewAiRequest, RequestStatus};
use rx_telemetry::tracing_setup::create_request_span;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

use crate::error::{Result, WorkflowError};
use crate::notice::Notifier;
use crate::state::SharedState;

pub const MISSING_IDENTITY: &str = "User identity is not available.";
pub const EMPTY_PROMPT: &str = "Prompt is empty.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResult {
    pub success: bool,
    pub request_id: Option<Uuid>,
    pub error: Option<String>,
}

impl SubmitResult {
    fn accepted(id: Uuid) -> Self {
        Self {
            success: true,
            request_id: Some(id),
            error: None,
        }
    }

    fn rejected(error: impl Into<String>) -> Self {
        Self {
            success: false,
            request_id: None,
            error: Some(error.into()),
        }
    }
}

struct Listener {
    request_id: Uuid,
    subscription: SubscriptionId,
    handle: JoinHandle<()>,
}

#[derive(Clone)]
pub struct RequestCorrelator {
    state: SharedState,
    store: Arc<dyn RequestStore>,
    identity: Arc<dyn IdentityProvider>,
    notifier: Notifier,
    listener: Arc<Mutex<Option<Listener>>>,
}

impl RequestCorrelator {
    pub fn new(
        state: SharedState,
        store: Arc<dyn RequestStore>,
        identity: Arc<dyn IdentityProvider>,
        notifier: Notifier,
    ) -> Self {
        Self {
            state,
            store,
            identity,
            notifier,
            listener: Arc::new(Mutex::new(None)),
        }
    }

    /// Insert a pending record for `prompt` and start tracking it.
    pub async fn submit(&self, prompt: &str) -> SubmitResult {
        let Some(user_id) = self.identity.operator_id() else {
            self.notifier.error(MISSING_IDENTITY);
            return SubmitResult::rejected(MISSING_IDENTITY);
        };
        if prompt.trim().is_empty() {
            self.notifier.warning(EMPTY_PROMPT);
            return SubmitResult::rejected(EMPTY_PROMPT);
        }

        self.close_subscription();
        self.state.update(|s| {
            s.submitting = true;
            s.tracked_request = None;
            s.set_ai_response(String::new());
        });

        let inserted = self
            .store
            .insert(NewAiRequest {
                prompt: prompt.to_string(),
                user_id,
            })
            .await;

        match inserted {
            Ok(record) => {
                info!(request_id = %record.id, "AI request queued");
                self.notifier
                    .info("Request sent. Waiting for the AI response...");
                if let Err(e) = self.set_tracked_request(Some(record.id)) {
                    return SubmitResult {
                        success: true,
                        request_id: Some(record.id),
                        error: Some(e.to_string()),
                    };
                }
                SubmitResult::accepted(record.id)
            }
            Err(e) => {
                self.state.update(|s| s.submitting = false);
                let err = WorkflowError::Submission(e.to_string());
                self.notifier.error(err.to_string());
                SubmitResult::rejected(err.to_string())
            }
        }
    }

    /// Replace the tracked request. Closes any open subscription, then opens
    /// one for `id` when given.
    pub fn set_tracked_request(&self, id: Option<Uuid>) -> Result<()> {
        self.close_subscription();
        self.state.update(|s| s.tracked_request = id);
        let Some(id) = id else {
            return Ok(());
        };

        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => return Err(self.channel_failed(id, &format!("no async runtime: {e}"))),
        };
        let subscription = match self.store.subscribe(id) {
            Ok(subscription) => subscription,
            Err(e) => return Err(self.channel_failed(id, &e.to_string())),
        };

        let subscription_id = subscription.id;
        let task = ListenerTask {
            state: self.state.clone(),
            store: self.store.clone(),
            notifier: self.notifier.clone(),
        };
        let join = handle.spawn(
            task.run(subscription)
                .instrument(create_request_span(&id, "await_result")),
        );
        *self.slot() = Some(Listener {
            request_id: id,
            subscription: subscription_id,
            handle: join,
        });
        debug!(request_id = %id, subscription = %subscription_id, "tracking request");
        Ok(())
    }

    /// Stop waiting for the tracked request. The stored record is left as
    /// is and nothing cancels it server-side.
    pub fn abandon(&self) {
        let abandoned = self.state.read(|s| s.tracked_request);
        self.close_subscription();
        self.state.update(|s| {
            s.tracked_request = None;
            s.submitting = false;
        });
        if let Some(id) = abandoned {
            info!(request_id = %id, "request abandoned; record left orphaned");
            self.notifier.info("Stopped waiting for the AI response.");
        }
    }

    pub fn tracked_request(&self) -> Option<Uuid> {
        self.state.read(|s| s.tracked_request)
    }

    /// Close the open subscription when the state no longer tracks its
    /// request, e.g. after a repository change reset the session. Returns
    /// whether one was closed.
    pub fn release_untracked(&self) -> bool {
        let tracked = self.state.read(|s| s.tracked_request);
        let stale = self
            .slot()
            .as_ref()
            .is_some_and(|listener| Some(listener.request_id) != tracked);
        if stale {
            debug!(tracked = ?tracked, "tracked request cleared; closing its subscription");
            self.close_subscription();
        }
        stale
    }

    /// Abort the listener and close its subscription.
    pub fn teardown(&self) {
        self.close_subscription();
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<Listener>> {
        self.listener.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn close_subscription(&self) {
        if let Some(listener) = self.slot().take() {
            listener.handle.abort();
            if self.store.unsubscribe(listener.subscription) {
                debug!(subscription = %listener.subscription, "subscription closed");
            }
        }
    }

    fn channel_failed(&self, id: Uuid, message: &str) -> WorkflowError {
        self.state.update(|s| {
            if s.tracked_request == Some(id) {
                s.tracked_request = None;
                s.submitting = false;
            }
        });
        self.notifier.warning(format!(
            "Lost the connection for request {id}; its result may never arrive. ({message})"
        ));
        WorkflowError::Channel(message.to_string())
    }
}

// ---------------------------------------------------------------------------
// Listener task
// ---------------------------------------------------------------------------

enum Progress {
    Waiting,
    Done,
}

struct ListenerTask {
    state: SharedState,
    store: Arc<dyn RequestStore>,
    notifier: Notifier,
}

impl ListenerTask {
    async fn run(self, subscription: Subscription) {
        let id = subscription.request_id;
        let mut last_status = None;

        // Changes made between insert and subscribe were not delivered.
        match self.store.get(id).await {
            Ok(Some(record)) => {
                if let Progress::Done = self.handle(&record, &mut last_status) {
                    self.store.unsubscribe(subscription.id);
                    return;
                }
            }
            Ok(None) => {}
            Err(e) => warn!(request_id = %id, error = %e, "initial read of request failed"),
        }

        loop {
            match subscription.receiver.recv_async().await {
                Ok(RequestEvent::Updated(record)) => {
                    if let Progress::Done = self.handle(&record, &mut last_status) {
                        break;
                    }
                }
                Ok(RequestEvent::ChannelError(message)) => {
                    self.lost(id, &message);
                    break;
                }
                Err(_) => {
                    self.lost(id, "subscription closed");
                    break;
                }
            }
        }
        self.store.unsubscribe(subscription.id);
    }

    fn handle(&self, record: &AiRequestRecord, last_status: &mut Option<RequestStatus>) -> Progress {
        if *last_status == Some(record.status) {
            return Progress::Waiting;
        }
        *last_status = Some(record.status);

        match record.status {
            RequestStatus::Pending => Progress::Waiting,
            RequestStatus::Processing => {
                if self.is_tracked(record.id) {
                    self.notifier.info("The AI is working on the request...");
                }
                Progress::Waiting
            }
            RequestStatus::Completed => {
                let response = record.response.clone().unwrap_or_default();
                let applied = self.state.update(|s| {
                    if s.tracked_request != Some(record.id) {
                        return false;
                    }
                    s.set_ai_response(response);
                    s.submitting = false;
                    s.tracked_request = None;
                    true
                });
                if applied {
                    info!(request_id = %record.id, "AI response received");
                    self.notifier.success("AI response received.");
                }
                Progress::Done
            }
            RequestStatus::Failed => {
                let applied = self.state.update(|s| {
                    if s.tracked_request != Some(record.id) {
                        return false;
                    }
                    s.submitting = false;
                    s.tracked_request = None;
                    true
                });
                if applied {
                    let err = WorkflowError::AsyncResultFailure(
                        record
                            .error_message
                            .clone()
                            .unwrap_or_else(|| "unknown error".into()),
                    );
                    warn!(request_id = %record.id, error = %err, "AI request failed");
                    self.notifier.error(err.to_string());
                }
                Progress::Done
            }
        }
    }

    fn is_tracked(&self, id: Uuid) -> bool {
        self.state.read(|s| s.tracked_request == Some(id))
    }

    fn lost(&self, id: Uuid, message: &str) {
        let was_tracked = self.state.update(|s| {
            if s.tracked_request != Some(id) {
                return false;
            }
            s.tracked_request = None;
            s.submitting = false;
            true
        });
        if was_tracked {
            warn!(request_id = %id, error = %message, "change feed lost");
            self.notifier.warning(format!(
                "Lost the connection for request {id}; its result may never arrive. ({message})"
            ));
        }
    }
}
