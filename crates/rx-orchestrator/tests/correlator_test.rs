//! Integration tests for request submission and asynchronous result
//! correlation.

mod common;

use std::sync::atomic::Ordering;

use common::*;
use rx_core::request_store::RequestStore;
use rx_core::types::{RequestStatus, WorkflowStep};
use rx_orchestrator::correlator::{EMPTY_PROMPT, MISSING_IDENTITY};
use rx_orchestrator::notice::NoticeLevel;

async fn fetched_with_request(prompt: &str) -> Harness {
    let h = harness();
    h.session.fetch().await.unwrap();
    h.session.set_request_text(prompt);
    h
}

// ---------------------------------------------------------------------------
// Preconditions
// ---------------------------------------------------------------------------

#[tokio::test]
async fn empty_prompt_is_rejected_without_insert() {
    let h = fetched_with_request("   \n").await;
    let result = h.session.submit_request().await;

    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some(EMPTY_PROMPT));
    assert!(result.request_id.is_none());
    assert_eq!(h.store.inserts(), 0);
    assert!(!h.session.snapshot().submitting);
}

#[tokio::test]
async fn missing_identity_is_rejected_without_insert() {
    let h = harness_with(sample_tree(), None);
    h.session.set_request_text("Add dark mode");
    let result = h.session.submit_request().await;

    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some(MISSING_IDENTITY));
    assert_eq!(h.store.inserts(), 0);
}

#[tokio::test]
async fn insert_failure_clears_submitting() {
    let h = fetched_with_request("Add dark mode").await;
    h.store.fail_insert.store(true, Ordering::SeqCst);

    let result = h.session.submit_request().await;
    assert!(!result.success);
    assert!(result.error.unwrap().contains("disk full"));

    let state = h.session.snapshot();
    assert!(!state.submitting);
    assert!(state.tracked_request.is_none());
    assert_eq!(h.store.active_subscriptions(), 0);
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn pending_processing_completed() {
    let h = fetched_with_request("Add dark mode").await;
    let result = h.session.submit_request().await;
    assert!(result.success);
    let id = result.request_id.unwrap();

    let state = h.session.snapshot();
    assert!(state.submitting);
    assert_eq!(state.tracked_request, Some(id));
    assert_eq!(h.store.inserts(), 1);
    assert_eq!(h.store.active_subscriptions(), 1);
    assert_eq!(h.session.current_step(), WorkflowStep::GeneratingAiResponse);

    let record = h.store.get(id).await.unwrap().unwrap();
    assert_eq!(record.status, RequestStatus::Pending);
    assert_eq!(record.user_id, "operator-1");
    assert!(record.prompt.contains("Add dark mode"));

    h.store
        .update_status(id, RequestStatus::Processing, None, None)
        .await
        .unwrap();
    assert!(
        wait_until(|| h
            .session
            .drain_notices()
            .iter()
            .any(|n| n.message.contains("working on")))
        .await
    );
    assert_eq!(h.session.current_step(), WorkflowStep::GeneratingAiResponse);

    let response = "Here you go.\n\n```tsx\n// app/page.tsx\nexport default 2;\n```\n";
    h.store
        .update_status(id, RequestStatus::Completed, Some(response.into()), None)
        .await
        .unwrap();
    assert!(wait_until(|| h.session.snapshot().tracked_request.is_none()).await);

    let state = h.session.snapshot();
    assert_eq!(state.ai_response, response);
    assert!(state.ai_response_has_content);
    assert!(!state.submitting);
    assert!(wait_until(|| h.store.active_subscriptions() == 0).await);
    assert_eq!(h.session.current_step(), WorkflowStep::ResponsePasted);
}

#[tokio::test]
async fn failed_request_surfaces_error_message() {
    let h = fetched_with_request("Add dark mode").await;
    let id = h.session.submit_request().await.request_id.unwrap();

    h.store
        .update_status(id, RequestStatus::Failed, None, Some("model overloaded".into()))
        .await
        .unwrap();
    assert!(wait_until(|| !h.session.snapshot().submitting).await);

    let state = h.session.snapshot();
    assert!(state.tracked_request.is_none());
    assert!(!state.ai_response_has_content);
    let notices = h.session.drain_notices();
    assert!(notices
        .iter()
        .any(|n| n.level == NoticeLevel::Error && n.message.contains("model overloaded")));
}

#[tokio::test]
async fn completion_before_listener_starts_is_not_lost() {
    let h = fetched_with_request("Add dark mode").await;
    let id = h.session.submit_request().await.request_id.unwrap();

    // No await point between submit and the worker finishing, so the
    // listener has not run yet.
    h.store
        .update_status(id, RequestStatus::Completed, Some("ok".into()), None)
        .await
        .unwrap();
    assert!(wait_until(|| h.session.ai_response() == "ok").await);
}

// ---------------------------------------------------------------------------
// Subscription management
// ---------------------------------------------------------------------------

#[tokio::test]
async fn resubmitting_keeps_a_single_subscription() {
    let h = fetched_with_request("first").await;
    let first = h.session.submit_request().await.request_id.unwrap();
    assert_eq!(h.store.active_subscriptions(), 1);

    h.session.set_request_text("second");
    let second = h.session.submit_request().await.request_id.unwrap();
    assert_ne!(first, second);
    assert_eq!(h.store.active_subscriptions(), 1);
    assert_eq!(h.session.snapshot().tracked_request, Some(second));

    // A late result for the first request is ignored.
    h.store
        .update_status(first, RequestStatus::Completed, Some("stale".into()), None)
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    assert!(h.session.ai_response().is_empty());
    assert_eq!(h.session.snapshot().tracked_request, Some(second));
}

#[tokio::test]
async fn tracking_none_closes_subscription() {
    let h = fetched_with_request("p").await;
    h.session.submit_request().await;
    assert_eq!(h.store.active_subscriptions(), 1);

    h.session.set_tracked_request(None).unwrap();
    assert_eq!(h.store.active_subscriptions(), 0);
    assert!(h.session.snapshot().tracked_request.is_none());
}

#[tokio::test]
async fn changing_repository_closes_the_open_subscription() {
    let h = fetched_with_request("p").await;
    let id = h.session.submit_request().await.request_id.unwrap();
    assert_eq!(h.store.active_subscriptions(), 1);

    h.session.set_repo_url("https://github.com/o/other");
    let state = h.session.snapshot();
    assert!(state.tracked_request.is_none());
    assert!(!state.submitting);
    assert_eq!(h.store.active_subscriptions(), 0);

    // A late answer for the dropped request changes nothing.
    h.store
        .update_status(id, RequestStatus::Completed, Some("late".into()), None)
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    assert!(h.session.ai_response().is_empty());
}

#[tokio::test]
async fn same_repository_url_keeps_tracking() {
    let h = fetched_with_request("p").await;
    let id = h.session.submit_request().await.request_id.unwrap();

    h.session.set_repo_url(REPO_URL);
    assert_eq!(h.session.snapshot().tracked_request, Some(id));
    assert_eq!(h.store.active_subscriptions(), 1);
}

#[tokio::test]
async fn abandon_orphans_the_record() {
    let h = fetched_with_request("p").await;
    let id = h.session.submit_request().await.request_id.unwrap();

    h.session.abandon_request();
    let state = h.session.snapshot();
    assert!(state.tracked_request.is_none());
    assert!(!state.submitting);
    assert_eq!(h.store.active_subscriptions(), 0);

    // The record itself is untouched.
    let record = h.store.get(id).await.unwrap().unwrap();
    assert_eq!(record.status, RequestStatus::Pending);
    assert_ne!(h.session.current_step(), WorkflowStep::GeneratingAiResponse);
}

#[tokio::test]
async fn subscribe_failure_clears_tracking_and_warns() {
    let h = fetched_with_request("p").await;
    h.store.fail_subscribe.store(true, Ordering::SeqCst);

    let result = h.session.submit_request().await;
    assert!(result.request_id.is_some());
    assert!(result.error.unwrap().contains("realtime unavailable"));

    let state = h.session.snapshot();
    assert!(state.tracked_request.is_none());
    assert!(!state.submitting);
    assert!(h
        .session
        .drain_notices()
        .iter()
        .any(|n| n.level == NoticeLevel::Warning && n.message.contains("may never arrive")));
}

#[tokio::test]
async fn channel_error_while_tracked_clears_tracking() {
    let h = fetched_with_request("p").await;
    let id = h.session.submit_request().await.request_id.unwrap();
    assert!(wait_until(|| h.store.active_subscriptions() == 1).await);

    h.store.inner.hub().fail(id, "connection reset");

    assert!(wait_until(|| h.session.snapshot().tracked_request.is_none()).await);
    assert!(!h.session.snapshot().submitting);
}

// ---------------------------------------------------------------------------
// SQLite-backed store
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sqlite_worker_in_other_connection_completes_request() {
    use std::sync::Arc;
    use std::time::Duration;

    use rx_core::config::Config;
    use rx_core::identity::StaticIdentity;
    use rx_core::request_store::SqliteRequestStore;
    use rx_orchestrator::WorkflowSession;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("requests.db");
    let store = Arc::new(
        SqliteRequestStore::open(&path)
            .await
            .unwrap()
            .with_poll_interval(Duration::from_millis(10)),
    );
    let worker = SqliteRequestStore::open(&path).await.unwrap();

    let mut config = Config::default();
    config.repository.url = REPO_URL.into();
    let session = WorkflowSession::new(
        &config,
        Arc::new(FakeHost::new(sample_tree())),
        store.clone(),
        Arc::new(StaticIdentity::new("operator-1")),
    );
    session.fetch().await.unwrap();
    session.set_request_text("Add dark mode");

    let id = session.submit_request().await.request_id.unwrap();
    let pending = worker.list_pending(10).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, id);

    worker
        .update_status(id, RequestStatus::Processing, None, None)
        .await
        .unwrap();
    worker
        .update_status(id, RequestStatus::Completed, Some("done".into()), None)
        .await
        .unwrap();

    assert!(wait_until(|| session.ai_response() == "done").await);
    assert!(session.snapshot().tracked_request.is_none());
    assert!(wait_until(|| store.active_subscriptions() == 0).await);
}
