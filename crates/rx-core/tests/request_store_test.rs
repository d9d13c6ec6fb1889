use std::time::Duration;

use rx_core::request_store::{
    InMemoryRequestStore, RequestEvent, RequestStore, SqliteRequestStore, StoreError,
};
use rx_core::types::{NewAiRequest, RequestStatus};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn new_request(prompt: &str) -> NewAiRequest {
    NewAiRequest {
        prompt: prompt.to_string(),
        user_id: "operator-1".to_string(),
    }
}

async fn next_update(rx: &flume::Receiver<RequestEvent>) -> RequestEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv_async())
        .await
        .expect("event within timeout")
        .expect("channel open")
}

/// Skip events until one with the given status arrives.
async fn wait_for_status(rx: &flume::Receiver<RequestEvent>, status: RequestStatus) -> RequestEvent {
    loop {
        let event = next_update(rx).await;
        match &event {
            RequestEvent::Updated(record) if record.status == status => return event,
            RequestEvent::Updated(_) => continue,
            RequestEvent::ChannelError(msg) => panic!("unexpected channel error: {msg}"),
        }
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

#[tokio::test]
async fn memory_insert_assigns_id_and_pending_status() {
    let store = InMemoryRequestStore::new();
    let record = store.insert(new_request("hello")).await.expect("insert");
    assert_eq!(record.status, RequestStatus::Pending);
    assert_eq!(record.prompt, "hello");
    assert!(record.response.is_none());

    let fetched = store.get(record.id).await.expect("get").expect("present");
    assert_eq!(fetched, record);
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn memory_subscribers_see_worker_transitions() {
    let store = InMemoryRequestStore::new();
    let record = store.insert(new_request("p")).await.expect("insert");
    let sub = store.subscribe(record.id).expect("subscribe");
    assert_eq!(store.active_subscriptions(), 1);

    store
        .update_status(record.id, RequestStatus::Processing, None, None)
        .await
        .expect("processing");
    store
        .update_status(record.id, RequestStatus::Completed, Some("R".into()), None)
        .await
        .expect("completed");

    assert!(matches!(
        next_update(&sub.receiver).await,
        RequestEvent::Updated(r) if r.status == RequestStatus::Processing
    ));
    match next_update(&sub.receiver).await {
        RequestEvent::Updated(r) => {
            assert_eq!(r.status, RequestStatus::Completed);
            assert_eq!(r.response.as_deref(), Some("R"));
        }
        other => panic!("unexpected event: {other:?}"),
    }

    assert!(store.unsubscribe(sub.id));
    assert_eq!(store.active_subscriptions(), 0);
}

#[tokio::test]
async fn memory_update_unknown_record_is_not_found() {
    let store = InMemoryRequestStore::new();
    let id = Uuid::new_v4();
    let err = store
        .update_status(id, RequestStatus::Failed, None, Some("x".into()))
        .await
        .expect_err("should fail");
    assert!(matches!(err, StoreError::NotFound(missing) if missing == id));
}

// ---------------------------------------------------------------------------
// SQLite store
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sqlite_roundtrip_and_failure_message() {
    let store = SqliteRequestStore::open_in_memory().await.expect("open");
    let record = store.insert(new_request("fix it")).await.expect("insert");

    let pending = store.list_pending(10).await.expect("list");
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, record.id);

    let failed = store
        .update_status(record.id, RequestStatus::Failed, None, Some("quota".into()))
        .await
        .expect("update");
    assert_eq!(failed.status, RequestStatus::Failed);
    assert_eq!(failed.error_message.as_deref(), Some("quota"));
    assert!(store.list_pending(10).await.expect("list").is_empty());

    let missing = store.get(Uuid::new_v4()).await.expect("get");
    assert!(missing.is_none());
}

#[tokio::test]
async fn sqlite_change_feed_delivers_completion() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = SqliteRequestStore::open(dir.path().join("requests.db"))
        .await
        .expect("open")
        .with_poll_interval(Duration::from_millis(10));

    let record = store.insert(new_request("p")).await.expect("insert");
    let sub = store.subscribe(record.id).expect("subscribe");

    store
        .update_status(record.id, RequestStatus::Completed, Some("R".into()), None)
        .await
        .expect("complete");

    match wait_for_status(&sub.receiver, RequestStatus::Completed).await {
        RequestEvent::Updated(r) => assert_eq!(r.response.as_deref(), Some("R")),
        other => panic!("unexpected event: {other:?}"),
    }

    assert!(store.unsubscribe(sub.id));
    assert_eq!(store.active_subscriptions(), 0);
}

#[tokio::test]
async fn sqlite_change_feed_reports_missing_record() {
    let store = SqliteRequestStore::open_in_memory()
        .await
        .expect("open")
        .with_poll_interval(Duration::from_millis(10));
    let sub = store.subscribe(Uuid::new_v4()).expect("subscribe");
    assert!(matches!(
        next_update(&sub.receiver).await,
        RequestEvent::ChannelError(_)
    ));
}
