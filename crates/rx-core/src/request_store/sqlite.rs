use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_rusqlite::Connection;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{
    RequestEvent, RequestStore, StoreError, Subscription, SubscriptionHub, SubscriptionId,
};
use crate::types::{AiRequestRecord, NewAiRequest, RequestStatus};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// SQLite-backed request store (`ai_requests` table).
///
/// The completion worker may live in another process, so subscriptions are
/// fed by a per-subscription watcher task that polls the row and forwards
/// every observed change. Writes made through this handle are picked up the
/// same way.
pub struct SqliteRequestStore {
    conn: Connection,
    hub: SubscriptionHub,
    poll_interval: Duration,
}

// ---------------------------------------------------------------------------
// helpers – row <-> record
// ---------------------------------------------------------------------------

fn conversion_error(idx: usize, err: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(err))
}

fn parse_time(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<AiRequestRecord> {
    let id_str: String = row.get(0)?;
    let status_str: String = row.get(3)?;
    let created_at_str: String = row.get(6)?;
    let updated_at_str: String = row.get(7)?;

    let status = RequestStatus::from_name(&status_str).ok_or_else(|| {
        rusqlite::Error::InvalidColumnType(3, format!("status={status_str}"), rusqlite::types::Type::Text)
    })?;

    Ok(AiRequestRecord {
        id: Uuid::parse_str(&id_str).map_err(|e| conversion_error(0, e))?,
        prompt: row.get(1)?,
        user_id: row.get(2)?,
        status,
        response: row.get(4)?,
        error_message: row.get(5)?,
        created_at: parse_time(6, &created_at_str)?,
        updated_at: parse_time(7, &updated_at_str)?,
    })
}

async fn load_record(conn: &Connection, id: Uuid) -> Result<Option<AiRequestRecord>, tokio_rusqlite::Error> {
    let id_str = id.to_string();
    conn.call(move |conn| {
        let mut stmt = conn.prepare(
            "SELECT id, prompt, user_id, status, response, error_message, created_at, updated_at
             FROM ai_requests WHERE id = ?1",
        )?;
        let mut rows = stmt.query(rusqlite::params![id_str])?;
        match rows.next()? {
            Some(row) => Ok(Some(row_to_record(row)?)),
            None => Ok(None),
        }
    })
    .await
}

impl SqliteRequestStore {
    /// Open (or create) a database at the given file path.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path.as_ref()).await?;
        Self::with_connection(conn).await
    }

    /// Create a purely in-memory database (useful for tests).
    pub async fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().await?;
        Self::with_connection(conn).await
    }

    async fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        let store = Self {
            conn,
            hub: SubscriptionHub::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        };
        store.init_schema().await?;
        Ok(store)
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        self.conn
            .call(|conn| {
                conn.execute_batch(
                    "
                    PRAGMA journal_mode=WAL;
                    PRAGMA synchronous=NORMAL;
                    PRAGMA temp_store=MEMORY;
                    PRAGMA busy_timeout=5000;

                    CREATE TABLE IF NOT EXISTS ai_requests (
                        id            TEXT PRIMARY KEY,
                        prompt        TEXT NOT NULL,
                        user_id       TEXT NOT NULL,
                        status        TEXT NOT NULL,
                        response      TEXT,
                        error_message TEXT,
                        created_at    TEXT NOT NULL,
                        updated_at    TEXT NOT NULL
                    );

                    CREATE INDEX IF NOT EXISTS idx_ai_requests_status ON ai_requests(status);
                    ",
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Oldest `pending` records, for a worker to pick up.
    pub async fn list_pending(&self, limit: usize) -> Result<Vec<AiRequestRecord>, StoreError> {
        let limit = limit as i64;
        let records = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, prompt, user_id, status, response, error_message, created_at, updated_at
                     FROM ai_requests WHERE status = 'pending'
                     ORDER BY created_at ASC LIMIT ?1",
                )?;
                let mut rows = stmt.query(rusqlite::params![limit])?;
                let mut out = Vec::new();
                while let Some(row) = rows.next()? {
                    out.push(row_to_record(row)?);
                }
                Ok(out)
            })
            .await?;
        Ok(records)
    }

    fn spawn_watcher(&self, subscription: SubscriptionId, request_id: Uuid) -> Result<(), StoreError> {
        let handle = tokio::runtime::Handle::try_current()
            .map_err(|e| StoreError::Channel(format!("no async runtime for change feed: {e}")))?;
        let conn = self.conn.clone();
        let hub = self.hub.clone();
        let interval = self.poll_interval;

        handle.spawn(async move {
            let mut last_seen: Option<(RequestStatus, DateTime<Utc>)> = None;
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if !hub.is_active(subscription) {
                    break;
                }
                match load_record(&conn, request_id).await {
                    Ok(Some(record)) => {
                        let key = (record.status, record.updated_at);
                        if last_seen == Some(key) {
                            continue;
                        }
                        last_seen = Some(key);
                        let terminal = record.status.is_terminal();
                        if !hub.send_to(subscription, RequestEvent::Updated(record)) || terminal {
                            break;
                        }
                    }
                    Ok(None) => {
                        hub.send_to(
                            subscription,
                            RequestEvent::ChannelError(format!("request {request_id} no longer exists")),
                        );
                        break;
                    }
                    Err(e) => {
                        warn!(request_id = %request_id, error = %e, "change feed read failed");
                        hub.send_to(subscription, RequestEvent::ChannelError(e.to_string()));
                        break;
                    }
                }
            }
            debug!(subscription = %subscription, "change feed watcher stopped");
        });
        Ok(())
    }
}

#[async_trait]
impl RequestStore for SqliteRequestStore {
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

        let id = record.id.to_string();
        let prompt = record.prompt.clone();
        let user_id = record.user_id.clone();
        let status = record.status.as_str();
        let created_at = now.to_rfc3339();
        let updated_at = created_at.clone();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO ai_requests (id, prompt, user_id, status, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    rusqlite::params![id, prompt, user_id, status, created_at, updated_at],
                )?;
                Ok(())
            })
            .await?;

        debug!(request_id = %record.id, "request record inserted");
        Ok(record)
    }

    async fn get(&self, id: Uuid) -> Result<Option<AiRequestRecord>, StoreError> {
        Ok(load_record(&self.conn, id).await?)
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: RequestStatus,
        response: Option<String>,
        error_message: Option<String>,
    ) -> Result<AiRequestRecord, StoreError> {
        let id_str = id.to_string();
        let status_str = status.as_str();
        let updated_at = Utc::now().to_rfc3339();
        let changed = self
            .conn
            .call(move |conn| {
                let n = conn.execute(
                    "UPDATE ai_requests SET status = ?2,
                        response = COALESCE(?3, response),
                        error_message = COALESCE(?4, error_message),
                        updated_at = ?5
                     WHERE id = ?1",
                    rusqlite::params![id_str, status_str, response, error_message, updated_at],
                )?;
                Ok(n)
            })
            .await?;
        if changed == 0 {
            return Err(StoreError::NotFound(id));
        }

        debug!(request_id = %id, status = %status, "request record updated");
        load_record(&self.conn, id)
            .await?
            .ok_or(StoreError::NotFound(id))
    }

    fn subscribe(&self, request_id: Uuid) -> Result<Subscription, StoreError> {
        let subscription = self.hub.subscribe(request_id);
        if let Err(e) = self.spawn_watcher(subscription.id, request_id) {
            self.hub.unsubscribe(subscription.id);
            return Err(e);
        }
        Ok(subscription)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.hub.unsubscribe(id)
    }

    fn active_subscriptions(&self) -> usize {
        self.hub.active_count()
    }
}
