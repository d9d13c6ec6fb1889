//! Fakes shared by the orchestrator integration tests.
#![allow(dead_code)]

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rx_core::config::Config;
use rx_core::hosting::{HostError, RepositoryHost};
use rx_core::identity::StaticIdentity;
use rx_core::repo_url::RepoRef;
use rx_core::request_store::{
    InMemoryRequestStore, RequestStore, StoreError, Subscription, SubscriptionId,
};
use rx_core::types::{AiRequestRecord, ChangeRef, FileNode, NewAiRequest, OpenChange, RequestStatus};
use rx_orchestrator::WorkflowSession;
use uuid::Uuid;

pub const REPO_URL: &str = "https://github.com/salavey13/cartest";

pub fn node(path: &str, content: &str) -> FileNode {
    FileNode::new(path, content)
}

/// Small Next.js-style tree rooted at `app/page.tsx`.
pub fn sample_tree() -> Vec<FileNode> {
    vec![
        node(
            "app/page.tsx",
            "import Header from '@/components/Header';\n\
             import { useAppContext } from '@/contexts/AppContext';\n\
             import { useTelegram } from '../hooks/useTelegram';\n\
             import { cn } from '@/lib/utils';\n\
             import '@/styles/globals.css';\n\
             import React from 'react';\n",
        ),
        node("components/Header.tsx", "export default function Header() {}"),
        node("contexts/AppContext.tsx", "export const useAppContext = () => null;"),
        node("hooks/useTelegram.ts", "export function useTelegram() {}"),
        node("lib/utils.ts", "export const cn = () => '';"),
        node("styles/globals.css", "body {}"),
        node("app/layout.tsx", "export default function Layout() {}"),
        node("package.json", "{}"),
        node("README.md", "# cartest"),
    ]
}

// ---------------------------------------------------------------------------
// Fake repository host
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CreatedChange {
    pub branch: String,
    pub files: Vec<FileNode>,
    pub title: String,
    pub description: String,
}

pub struct FakeHost {
    pub files: Mutex<Vec<FileNode>>,
    pub open_changes: Mutex<Vec<OpenChange>>,
    pub fail_fetch: AtomicBool,
    pub fail_listing: AtomicBool,
    pub fail_create: AtomicBool,
    /// Yield once inside `fetch_tree` so concurrent callers interleave.
    pub yield_in_fetch: AtomicBool,
    pub fetch_calls: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub fetched_branches: Mutex<Vec<Option<String>>>,
    pub created: Mutex<Vec<CreatedChange>>,
}

impl FakeHost {
    pub fn new(files: Vec<FileNode>) -> Self {
        Self {
            files: Mutex::new(files),
            open_changes: Mutex::new(Vec::new()),
            fail_fetch: AtomicBool::new(false),
            fail_listing: AtomicBool::new(false),
            fail_create: AtomicBool::new(false),
            yield_in_fetch: AtomicBool::new(false),
            fetch_calls: AtomicUsize::new(0),
            list_calls: AtomicUsize::new(0),
            fetched_branches: Mutex::new(Vec::new()),
            created: Mutex::new(Vec::new()),
        }
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RepositoryHost for FakeHost {
    async fn fetch_tree(
        &self,
        _repo: &RepoRef,
        _token: Option<&str>,
        branch: Option<&str>,
    ) -> Result<Vec<FileNode>, HostError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.fetched_branches
            .lock()
            .unwrap()
            .push(branch.map(String::from));
        if self.yield_in_fetch.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(HostError::Api("rate limited".into()));
        }
        Ok(self.files.lock().unwrap().clone())
    }

    async fn list_open_changes(&self, _repo: &RepoRef) -> Result<Vec<OpenChange>, HostError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(HostError::Unauthorized("bad token".into()));
        }
        Ok(self.open_changes.lock().unwrap().clone())
    }

    async fn create_change(
        &self,
        repo: &RepoRef,
        branch: &str,
        files: &[FileNode],
        title: &str,
        description: &str,
    ) -> Result<ChangeRef, HostError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(HostError::Api("validation failed".into()));
        }
        let mut created = self.created.lock().unwrap();
        created.push(CreatedChange {
            branch: branch.to_string(),
            files: files.to_vec(),
            title: title.to_string(),
            description: description.to_string(),
        });
        let existing = self
            .open_changes
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.head_branch == branch)
            .map(|c| c.id);
        let id = existing.unwrap_or(created.len() as u64);
        Ok(ChangeRef {
            id,
            url: format!("https://github.com/{}/pull/{id}", repo.slug()),
            branch: branch.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Counting request store
// ---------------------------------------------------------------------------

/// In-memory store that counts inserts and can be told to fail them.
#[derive(Default)]
pub struct CountingStore {
    pub inner: InMemoryRequestStore,
    pub inserts: AtomicUsize,
    pub fail_insert: AtomicBool,
    pub fail_subscribe: AtomicBool,
}

impl CountingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inserts(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RequestStore for CountingStore {
    async fn insert(&self, request: NewAiRequest) -> Result<AiRequestRecord, StoreError> {
        if self.fail_insert.load(Ordering::SeqCst) {
            return Err(StoreError::Database("disk full".into()));
        }
        self.inserts.fetch_add(1, Ordering::SeqCst);
        self.inner.insert(request).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<AiRequestRecord>, StoreError> {
        self.inner.get(id).await
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: RequestStatus,
        response: Option<String>,
        error_message: Option<String>,
    ) -> Result<AiRequestRecord, StoreError> {
        self.inner
            .update_status(id, status, response, error_message)
            .await
    }

    fn subscribe(&self, request_id: Uuid) -> Result<Subscription, StoreError> {
        if self.fail_subscribe.load(Ordering::SeqCst) {
            return Err(StoreError::Channel("realtime unavailable".into()));
        }
        self.inner.subscribe(request_id)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.unsubscribe(id)
    }

    fn active_subscriptions(&self) -> usize {
        self.inner.active_subscriptions()
    }
}

// ---------------------------------------------------------------------------
// Session harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub session: WorkflowSession,
    pub host: Arc<FakeHost>,
    pub store: Arc<CountingStore>,
}

pub fn harness_with(files: Vec<FileNode>, user: Option<&str>) -> Harness {
    let mut config = Config::default();
    config.repository.url = REPO_URL.to_string();
    config.repository.token_env = "RX_ORCHESTRATOR_TEST_TOKEN_NEVER_SET".into();

    let host = Arc::new(FakeHost::new(files));
    let store = Arc::new(CountingStore::new());
    let identity = Arc::new(StaticIdentity::from_optional(user.map(String::from)));
    let session = WorkflowSession::new(&config, host.clone(), store.clone(), identity);
    Harness {
        session,
        host,
        store,
    }
}

pub fn harness() -> Harness {
    harness_with(sample_tree(), Some("operator-1"))
}

/// Poll `condition` until it holds or two seconds pass.
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

/// Drive `fut` to completion with a timeout.
pub async fn within<T>(fut: impl Future<Output = T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), fut)
        .await
        .expect("completed within timeout")
}
