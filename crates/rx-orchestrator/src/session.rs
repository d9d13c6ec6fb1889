//! `WorkflowSession` -- the façade operators drive.
//!
//! Owns the shared [`SessionState`] and reaches the fetcher and stager only
//! through the [`Fetchable`], [`Parseable`] and [`ChangeCreatable`] seams, so
//! either side can be replaced in tests.

use std::sync::Arc;

use async_trait::async_trait;
use rx_core::config::Config;
use rx_core::hosting::RepositoryHost;
use rx_core::identity::IdentityProvider;
use rx_core::request_store::RequestStore;
use rx_core::response_parser::ParsedResponse;
use rx_core::types::{ChangeRef, FileBlock, WorkflowStep};
use rx_core::workflow::{derive_step, guidance, WorkflowFlags};
use uuid::Uuid;

use crate::correlator::{RequestCorrelator, SubmitResult};
use crate::error::Result;
use crate::fetcher::{FetchOutcome, RepoFetcher};
use crate::notice::{Notice, Notifier};
use crate::selection::FileSelection;
use crate::stager::PatchStager;
use crate::state::{ActiveTask, SessionState, SharedState};

// ---------------------------------------------------------------------------
// Seams
// ---------------------------------------------------------------------------

#[async_trait]
pub trait Fetchable: Send + Sync {
    async fn fetch(
        &self,
        is_retry: bool,
        branch_override: Option<String>,
        active_task: Option<ActiveTask>,
    ) -> Result<FetchOutcome>;
}

pub trait Parseable: Send + Sync {
    fn parse(&self, text: Option<&str>) -> ParsedResponse;
    fn toggle(&self, path: &str) -> bool;
    fn select_all(&self) -> usize;
    fn deselect_all(&self);
    fn selected_blocks(&self) -> Vec<FileBlock>;
}

#[async_trait]
pub trait ChangeCreatable: Send + Sync {
    async fn create_change(&self, title: Option<String>) -> Result<ChangeRef>;
}

#[async_trait]
impl Fetchable for RepoFetcher {
    async fn fetch(
        &self,
        is_retry: bool,
        branch_override: Option<String>,
        active_task: Option<ActiveTask>,
    ) -> Result<FetchOutcome> {
        RepoFetcher::fetch(self, is_retry, branch_override, active_task).await
    }
}

impl Parseable for PatchStager {
    fn parse(&self, text: Option<&str>) -> ParsedResponse {
        PatchStager::parse(self, text)
    }

    fn toggle(&self, path: &str) -> bool {
        PatchStager::toggle(self, path)
    }

    fn select_all(&self) -> usize {
        PatchStager::select_all(self)
    }

    fn deselect_all(&self) {
        PatchStager::deselect_all(self)
    }

    fn selected_blocks(&self) -> Vec<FileBlock> {
        PatchStager::selected_blocks(self)
    }
}

#[async_trait]
impl ChangeCreatable for PatchStager {
    async fn create_change(&self, title: Option<String>) -> Result<ChangeRef> {
        PatchStager::create_change(self, title).await
    }
}

// ---------------------------------------------------------------------------
// WorkflowSession
// ---------------------------------------------------------------------------

pub struct WorkflowSession {
    state: SharedState,
    notifier: Notifier,
    notices: flume::Receiver<Notice>,
    fetcher: Arc<dyn Fetchable>,
    parser: Arc<dyn Parseable>,
    change_creator: Arc<dyn ChangeCreatable>,
    selection: FileSelection,
    correlator: RequestCorrelator,
}

impl WorkflowSession {
    /// Session wired to the given collaborators, seeded from `config`.
    pub fn new(
        config: &Config,
        host: Arc<dyn RepositoryHost>,
        store: Arc<dyn RequestStore>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        let state = SharedState::new(SessionState {
            repo_url: config.repository.url.clone(),
            token: config.repository.token(),
            manual_branch: config.repository.default_branch.clone(),
            ..Default::default()
        });
        let (notifier, notices) = Notifier::channel();
        let important = config.selection.important_files.clone();

        let fetcher = RepoFetcher::new(
            state.clone(),
            host.clone(),
            notifier.clone(),
            important.clone(),
            config.fetch.clone(),
        );
        let stager = Arc::new(PatchStager::new(state.clone(), host, notifier.clone()));

        Self {
            selection: FileSelection::new(state.clone(), notifier.clone(), important),
            correlator: RequestCorrelator::new(state.clone(), store, identity, notifier.clone()),
            fetcher: Arc::new(fetcher),
            parser: stager.clone(),
            change_creator: stager,
            state,
            notifier,
            notices,
        }
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetchable>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn with_parser(mut self, parser: Arc<dyn Parseable>) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_change_creator(mut self, creator: Arc<dyn ChangeCreatable>) -> Self {
        self.change_creator = creator;
        self
    }

    // ---- derived view -------------------------------------------------------

    pub fn flags(&self) -> WorkflowFlags {
        self.state.flags()
    }

    /// Recomputed from the current state on every call.
    pub fn current_step(&self) -> WorkflowStep {
        derive_step(&self.flags())
    }

    pub fn guidance(&self) -> String {
        let flags = self.flags();
        guidance(derive_step(&flags), &flags)
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.snapshot()
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    pub fn notices(&self) -> flume::Receiver<Notice> {
        self.notices.clone()
    }

    /// Notices emitted since the last drain.
    pub fn drain_notices(&self) -> Vec<Notice> {
        self.notices.drain().collect()
    }

    // ---- repository ---------------------------------------------------------

    /// A different URL resets the fetched snapshot and stops tracking any
    /// outstanding request.
    pub fn set_repo_url(&self, url: impl Into<String>) {
        self.state.update(|s| s.set_repo_url(url));
        self.correlator.release_untracked();
    }

    pub fn set_token(&self, token: Option<String>) {
        self.state.update(|s| s.token = token);
    }

    pub fn set_focus_route(&self, route: Option<String>) {
        self.state.update(|s| s.focus_route = route);
    }

    pub fn set_manual_branch(&self, branch: Option<String>) {
        self.state.update(|s| s.manual_branch = branch);
    }

    pub fn settings_requested(&self) -> bool {
        self.state.read(|s| s.settings_requested)
    }

    // ---- fetch --------------------------------------------------------------

    pub async fn fetch(&self) -> Result<FetchOutcome> {
        self.run_fetch(false, None, None).await
    }

    pub async fn retry_fetch(&self) -> Result<FetchOutcome> {
        self.run_fetch(true, None, None).await
    }

    pub async fn fetch_branch(&self, branch: impl Into<String>) -> Result<FetchOutcome> {
        self.run_fetch(false, Some(branch.into()), None).await
    }

    /// Fetch for a single-file task pinned to `task.target_path`.
    pub async fn fetch_for_task(&self, task: ActiveTask) -> Result<FetchOutcome> {
        self.run_fetch(false, None, Some(task)).await
    }

    async fn run_fetch(
        &self,
        is_retry: bool,
        branch: Option<String>,
        task: Option<ActiveTask>,
    ) -> Result<FetchOutcome> {
        let result = self.fetcher.fetch(is_retry, branch, task).await;
        self.correlator.release_untracked();
        result
    }

    // ---- selection ----------------------------------------------------------

    pub fn toggle_file(&self, path: &str) -> bool {
        self.selection.toggle_file(path)
    }

    pub fn select_highlighted(&self) -> usize {
        self.selection.select_highlighted()
    }

    pub fn add_important_files(&self) -> usize {
        self.selection.add_important_files()
    }

    pub fn select_all_files(&self) -> usize {
        self.selection.select_all()
    }

    pub fn deselect_all_files(&self) -> usize {
        self.selection.deselect_all()
    }

    // ---- request ------------------------------------------------------------

    pub fn add_selected_to_request(&self) -> usize {
        self.selection.add_selected_to_request()
    }

    pub fn set_request_text(&self, text: impl Into<String>) {
        self.state.update(|s| s.set_request_text(text));
    }

    pub fn request_text(&self) -> String {
        self.state.read(|s| s.request_text.clone())
    }

    /// Manual path: the operator copies the request to an assistant outside
    /// the workflow. Returns the copied text.
    pub fn copy_request(&self) -> Option<String> {
        let text = self.state.update(|s| {
            if s.request_text.trim().is_empty() {
                return None;
            }
            s.set_request_copied(true);
            Some(s.request_text.clone())
        });
        match &text {
            Some(_) => self.notifier.success("Request copied."),
            None => self.notifier.warning("The request is empty."),
        }
        text
    }

    /// Submit the current request text to the AI completion service.
    pub async fn submit_request(&self) -> SubmitResult {
        let prompt = self.request_text();
        self.correlator.submit(&prompt).await
    }

    pub fn set_tracked_request(&self, id: Option<Uuid>) -> Result<()> {
        self.correlator.set_tracked_request(id)
    }

    pub fn abandon_request(&self) {
        self.correlator.abandon();
    }

    // ---- response -----------------------------------------------------------

    /// Manual path: a response pasted by the operator.
    pub fn paste_response(&self, text: impl Into<String>) {
        let text = text.into();
        self.state.update(|s| s.set_ai_response(text));
    }

    pub fn set_ai_response_has_content(&self, has_content: bool) {
        self.state
            .update(|s| s.set_ai_response_has_content(has_content));
    }

    pub fn ai_response(&self) -> String {
        self.state.read(|s| s.ai_response.clone())
    }

    pub fn parse_response(&self) -> ParsedResponse {
        self.parser.parse(None)
    }

    pub fn toggle_parsed_file(&self, path: &str) -> bool {
        self.parser.toggle(path)
    }

    pub fn select_all_parsed(&self) -> usize {
        self.parser.select_all()
    }

    pub fn deselect_all_parsed(&self) {
        self.parser.deselect_all()
    }

    pub fn selected_blocks(&self) -> Vec<FileBlock> {
        self.parser.selected_blocks()
    }

    /// Branch the next change is committed to; `None` starts a new branch.
    /// Fetching replaces it.
    pub fn set_target_branch(&self, branch: Option<String>) {
        self.state.update(|s| s.target_branch = branch);
    }

    pub async fn create_change(&self, title: Option<String>) -> Result<ChangeRef> {
        self.change_creator.create_change(title).await
    }
}

impl Drop for WorkflowSession {
    fn drop(&mut self) {
        self.correlator.teardown();
    }
}
