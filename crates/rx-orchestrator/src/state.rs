//! Shared orchestration state.
//!
//! All mutation goes through the setters on [`SessionState`], which apply the
//! downstream resets an upstream change implies. The workflow step is never
//! stored here; it is derived from [`SessionState::flags`] on every read.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError};

use rx_core::response_parser::ParsedResponse;
use rx_core::types::{ChangeRef, FetchStatus, FileBlock, FileNode, Highlights};
use rx_core::workflow::WorkflowFlags;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Targeted tasks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    ErrorFix,
    Idea,
    ImageSwap,
}

impl TaskKind {
    /// Whether the request text survives the fetch that starts this task.
    pub fn keeps_request_text(&self) -> bool {
        matches!(self, TaskKind::ErrorFix | TaskKind::Idea)
    }

    /// Whether the target file is selected automatically after the fetch.
    pub fn selects_target(&self) -> bool {
        matches!(self, TaskKind::ErrorFix | TaskKind::Idea)
    }
}

/// A single-file replacement flow pinned to one repository path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveTask {
    pub target_path: String,
    pub kind: TaskKind,
}

impl ActiveTask {
    pub fn new(target_path: impl Into<String>, kind: TaskKind) -> Self {
        Self {
            target_path: target_path.into(),
            kind,
        }
    }

    pub fn file_name(&self) -> &str {
        self.target_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.target_path)
    }
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct SessionState {
    // repository
    pub repo_url: String,
    pub token: Option<String>,
    pub manual_branch: Option<String>,
    /// URL route whose page file becomes the primary highlight.
    pub focus_route: Option<String>,
    pub settings_requested: bool,

    // fetch
    pub fetch_status: FetchStatus,
    pub progress: f64,
    pub fetch_generation: u64,
    pub fetched_branch: Option<String>,
    /// Branch a created change is committed to: the head of a discovered
    /// pull request or an explicitly chosen branch. `None` starts a new one.
    pub target_branch: Option<String>,
    pub files: Vec<FileNode>,
    pub files_fetched: bool,
    pub highlights: Highlights,
    pub selected_fetcher_files: BTreeSet<String>,
    pub discovering_changes: bool,
    pub active_task: Option<ActiveTask>,
    /// Target path of a targeted-task fetch that is still running.
    pub task_fetch_in_flight: Option<String>,

    // request
    pub request_text: String,
    pub request_copied: bool,
    pub submitting: bool,
    pub tracked_request: Option<Uuid>,

    // response
    pub ai_response: String,
    pub ai_response_has_content: bool,
    pub parsed: ParsedResponse,
    pub files_parsed: bool,
    pub selected_assistant_files: BTreeSet<String>,
    pub assistant_loading: bool,
    pub last_change: Option<ChangeRef>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the primitive flags the workflow step derives from.
    pub fn flags(&self) -> WorkflowFlags {
        WorkflowFlags {
            fetch_status: self.fetch_status,
            repo_url_entered: !self.repo_url.trim().is_empty(),
            files_fetched: self.files_fetched,
            has_primary_highlight: self.highlights.primary.is_some(),
            secondary_highlight_count: self.highlights.secondary_count(),
            selected_fetcher_count: self.selected_fetcher_files.len(),
            request_has_content: !self.request_text.trim().is_empty(),
            request_copied: self.request_copied,
            ai_response_has_content: self.ai_response_has_content,
            files_parsed: self.files_parsed,
            selected_assistant_count: self.selected_assistant_files.len(),
            assistant_loading: self.assistant_loading,
            submitting: self.submitting,
            has_tracked_request: self.tracked_request.is_some(),
        }
    }

    /// Work that blocks a new fetch: PR discovery, parsing or change
    /// creation, or an outstanding AI request.
    pub fn busy_reason(&self) -> Option<&'static str> {
        if self.discovering_changes {
            Some("open pull requests are being listed")
        } else if self.assistant_loading {
            Some("the response is being parsed or a pull request is being created")
        } else if self.submitting || self.tracked_request.is_some() {
            Some("an AI request is still outstanding")
        } else {
            None
        }
    }

    // ---- repository ---------------------------------------------------------

    pub fn set_repo_url(&mut self, url: impl Into<String>) {
        let url = url.into();
        if url.trim() != self.repo_url.trim() && self.files_fetched {
            self.set_files_fetched(false);
        }
        if !url.trim().is_empty() {
            self.settings_requested = false;
        }
        self.repo_url = url;
    }

    // ---- fetch --------------------------------------------------------------

    /// `false` drops the fetched snapshot and everything derived from it.
    /// `true` alone only flips the flag; use [`Self::publish_fetch`] to store
    /// the results of a fetch.
    pub fn set_files_fetched(&mut self, fetched: bool) {
        self.files_fetched = fetched;
        if fetched {
            return;
        }
        self.files.clear();
        self.highlights = Highlights::default();
        self.fetched_branch = None;
        self.target_branch = None;
        self.selected_fetcher_files.clear();
        self.request_text.clear();
        self.request_copied = false;
        self.tracked_request = None;
        self.submitting = false;
        self.set_ai_response(String::new());
    }

    /// Reset before a fetch starts. Targeted tasks that carry their own
    /// request text keep it.
    pub fn begin_fetch(&mut self, is_retry: bool, keep_request_text: bool) -> u64 {
        let request_text = keep_request_text.then(|| std::mem::take(&mut self.request_text));
        self.set_files_fetched(false);
        if let Some(text) = request_text {
            self.request_text = text;
        }
        self.fetch_status = if is_retry {
            FetchStatus::Retrying
        } else {
            FetchStatus::Loading
        };
        self.progress = 0.0;
        self.fetch_generation += 1;
        self.fetch_generation
    }

    /// Store a successful fetch in one write.
    pub fn publish_fetch(
        &mut self,
        files: Vec<FileNode>,
        branch: Option<String>,
        highlights: Highlights,
        auto_selected: BTreeSet<String>,
    ) {
        self.files = files;
        self.fetched_branch = branch;
        self.highlights = highlights;
        self.selected_fetcher_files = auto_selected;
        self.files_fetched = true;
        self.fetch_status = FetchStatus::Success;
        self.progress = 100.0;
        self.task_fetch_in_flight = None;
    }

    pub fn fail_fetch(&mut self, is_retry: bool) {
        self.files.clear();
        self.target_branch = None;
        self.files_fetched = false;
        self.highlights = Highlights::default();
        self.selected_fetcher_files.clear();
        self.fetch_status = if is_retry {
            FetchStatus::FailedRetries
        } else {
            FetchStatus::Error
        };
        self.progress = 0.0;
        self.task_fetch_in_flight = None;
    }

    pub fn file(&self, path: &str) -> Option<&FileNode> {
        self.files.iter().find(|f| f.path == path)
    }

    // ---- request ------------------------------------------------------------

    pub fn set_request_text(&mut self, text: impl Into<String>) {
        self.request_text = text.into();
        self.request_copied = false;
    }

    pub fn set_request_copied(&mut self, copied: bool) {
        self.request_copied = copied;
        if copied {
            self.set_ai_response(String::new());
        }
    }

    // ---- response -----------------------------------------------------------

    pub fn set_ai_response(&mut self, text: String) {
        let has_content = !text.trim().is_empty();
        self.ai_response = text;
        self.set_ai_response_has_content(has_content);
    }

    /// `false` also drops parse results and the assistant selection.
    pub fn set_ai_response_has_content(&mut self, has_content: bool) {
        self.ai_response_has_content = has_content;
        if !has_content {
            self.ai_response.clear();
            self.parsed = ParsedResponse::default();
            self.files_parsed = false;
            self.selected_assistant_files.clear();
        }
    }

    /// Replace the parse results and select every parsed path.
    pub fn set_parsed(&mut self, parsed: ParsedResponse) {
        self.selected_assistant_files = parsed.paths().map(str::to_string).collect();
        self.files_parsed = !parsed.blocks.is_empty();
        self.parsed = parsed;
    }

    /// Checked blocks in parse order.
    pub fn selected_blocks(&self) -> Vec<FileBlock> {
        self.parsed
            .blocks
            .iter()
            .filter(|b| self.selected_assistant_files.contains(&b.path))
            .cloned()
            .collect()
    }
}

// ---------------------------------------------------------------------------
// SharedState
// ---------------------------------------------------------------------------

/// [`SessionState`] behind a std mutex. Closures passed to [`read`] and
/// [`update`] run under the lock and cannot await.
///
/// [`read`]: SharedState::read
/// [`update`]: SharedState::update
#[derive(Debug, Clone, Default)]
pub struct SharedState {
    inner: Arc<Mutex<SessionState>>,
}

impl SharedState {
    pub fn new(state: SessionState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(state)),
        }
    }

    pub fn read<R>(&self, f: impl FnOnce(&SessionState) -> R) -> R {
        let guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    pub fn snapshot(&self) -> SessionState {
        self.read(SessionState::clone)
    }

    pub fn flags(&self) -> WorkflowFlags {
        self.read(SessionState::flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rx_core::types::{FileBlock, ImportCategory};
    use rx_core::workflow::derive_step;
    use rx_core::types::WorkflowStep;

    fn populated() -> SessionState {
        let mut state = SessionState::new();
        state.set_repo_url("https://github.com/o/r");
        let mut highlights = Highlights {
            primary: Some("app/page.tsx".into()),
            ..Default::default()
        };
        highlights
            .secondary
            .insert(ImportCategory::Hook, vec!["hooks/useX.ts".into()]);
        state.publish_fetch(
            vec![FileNode::new("app/page.tsx", "x")],
            Some("main".into()),
            highlights,
            ["app/page.tsx".to_string()].into_iter().collect(),
        );
        state.set_request_text("do it");
        state.set_request_copied(true);
        state.set_ai_response("```ts\n// a.ts\nx\n```".into());
        state.set_parsed(ParsedResponse {
            blocks: vec![FileBlock {
                path: "a.ts".into(),
                content: "x".into(),
                language: Some("ts".into()),
            }],
            ..Default::default()
        });
        state.tracked_request = Some(Uuid::new_v4());
        state.submitting = true;
        state
    }

    fn assert_reset(state: &SessionState) {
        assert!(!state.files_fetched);
        assert!(state.files.is_empty());
        assert!(state.highlights.is_empty());
        assert!(state.selected_fetcher_files.is_empty());
        assert!(state.request_text.is_empty());
        assert!(!state.request_copied);
        assert!(state.ai_response.is_empty());
        assert!(!state.ai_response_has_content);
        assert!(!state.files_parsed);
        assert!(state.parsed.blocks.is_empty());
        assert!(state.selected_assistant_files.is_empty());
        assert!(state.tracked_request.is_none());
        assert!(!state.submitting);
    }

    #[test]
    fn files_fetched_false_resets_downstream() {
        let mut state = populated();
        state.set_files_fetched(false);
        assert_reset(&state);
        assert_eq!(state.repo_url, "https://github.com/o/r");
    }

    #[test]
    fn files_fetched_false_is_idempotent() {
        let mut state = populated();
        state.set_files_fetched(false);
        let once = state.flags();
        state.set_files_fetched(false);
        assert_reset(&state);
        assert_eq!(state.flags(), once);
    }

    #[test]
    fn response_cleared_drops_parse_state() {
        let mut state = populated();
        state.set_ai_response_has_content(false);
        assert!(state.ai_response.is_empty());
        assert!(!state.files_parsed);
        assert!(state.selected_assistant_files.is_empty());
        assert!(state.files_fetched);
        assert_eq!(state.request_text, "do it");
    }

    #[test]
    fn copy_clears_previous_response() {
        let mut state = populated();
        state.set_request_copied(true);
        assert!(!state.ai_response_has_content);
        assert!(state.request_copied);
    }

    #[test]
    fn begin_fetch_keeps_request_text_for_targeted_tasks() {
        let mut state = populated();
        state.tracked_request = None;
        state.submitting = false;
        state.begin_fetch(false, true);
        assert_eq!(state.request_text, "do it");
        assert_eq!(state.fetch_status, FetchStatus::Loading);

        state.begin_fetch(true, false);
        assert!(state.request_text.is_empty());
        assert_eq!(state.fetch_status, FetchStatus::Retrying);
        assert_eq!(state.fetch_generation, 2);
    }

    #[test]
    fn changing_repo_url_drops_snapshot() {
        let mut state = populated();
        state.set_repo_url("https://github.com/o/other");
        assert!(!state.files_fetched);
        assert_eq!(derive_step(&state.flags()), WorkflowStep::ReadyToFetch);
    }

    #[test]
    fn selected_blocks_follow_parse_order() {
        let mut state = SessionState::new();
        let block = |p: &str| FileBlock {
            path: p.into(),
            content: String::new(),
            language: None,
        };
        state.set_parsed(ParsedResponse {
            blocks: vec![block("z.ts"), block("a.ts"), block("m.ts")],
            ..Default::default()
        });
        state.selected_assistant_files.remove("a.ts");
        let paths: Vec<String> = state.selected_blocks().into_iter().map(|b| b.path).collect();
        assert_eq!(paths, vec!["z.ts", "m.ts"]);
    }
}
