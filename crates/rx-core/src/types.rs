use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// FileNode
// ---------------------------------------------------------------------------

/// One retrieved repository file. Replaced wholesale on every fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileNode {
    /// Repo-relative path, unique within a tree.
    pub path: String,
    pub content: String,
}

impl FileNode {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// ImportCategory
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportCategory {
    Component,
    Context,
    Hook,
    Lib,
    Other,
}

impl ImportCategory {
    pub const ALL: [ImportCategory; 5] = [
        ImportCategory::Component,
        ImportCategory::Context,
        ImportCategory::Hook,
        ImportCategory::Lib,
        ImportCategory::Other,
    ];

    /// Categories whose resolved imports are selected automatically after a fetch.
    pub fn is_auto_selectable(&self) -> bool {
        !matches!(self, ImportCategory::Other)
    }
}

impl fmt::Display for ImportCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ImportCategory::Component => "component",
            ImportCategory::Context => "context",
            ImportCategory::Hook => "hook",
            ImportCategory::Lib => "lib",
            ImportCategory::Other => "other",
        };
        write!(f, "{}", label)
    }
}

// ---------------------------------------------------------------------------
// Highlights
// ---------------------------------------------------------------------------

/// Primary focus file plus its one-level resolved imports, grouped by category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Highlights {
    pub primary: Option<String>,
    pub secondary: BTreeMap<ImportCategory, Vec<String>>,
}

impl Highlights {
    pub fn is_empty(&self) -> bool {
        self.primary.is_none() && self.secondary.values().all(|v| v.is_empty())
    }

    /// Secondary paths of one category (empty slice when none).
    pub fn secondary_of(&self, category: ImportCategory) -> &[String] {
        self.secondary
            .get(&category)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// All secondary paths in category order.
    pub fn all_secondary(&self) -> impl Iterator<Item = &String> {
        self.secondary.values().flatten()
    }

    pub fn secondary_count(&self) -> usize {
        self.secondary.values().map(|v| v.len()).sum()
    }
}

// ---------------------------------------------------------------------------
// FetchStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStatus {
    #[default]
    Idle,
    Loading,
    Retrying,
    Success,
    Error,
    FailedRetries,
}

impl FetchStatus {
    /// `true` while a tree fetch is in flight.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, FetchStatus::Loading | FetchStatus::Retrying)
    }
}

impl fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FetchStatus::Idle => "idle",
            FetchStatus::Loading => "loading",
            FetchStatus::Retrying => "retrying",
            FetchStatus::Success => "success",
            FetchStatus::Error => "error",
            FetchStatus::FailedRetries => "failed_retries",
        };
        write!(f, "{}", label)
    }
}

// ---------------------------------------------------------------------------
// WorkflowStep
// ---------------------------------------------------------------------------

/// The single derived position in the fetch -> select -> request -> respond
/// -> parse -> stage pipeline. Declaration order is the workflow order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStep {
    #[default]
    Idle,
    NeedRepoUrl,
    ReadyToFetch,
    Fetching,
    FetchFailed,
    FilesFetched,
    FilesFetchedHighlights,
    FilesSelected,
    RequestWritten,
    GeneratingAiResponse,
    RequestCopied,
    ResponsePasted,
    ParsingResponse,
    ResponseParsed,
    PrReady,
}

impl WorkflowStep {
    pub const ALL: [WorkflowStep; 15] = [
        WorkflowStep::Idle,
        WorkflowStep::NeedRepoUrl,
        WorkflowStep::ReadyToFetch,
        WorkflowStep::Fetching,
        WorkflowStep::FetchFailed,
        WorkflowStep::FilesFetched,
        WorkflowStep::FilesFetchedHighlights,
        WorkflowStep::FilesSelected,
        WorkflowStep::RequestWritten,
        WorkflowStep::GeneratingAiResponse,
        WorkflowStep::RequestCopied,
        WorkflowStep::ResponsePasted,
        WorkflowStep::ParsingResponse,
        WorkflowStep::ResponseParsed,
        WorkflowStep::PrReady,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStep::Idle => "idle",
            WorkflowStep::NeedRepoUrl => "need_repo_url",
            WorkflowStep::ReadyToFetch => "ready_to_fetch",
            WorkflowStep::Fetching => "fetching",
            WorkflowStep::FetchFailed => "fetch_failed",
            WorkflowStep::FilesFetched => "files_fetched",
            WorkflowStep::FilesFetchedHighlights => "files_fetched_highlights",
            WorkflowStep::FilesSelected => "files_selected",
            WorkflowStep::RequestWritten => "request_written",
            WorkflowStep::GeneratingAiResponse => "generating_ai_response",
            WorkflowStep::RequestCopied => "request_copied",
            WorkflowStep::ResponsePasted => "response_pasted",
            WorkflowStep::ParsingResponse => "parsing_response",
            WorkflowStep::ResponseParsed => "response_parsed",
            WorkflowStep::PrReady => "pr_ready",
        }
    }

    /// Parse a step from its snake_case name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.as_str() == name)
    }
}

impl fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// AI request records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl RequestStatus {
    /// Terminal statuses end a request's lifecycle.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Completed | RequestStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Processing => "processing",
            RequestStatus::Completed => "completed",
            RequestStatus::Failed => "failed",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "pending" => Some(RequestStatus::Pending),
            "processing" => Some(RequestStatus::Processing),
            "completed" => Some(RequestStatus::Completed),
            "failed" => Some(RequestStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The durable unit of asynchronous AI work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiRequestRecord {
    pub id: Uuid,
    pub prompt: String,
    pub user_id: String,
    pub status: RequestStatus,
    pub response: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Client-side payload for a new request; the store assigns id and timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAiRequest {
    pub prompt: String,
    pub user_id: String,
}

// ---------------------------------------------------------------------------
// Hosting collaborator types
// ---------------------------------------------------------------------------

/// An open in-flight change (pull request) on the hosting side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenChange {
    pub id: u64,
    pub title: String,
    pub head_branch: String,
}

/// Handle to a change created on the hosting side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRef {
    pub id: u64,
    pub url: String,
    pub branch: String,
}

// ---------------------------------------------------------------------------
// FileBlock
// ---------------------------------------------------------------------------

/// One `{path, content}` pair extracted from an AI response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileBlock {
    pub path: String,
    pub content: String,
    pub language: Option<String>,
}
