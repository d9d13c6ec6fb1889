//! Workflow step derivation and operator guidance.
//!
//! The current step is never stored. It is recomputed from a [`WorkflowFlags`]
//! snapshot on every read, so two readers can never disagree about it.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::types::{FetchStatus, WorkflowStep};

/// Primitive flags the step is derived from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowFlags {
    pub fetch_status: FetchStatus,
    pub repo_url_entered: bool,
    pub files_fetched: bool,
    pub has_primary_highlight: bool,
    pub secondary_highlight_count: usize,
    pub selected_fetcher_count: usize,
    pub request_has_content: bool,
    pub request_copied: bool,
    pub ai_response_has_content: bool,
    pub files_parsed: bool,
    pub selected_assistant_count: usize,
    /// Parsing or change creation in progress.
    pub assistant_loading: bool,
    /// A submission was made and its result has not arrived yet.
    pub submitting: bool,
    /// A request id is currently tracked.
    pub has_tracked_request: bool,
}

impl WorkflowFlags {
    pub fn has_highlights(&self) -> bool {
        self.has_primary_highlight || self.secondary_highlight_count > 0
    }
}

/// Derive the single active step. Pure and total: first matching rule wins.
pub fn derive_step(flags: &WorkflowFlags) -> WorkflowStep {
    if flags.fetch_status.is_in_flight() {
        return WorkflowStep::Fetching;
    }
    if flags.fetch_status == FetchStatus::FailedRetries {
        return WorkflowStep::FetchFailed;
    }
    if flags.has_tracked_request {
        return WorkflowStep::GeneratingAiResponse;
    }
    if flags.submitting {
        return WorkflowStep::RequestWritten;
    }
    if flags.assistant_loading {
        return if flags.files_parsed {
            WorkflowStep::PrReady
        } else {
            WorkflowStep::ParsingResponse
        };
    }

    if !flags.repo_url_entered {
        return WorkflowStep::NeedRepoUrl;
    }
    if !flags.files_fetched {
        return WorkflowStep::ReadyToFetch;
    }

    if flags.ai_response_has_content {
        return if !flags.files_parsed {
            WorkflowStep::ResponsePasted
        } else if flags.selected_assistant_count == 0 {
            WorkflowStep::ResponseParsed
        } else {
            WorkflowStep::PrReady
        };
    }
    if flags.request_copied {
        return WorkflowStep::RequestCopied;
    }
    if flags.request_has_content {
        return WorkflowStep::RequestWritten;
    }
    if flags.selected_fetcher_count > 0 {
        return WorkflowStep::FilesSelected;
    }
    if flags.has_highlights() {
        return WorkflowStep::FilesFetchedHighlights;
    }
    WorkflowStep::FilesFetched
}

const FALLBACK_GUIDANCE: &str = "What should we do next?";

/// Short operator directive for a step. Every step maps to text.
pub fn guidance(step: WorkflowStep, flags: &WorkflowFlags) -> String {
    let text = match step {
        WorkflowStep::Idle => "Initialising workflow context...",
        WorkflowStep::NeedRepoUrl => "Enter the repository URL first.",
        WorkflowStep::ReadyToFetch => {
            if flags.repo_url_entered {
                "Fetch the repository files."
            } else {
                "Enter the repository URL first."
            }
        }
        WorkflowStep::Fetching => {
            if flags.fetch_status == FetchStatus::Retrying {
                "Fetching files (retrying)..."
            } else {
                "Fetching files..."
            }
        }
        WorkflowStep::FetchFailed => "Fetching failed after several attempts. Retry?",
        WorkflowStep::FilesFetched => "Files fetched. Select what you need or describe the task.",
        WorkflowStep::FilesFetchedHighlights => {
            "Files fetched. Related files are highlighted: select them or browse the list."
        }
        WorkflowStep::FilesSelected => "Files selected. Add them to the request or ask the AI.",
        WorkflowStep::RequestWritten => "Request ready. Ask the AI or copy it manually.",
        WorkflowStep::GeneratingAiResponse => "Waiting for the AI response...",
        WorkflowStep::RequestCopied => "Copied. Paste the AI response when it arrives.",
        WorkflowStep::ResponsePasted => "Response received. Parse it into file blocks.",
        WorkflowStep::ParsingResponse => "Parsing the AI response...",
        WorkflowStep::ResponseParsed => "Parsed. Review the result and pick files for the PR.",
        WorkflowStep::PrReady => {
            if flags.assistant_loading {
                "Creating the pull request..."
            } else {
                "Files selected. Ready to create the pull request?"
            }
        }
    };
    text.to_string()
}

/// Guidance for a step given by name, e.g. a value read back from storage.
/// Unknown names are logged and get a generic directive.
pub fn guidance_for(raw: &str, flags: &WorkflowFlags) -> String {
    match WorkflowStep::from_name(raw) {
        Some(step) => guidance(step, flags),
        None => {
            warn!(step = %raw, "unhandled workflow step in guidance");
            FALLBACK_GUIDANCE.to_string()
        }
    }
}
