//! Stages parsed response blocks for review and turns the checked ones into
//! a pull request.

use std::sync::Arc;

use chrono::Utc;
use rx_core::hosting::RepositoryHost;
use rx_core::repo_url::parse_github_url;
use rx_core::response_parser::{
    parse_response, pr_description, pr_title_hint, ParsedResponse, MAX_PR_TITLE_CHARS,
};
use rx_core::types::{ChangeRef, FileBlock, FileNode};
use rx_telemetry::tracing_setup::create_operation_span;
use tracing::{info, warn, Instrument};

use crate::error::{Result, WorkflowError};
use crate::notice::Notifier;
use crate::state::SharedState;

pub const BRANCH_PREFIX: &str = "feature-ai-assisted-";

#[derive(Clone)]
pub struct PatchStager {
    state: SharedState,
    host: Arc<dyn RepositoryHost>,
    notifier: Notifier,
}

impl PatchStager {
    pub fn new(state: SharedState, host: Arc<dyn RepositoryHost>, notifier: Notifier) -> Self {
        Self {
            state,
            host,
            notifier,
        }
    }

    /// Parse `text` (or the stored response when `None`) into blocks, select
    /// every parsed path and mark the response parsed.
    pub fn parse(&self, text: Option<&str>) -> ParsedResponse {
        let text = match text {
            Some(t) => t.to_string(),
            None => self.state.read(|s| s.ai_response.clone()),
        };
        if text.trim().is_empty() {
            self.notifier.warning("There is no response to parse.");
            return ParsedResponse::default();
        }

        self.state.update(|s| s.assistant_loading = true);
        let parsed = parse_response(&text);
        for issue in &parsed.issues {
            self.notifier.warning(issue.to_string());
        }
        self.state.update(|s| {
            if s.ai_response != text {
                s.set_ai_response(text.clone());
            }
            s.selected_assistant_files.clear();
            s.set_parsed(parsed.clone());
            s.assistant_loading = false;
        });

        if parsed.blocks.is_empty() {
            self.notifier.warning("No code blocks found in the response.");
        } else {
            info!(blocks = parsed.blocks.len(), "response parsed");
            self.notifier
                .success(format!("Parsed {} files from the response.", parsed.blocks.len()));
        }
        parsed
    }

    /// Returns whether `path` is checked afterwards.
    pub fn toggle(&self, path: &str) -> bool {
        self.state.update(|s| {
            if !s.parsed.blocks.iter().any(|b| b.path == path) {
                return false;
            }
            if s.selected_assistant_files.remove(path) {
                false
            } else {
                s.selected_assistant_files.insert(path.to_string());
                true
            }
        })
    }

    pub fn select_all(&self) -> usize {
        self.state.update(|s| {
            let paths: Vec<String> = s.parsed.paths().map(str::to_string).collect();
            s.selected_assistant_files.extend(paths);
            s.selected_assistant_files.len()
        })
    }

    pub fn deselect_all(&self) {
        self.state.update(|s| s.selected_assistant_files.clear());
    }

    /// Checked blocks in parse order.
    pub fn selected_blocks(&self) -> Vec<FileBlock> {
        self.state.read(|s| s.selected_blocks())
    }

    /// Commit the checked blocks and open a pull request. An existing target
    /// branch (from a discovered pull request or an explicit choice) is
    /// updated in place; otherwise a fresh `feature-ai-assisted-*` branch is
    /// created.
    pub async fn create_change(&self, title: Option<String>) -> Result<ChangeRef> {
        let (repo_url, blocks, response, description, target) = self.state.update(|s| {
            if s.assistant_loading {
                return Err(WorkflowError::ConcurrencyGuard(
                    "a pull request is already being created".into(),
                ));
            }
            let blocks = s.selected_blocks();
            if blocks.is_empty() {
                return Err(WorkflowError::Staging("no files are selected".into()));
            }
            s.assistant_loading = true;
            Ok((
                s.repo_url.clone(),
                blocks,
                s.ai_response.clone(),
                s.parsed.description.clone(),
                s.target_branch.clone(),
            ))
        })?;

        let updating = target.is_some();
        let branch =
            target.unwrap_or_else(|| format!("{BRANCH_PREFIX}{}", Utc::now().timestamp_millis()));
        let (span, trace_id) = create_operation_span("create_change");
        let result = self
            .submit_change(&repo_url, &branch, blocks, &response, &description, title)
            .instrument(span)
            .await;
        self.state.update(|s| {
            s.assistant_loading = false;
            if let Ok(change) = &result {
                s.last_change = Some(change.clone());
            }
        });

        match &result {
            Ok(change) => {
                info!(trace_id = %trace_id, pr = change.id, branch = %branch, updating, "pull request ready");
                let message = if updating {
                    format!("Branch {branch} updated, pull request #{}: {}", change.id, change.url)
                } else {
                    format!("Pull request #{} created: {}", change.id, change.url)
                };
                self.notifier.success(message);
            }
            Err(e) => {
                warn!(trace_id = %trace_id, error = %e, "pull request creation failed");
                self.notifier.error(e.to_string());
            }
        }
        result
    }

    async fn submit_change(
        &self,
        repo_url: &str,
        branch: &str,
        blocks: Vec<FileBlock>,
        response: &str,
        description: &str,
        title: Option<String>,
    ) -> Result<ChangeRef> {
        let repo = parse_github_url(repo_url)
            .map_err(|e| WorkflowError::Configuration(e.to_string()))?;

        let title = match title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()) {
            Some(t) => t.chars().take(MAX_PR_TITLE_CHARS).collect(),
            None => pr_title_hint(response),
        };
        let paths: Vec<String> = blocks.iter().map(|b| b.path.clone()).collect();
        let body = pr_description(description, response, &paths);
        let files: Vec<FileNode> = blocks
            .into_iter()
            .map(|b| FileNode::new(b.path, b.content))
            .collect();

        self.host
            .create_change(&repo, branch, &files, &title, &body)
            .await
            .map_err(|e| WorkflowError::Staging(e.to_string()))
    }
}
