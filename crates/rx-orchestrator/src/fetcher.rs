//! Repository content fetcher.
//!
//! Guards run under the state lock before the first await, so of two
//! back-to-back fetches the second is refused.

use std::collections::BTreeSet;
use std::sync::Arc;

use rx_core::config::FetchConfig;
use rx_core::hosting::RepositoryHost;
use rx_core::import_graph::{compute_highlights, HighlightResult};
use rx_core::repo_url::{parse_github_url, RepoRef};
use rx_core::types::{FileNode, Highlights, OpenChange};
use rx_telemetry::tracing_setup::create_operation_span;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn, Instrument};

use crate::error::{Result, WorkflowError};
use crate::notice::Notifier;
use crate::progress::ProgressEstimator;
use crate::state::{ActiveTask, SharedState};

/// Route used when no focus route was set.
pub const ROOT_ROUTE: &str = "/";

/// What a successful fetch produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchOutcome {
    pub file_count: usize,
    pub branch: Option<String>,
    pub primary: Option<String>,
    pub auto_selected: usize,
}

pub struct RepoFetcher {
    state: SharedState,
    host: Arc<dyn RepositoryHost>,
    notifier: Notifier,
    important_files: Vec<String>,
    fetch_config: FetchConfig,
}

/// Inputs captured under the lock when a fetch is admitted.
struct Admitted {
    repo: RepoRef,
    token: Option<String>,
    branch: Option<String>,
    /// `branch` was chosen explicitly rather than taken from the URL.
    branch_is_target: bool,
    route: String,
    generation: u64,
}

impl RepoFetcher {
    pub fn new(
        state: SharedState,
        host: Arc<dyn RepositoryHost>,
        notifier: Notifier,
        important_files: Vec<String>,
        fetch_config: FetchConfig,
    ) -> Self {
        Self {
            state,
            host,
            notifier,
            important_files,
            fetch_config,
        }
    }

    /// Fetch the repository tree and derive highlights.
    ///
    /// `branch_override` wins over a discovered PR branch, which wins over
    /// the branch in the URL and the manually chosen branch.
    pub async fn fetch(
        &self,
        is_retry: bool,
        branch_override: Option<String>,
        active_task: Option<ActiveTask>,
    ) -> Result<FetchOutcome> {
        let admitted = self.admit(is_retry, branch_override.clone(), active_task.as_ref())?;
        let (span, trace_id) = create_operation_span("fetch");
        debug!(trace_id = %trace_id, repo = %admitted.repo, is_retry, "fetch admitted");

        self.run(is_retry, branch_override, active_task, admitted)
            .instrument(span)
            .await
    }

    fn admit(
        &self,
        is_retry: bool,
        branch_override: Option<String>,
        active_task: Option<&ActiveTask>,
    ) -> Result<Admitted> {
        let outcome = self.state.update(|s| {
            if let (Some(task), Some(running)) = (active_task, s.task_fetch_in_flight.as_deref()) {
                if running == task.target_path {
                    return Err(WorkflowError::ConcurrencyGuard(format!(
                        "a fetch for {running} is already running"
                    )));
                }
            }
            if s.fetch_status.is_in_flight() && !is_retry {
                return Err(WorkflowError::ConcurrencyGuard(
                    "a fetch is already running".into(),
                ));
            }
            if s.repo_url.trim().is_empty() {
                s.settings_requested = true;
                return Err(WorkflowError::Configuration(
                    "repository URL is not set".into(),
                ));
            }
            let repo = match parse_github_url(&s.repo_url) {
                Ok(repo) => repo,
                Err(e) => {
                    s.settings_requested = true;
                    return Err(WorkflowError::Configuration(e.to_string()));
                }
            };
            if let Some(reason) = s.busy_reason() {
                return Err(WorkflowError::ConcurrencyGuard(reason.into()));
            }

            let keep_request_text = active_task.is_some_and(|t| t.kind.keeps_request_text());
            let generation = s.begin_fetch(is_retry, keep_request_text);
            s.active_task = active_task.cloned();
            s.task_fetch_in_flight = active_task.map(|t| t.target_path.clone());

            let branch_is_target =
                branch_override.is_some() || (repo.branch.is_none() && s.manual_branch.is_some());
            let branch = branch_override
                .or_else(|| repo.branch.clone())
                .or_else(|| s.manual_branch.clone());
            let route = s
                .focus_route
                .clone()
                .or_else(|| repo.file_path.clone())
                .unwrap_or_else(|| ROOT_ROUTE.to_string());
            Ok(Admitted {
                token: s.token.clone(),
                repo,
                branch,
                branch_is_target,
                route,
                generation,
            })
        });

        if let Err(e) = &outcome {
            match e {
                WorkflowError::Configuration(_) => self
                    .notifier
                    .warning("Enter a GitHub repository URL in the settings first."),
                other => debug!(reason = %other, "fetch refused"),
            }
        }
        outcome
    }

    async fn run(
        &self,
        is_retry: bool,
        branch_override: Option<String>,
        active_task: Option<ActiveTask>,
        admitted: Admitted,
    ) -> Result<FetchOutcome> {
        let mut branch = admitted.branch;
        let mut branch_is_target = admitted.branch_is_target;
        let mut estimated_secs = self.fetch_config.estimated_secs;

        if let (Some(task), None) = (&active_task, &branch_override) {
            if let Some(found) = self.discover_branch(&admitted.repo, task).await {
                branch = Some(found);
                branch_is_target = true;
                estimated_secs = self.fetch_config.pr_branch_estimated_secs;
            }
        }

        let ticker = ProgressEstimator::new(estimated_secs, self.fetch_config.tick_ms)
            .spawn(self.state.clone(), admitted.generation);
        let label = branch.clone().unwrap_or_else(|| "default".into());
        self.notifier
            .info(format!("Fetching files from branch ({label})..."));

        let result = self
            .host
            .fetch_tree(&admitted.repo, admitted.token.as_deref(), branch.as_deref())
            .await
            .map_err(|e| WorkflowError::Fetch(e.to_string()))
            .and_then(|files| {
                let derived = self.derive(&files, &admitted.route, active_task.as_ref(), &label)?;
                Ok((files, derived))
            });
        ticker.abort();

        match result {
            Ok((files, derived)) => {
                let outcome = FetchOutcome {
                    file_count: files.len(),
                    branch: branch.clone(),
                    primary: derived.highlights.primary.clone(),
                    auto_selected: derived.auto_selected.len(),
                };
                let published = self.state.update(|s| {
                    if s.fetch_generation != admitted.generation {
                        return false;
                    }
                    s.target_branch = if branch_is_target { branch.clone() } else { None };
                    s.publish_fetch(files, branch, derived.highlights, derived.auto_selected);
                    true
                });
                if !published {
                    debug!(generation = admitted.generation, "superseded fetch result dropped");
                } else {
                    info!(files = outcome.file_count, primary = ?outcome.primary, "fetch complete");
                    self.notifier.success(success_message(&outcome, &label));
                }
                Ok(outcome)
            }
            Err(e) => {
                self.state.update(|s| {
                    if s.fetch_generation == admitted.generation {
                        s.fail_fetch(is_retry);
                    }
                });
                self.notifier.error(format!("Error: {e}"));
                Err(e)
            }
        }
    }

    /// Head branch of the single open change that mentions the task target.
    /// Discovery problems are warnings only.
    async fn discover_branch(&self, repo: &RepoRef, task: &ActiveTask) -> Option<String> {
        self.state.update(|s| s.discovering_changes = true);
        let listed = self.host.list_open_changes(repo).await;
        self.state.update(|s| s.discovering_changes = false);

        match listed {
            Ok(changes) => match matching_change(&changes, task) {
                Some(change) => {
                    info!(pr = change.id, branch = %change.head_branch, "using branch of open pull request");
                    self.notifier.info(format!(
                        "Found PR #{} for {}, fetching branch {}",
                        change.id,
                        task.file_name(),
                        change.head_branch
                    ));
                    Some(change.head_branch.clone())
                }
                None => None,
            },
            Err(e) => {
                self.notifier
                    .warning(format!("Could not list open pull requests: {e}"));
                None
            }
        }
    }

    fn derive(
        &self,
        files: &[FileNode],
        route: &str,
        active_task: Option<&ActiveTask>,
        branch_label: &str,
    ) -> Result<HighlightResult> {
        match active_task {
            Some(task) => {
                if !files.iter().any(|f| f.path == task.target_path) {
                    return Err(WorkflowError::Fetch(format!(
                        "file {} not found in branch {branch_label}",
                        task.target_path
                    )));
                }
                let mut auto_selected = BTreeSet::new();
                if task.kind.selects_target() {
                    auto_selected.insert(task.target_path.clone());
                }
                Ok(HighlightResult {
                    highlights: Highlights {
                        primary: Some(task.target_path.clone()),
                        ..Default::default()
                    },
                    auto_selected,
                })
            }
            None => {
                let result = compute_highlights(route, files, &self.important_files);
                if result.highlights.primary.is_none() && route != ROOT_ROUTE {
                    warn!(route = %route, "no page file found for route");
                    self.notifier
                        .warning(format!("No page file found for route {route}."));
                }
                Ok(result)
            }
        }
    }
}

/// Exactly one open change whose title mentions the target path or its file
/// name.
fn matching_change<'a>(changes: &'a [OpenChange], task: &ActiveTask) -> Option<&'a OpenChange> {
    let file_name = task.file_name();
    let mut matches = changes
        .iter()
        .filter(|c| c.title.contains(&task.target_path) || c.title.contains(file_name));
    let first = matches.next()?;
    if matches.next().is_some() {
        debug!(target = %task.target_path, "several open pull requests match; using default branch");
        return None;
    }
    Some(first)
}

fn success_message(outcome: &FetchOutcome, branch_label: &str) -> String {
    if outcome.auto_selected > 0 {
        format!(
            "Fetched {} files from {branch_label}, {} selected automatically.",
            outcome.file_count, outcome.auto_selected
        )
    } else {
        format!("Fetched {} files from {branch_label}.", outcome.file_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::TaskKind;

    fn change(id: u64, title: &str) -> OpenChange {
        OpenChange {
            id,
            title: title.into(),
            head_branch: format!("branch-{id}"),
        }
    }

    #[test]
    fn single_matching_change_is_used() {
        let task = ActiveTask::new("app/page.tsx", TaskKind::ErrorFix);
        let changes = vec![change(1, "Fix header"), change(2, "Fix page.tsx crash")];
        assert_eq!(matching_change(&changes, &task).map(|c| c.id), Some(2));
    }

    #[test]
    fn ambiguous_matches_are_ignored() {
        let task = ActiveTask::new("app/page.tsx", TaskKind::Idea);
        let changes = vec![change(1, "page.tsx one"), change(2, "app/page.tsx two")];
        assert!(matching_change(&changes, &task).is_none());
    }

    #[test]
    fn no_match_is_none() {
        let task = ActiveTask::new("app/page.tsx", TaskKind::ImageSwap);
        assert!(matching_change(&[change(1, "unrelated")], &task).is_none());
    }
}
