//! [`RepositoryHost`] backed by the GitHub REST API.

use async_trait::async_trait;
use rx_core::hosting::{HostError, RepositoryHost};
use rx_core::repo_url::RepoRef;
use rx_core::types::{ChangeRef, FileNode, OpenChange};
use tracing::info;

use crate::github::client::{GitHubClient, GitHubError};
use crate::github::{contents, pull_requests};
use crate::types::TreeFilter;

pub struct GitHubHost {
    token_env: String,
    filter: TreeFilter,
}

impl GitHubHost {
    /// Host that falls back to the token in `token_env` when no token is
    /// passed explicitly.
    pub fn new(token_env: impl Into<String>) -> Self {
        Self {
            token_env: token_env.into(),
            filter: TreeFilter::default(),
        }
    }

    pub fn with_filter(mut self, filter: TreeFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn filter(&self) -> &TreeFilter {
        &self.filter
    }

    fn client(&self, repo: &RepoRef, token: Option<&str>) -> Result<GitHubClient, GitHubError> {
        let token = token
            .map(str::to_string)
            .or_else(|| std::env::var(&self.token_env).ok());
        GitHubClient::for_repo(repo, token)
    }
}

impl Default for GitHubHost {
    fn default() -> Self {
        Self::new("GITHUB_TOKEN")
    }
}

#[async_trait]
impl RepositoryHost for GitHubHost {
    async fn fetch_tree(
        &self,
        repo: &RepoRef,
        token: Option<&str>,
        branch: Option<&str>,
    ) -> Result<Vec<FileNode>, HostError> {
        let client = self.client(repo, token).map_err(host_error)?;
        let branch = branch.or(repo.branch.as_deref());
        contents::fetch_tree(&client, branch, &self.filter)
            .await
            .map_err(host_error)
    }

    async fn list_open_changes(&self, repo: &RepoRef) -> Result<Vec<OpenChange>, HostError> {
        let client = self.client(repo, None).map_err(host_error)?;
        pull_requests::list_open_pull_requests(&client)
            .await
            .map_err(host_error)
    }

    async fn create_change(
        &self,
        repo: &RepoRef,
        branch: &str,
        files: &[FileNode],
        title: &str,
        description: &str,
    ) -> Result<ChangeRef, HostError> {
        let client = self.client(repo, None).map_err(host_error)?;
        let base = match repo.branch.as_deref() {
            Some(b) => b.to_string(),
            None => client.default_branch().await.map_err(host_error)?,
        };
        if branch == base {
            return Err(HostError::Other(format!(
                "cannot open a pull request from {base} into itself; choose another branch"
            )));
        }

        pull_requests::commit_files(&client, branch, &base, files, title)
            .await
            .map_err(host_error)?;

        let open = pull_requests::list_open_pull_requests(&client)
            .await
            .map_err(host_error)?;
        if let Some(existing) = open.into_iter().find(|pr| pr.head_branch == branch) {
            info!(pr = existing.id, branch = %branch, "branch already has an open pull request");
            return Ok(ChangeRef {
                id: existing.id,
                url: format!(
                    "https://github.com/{}/{}/pull/{}",
                    repo.owner, repo.repo, existing.id
                ),
                branch: branch.to_string(),
            });
        }

        let change = pull_requests::create_pull_request(&client, title, description, branch, &base)
            .await
            .map_err(host_error)?;
        info!(pr = change.id, url = %change.url, "pull request created");
        Ok(change)
    }
}

/// Map client failures onto the host-neutral error kinds.
pub fn host_error(err: GitHubError) -> HostError {
    match err.status_code() {
        Some(404) => HostError::NotFound(err.to_string()),
        Some(401) | Some(403) => HostError::Unauthorized(err.to_string()),
        Some(_) => HostError::Api(err.to_string()),
        None => match &err {
            GitHubError::MissingToken => HostError::Unauthorized(err.to_string()),
            GitHubError::Api(_) => HostError::Api(err.to_string()),
            _ => HostError::Other(err.to_string()),
        },
    }
}
