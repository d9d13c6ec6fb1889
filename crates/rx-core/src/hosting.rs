use async_trait::async_trait;

use crate::repo_url::RepoRef;
use crate::types::{ChangeRef, FileNode, OpenChange};

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("hosting API error: {0}")]
    Api(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("{0}")]
    Other(String),
}

/// Repository hosting collaborator: file listing, open-change discovery and
/// change creation.
#[async_trait]
pub trait RepositoryHost: Send + Sync {
    /// Full file tree with contents. `branch = None` means the default branch.
    async fn fetch_tree(
        &self,
        repo: &RepoRef,
        token: Option<&str>,
        branch: Option<&str>,
    ) -> Result<Vec<FileNode>, HostError>;

    async fn list_open_changes(&self, repo: &RepoRef) -> Result<Vec<OpenChange>, HostError>;

    /// Commit `files` to `branch`, creating it from the base branch when
    /// missing. Returns the open change whose head is `branch`, opening one
    /// if there is none.
    async fn create_change(
        &self,
        repo: &RepoRef,
        branch: &str,
        files: &[FileNode],
        title: &str,
        description: &str,
    ) -> Result<ChangeRef, HostError>;
}
