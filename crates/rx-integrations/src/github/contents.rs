//! Repository tree and file content retrieval.

use futures_util::stream::{self, StreamExt};
use rx_core::types::FileNode;
use tracing::{debug, warn};

use crate::types::{GitTree, TreeFilter};

use super::client::{GitHubClient, GitHubError, Result};

/// Concurrent content requests per fetch.
const CONTENT_CONCURRENCY: usize = 8;

/// Blob paths of `branch` accepted by `filter`, in tree order.
pub async fn list_tree_paths(
    client: &GitHubClient,
    branch: &str,
    filter: &TreeFilter,
) -> Result<Vec<String>> {
    let route = client.route(&format!("git/trees/{branch}?recursive=1"));
    let tree: GitTree = client.octocrab.get(route, None::<&()>).await?;
    if tree.truncated {
        warn!(
            owner = %client.owner,
            repo = %client.repo,
            branch = %branch,
            "tree listing truncated by GitHub; file list may be incomplete"
        );
    }

    let total = tree.tree.len();
    let paths: Vec<String> = tree
        .tree
        .into_iter()
        .filter(|entry| entry.is_blob() && filter.accepts(&entry.path))
        .map(|entry| entry.path)
        .collect();
    debug!(total, kept = paths.len(), branch = %branch, "filtered repository tree");
    Ok(paths)
}

/// Decoded text content of one file on `branch`.
pub async fn get_file_content(client: &GitHubClient, path: &str, branch: &str) -> Result<String> {
    let mut items = client
        .octocrab
        .repos(&client.owner, &client.repo)
        .get_content()
        .path(path)
        .r#ref(branch)
        .send()
        .await?;

    items
        .take_items()
        .into_iter()
        .next()
        .and_then(|item| item.decoded_content())
        .ok_or_else(|| GitHubError::Decode(path.to_string()))
}

/// Fetch the filtered tree of `branch` (default branch when `None`) with
/// contents. Files whose content cannot be decoded as text are skipped.
pub async fn fetch_tree(
    client: &GitHubClient,
    branch: Option<&str>,
    filter: &TreeFilter,
) -> Result<Vec<FileNode>> {
    let branch = match branch {
        Some(b) => b.to_string(),
        None => client.default_branch().await?,
    };
    let paths = list_tree_paths(client, &branch, filter).await?;

    let results: Vec<(String, Result<String>)> = stream::iter(paths)
        .map(|path| {
            let branch = branch.as_str();
            async move {
                let content = get_file_content(client, &path, branch).await;
                (path, content)
            }
        })
        .buffered(CONTENT_CONCURRENCY)
        .collect()
        .await;

    let mut files = Vec::with_capacity(results.len());
    for (path, content) in results {
        match content {
            Ok(content) => files.push(FileNode::new(path, content)),
            Err(GitHubError::Decode(path)) => {
                warn!(path = %path, "skipping file with undecodable content");
            }
            Err(e) => return Err(e),
        }
    }
    debug!(count = files.len(), branch = %branch, "repository files fetched");
    Ok(files)
}
